//! Sync rules

use mirror_common::{ContentStore, Result, TenantId};
use mirror_config::{DestinationSpec, OriginSpec, RuleSettings};
use std::collections::BTreeSet;

/// One origin spec bound to one destination spec, installed in a tenant
#[derive(Debug, Clone)]
pub struct Rule {
    home: TenantId,
    origin: OriginSpec,
    destination: DestinationSpec,
}

impl Rule {
    pub fn new(home: TenantId, origin: OriginSpec, destination: DestinationSpec) -> Self {
        Self {
            home,
            origin,
            destination,
        }
    }

    pub fn from_settings(settings: RuleSettings) -> Result<Self> {
        let (home, origin, destination) = settings.into_specs()?;
        Ok(Self::new(home, origin, destination))
    }

    /// Tenant the rule is installed in; only saves there are handled
    pub fn home(&self) -> TenantId {
        self.home
    }

    pub fn origin(&self) -> &OriginSpec {
        &self.origin
    }

    pub fn destination(&self) -> &DestinationSpec {
        &self.destination
    }

    /// Destination tenants for a save in the home tenant (never the home
    /// tenant itself)
    pub fn destination_tenants(&self, store: &dyn ContentStore) -> Result<BTreeSet<TenantId>> {
        let mut tenants = self
            .destination
            .tenants()
            .resolve(|| store.tenant_ids())?;
        tenants.remove(&self.home);
        Ok(tenants)
    }
}
