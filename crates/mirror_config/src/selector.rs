//! Tenant selection shared by origin and destination specs

use mirror_common::{Result, SyncError, TenantId};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Which tenants a spec applies to
#[derive(Clone, Default)]
pub enum TenantSelector {
    /// Exactly these tenants
    Explicit(BTreeSet<TenantId>),

    /// Every known tenant for which the predicate holds
    Predicate(Arc<dyn Fn(TenantId) -> bool + Send + Sync>),

    /// Every known tenant
    #[default]
    All,
}

impl TenantSelector {
    pub fn explicit(ids: impl IntoIterator<Item = TenantId>) -> Self {
        Self::Explicit(ids.into_iter().collect())
    }

    pub fn predicate(f: impl Fn(TenantId) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Realize the selector into a set of tenant ids.
    ///
    /// `all_tenants` is only consulted for the `Predicate` and `All` cases.
    pub fn resolve<F>(&self, all_tenants: F) -> Result<BTreeSet<TenantId>>
    where
        F: FnOnce() -> Result<Vec<TenantId>>,
    {
        match self {
            Self::Explicit(ids) => Ok(ids.clone()),
            Self::Predicate(keep) => Ok(all_tenants()?
                .into_iter()
                .filter(|id| keep(*id))
                .collect()),
            Self::All => Ok(all_tenants()?.into_iter().collect()),
        }
    }

    pub(crate) fn validate(&self, field: &str) -> Result<()> {
        if let Self::Explicit(ids) = self {
            if ids.is_empty() {
                return Err(SyncError::ConfigError(format!(
                    "{field}: explicit tenant set is empty (use All to select every tenant)"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TenantSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(ids) => f.debug_tuple("Explicit").field(ids).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::All => f.write_str("All"),
        }
    }
}

impl From<Option<Vec<TenantId>>> for TenantSelector {
    fn from(ids: Option<Vec<TenantId>>) -> Self {
        match ids {
            Some(ids) => Self::explicit(ids),
            None => Self::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Result<Vec<TenantId>> {
        Ok(vec![TenantId(1), TenantId(2), TenantId(3), TenantId(4)])
    }

    #[test]
    fn test_explicit_is_returned_verbatim() {
        let selector = TenantSelector::explicit([TenantId(9), TenantId(2)]);
        let ids = selector
            .resolve(|| panic!("explicit selectors must not list tenants"))
            .unwrap();
        assert_eq!(ids, BTreeSet::from([TenantId(2), TenantId(9)]));
    }

    #[test]
    fn test_predicate_filters_known_tenants() {
        let selector = TenantSelector::predicate(|id| id.0 % 2 == 0);
        let ids = selector.resolve(known).unwrap();
        assert_eq!(ids, BTreeSet::from([TenantId(2), TenantId(4)]));
    }

    #[test]
    fn test_all_returns_every_tenant() {
        let ids = TenantSelector::All.resolve(known).unwrap();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_empty_explicit_set_is_rejected() {
        let selector = TenantSelector::Explicit(BTreeSet::new());
        assert!(matches!(
            selector.validate("origin.tenants"),
            Err(SyncError::ConfigError(_))
        ));
    }
}
