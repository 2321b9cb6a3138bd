//! Per-event sync reports

use crate::eligibility::Ineligible;
use crate::reconcile::ReconcileOutcome;
use mirror_common::{RecordKey, Result, TenantId};

/// Result for one destination tenant
#[derive(Debug)]
pub struct DestinationResult {
    pub tenant: TenantId,
    pub outcome: Result<ReconcileOutcome>,
}

/// What one rule did with one origin save
#[derive(Debug)]
pub struct SyncReport {
    /// Origin record, keyed by the rule's home tenant
    pub origin: RecordKey,

    /// Set when the record did not pass the origin filter
    pub skipped: Option<Ineligible>,

    pub destinations: Vec<DestinationResult>,
}

impl SyncReport {
    pub fn new(origin: RecordKey) -> Self {
        Self {
            origin,
            skipped: None,
            destinations: Vec::new(),
        }
    }

    pub fn skipped(origin: RecordKey, reason: Ineligible) -> Self {
        Self {
            origin,
            skipped: Some(reason),
            destinations: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// Destination tenants whose reconciliation failed
    pub fn failed_tenants(&self) -> Vec<TenantId> {
        self.destinations
            .iter()
            .filter(|d| d.outcome.is_err())
            .map(|d| d.tenant)
            .collect()
    }

    pub fn outcome_for(&self, tenant: TenantId) -> Option<&ReconcileOutcome> {
        self.destinations
            .iter()
            .find(|d| d.tenant == tenant)
            .and_then(|d| d.outcome.as_ref().ok())
    }

    pub fn is_success(&self) -> bool {
        self.destinations.iter().all(|d| d.outcome.is_ok())
    }
}
