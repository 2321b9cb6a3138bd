//! Save-event entry point

use crate::delta::SyncDelta;
use crate::eligibility::{Eligibility, EligibilityFilter};
use crate::guard::{InFlight, InFlightGuard, Release};
use crate::reconcile::Reconciler;
use crate::report::{DestinationResult, SyncReport};
use crate::rule::Rule;
use mirror_common::{
    ContentStore, Record, RecordId, Result, SaveEvent, SaveListener, SyncError, TenantId,
    TenantScope,
};
use mirror_config::{DestinationErrorPolicy, MirrorConfig, SyncSettings};

/// Runs every installed rule against saved records.
///
/// One orchestrator owns one [`InFlight`] set shared by all of its rules.
#[derive(Debug, Default)]
pub struct SyncOrchestrator {
    rules: Vec<Rule>,
    settings: SyncSettings,
    in_flight: InFlight,
}

impl SyncOrchestrator {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            rules: Vec::new(),
            settings,
            in_flight: InFlight::new(),
        }
    }

    /// Build from a declarative configuration
    pub fn from_config(config: MirrorConfig) -> Result<Self> {
        let mut orchestrator = Self::new(config.sync);
        for settings in config.rules {
            orchestrator.add_rule(Rule::from_settings(settings)?);
        }
        Ok(orchestrator)
    }

    pub fn add_rule(&mut self, rule: Rule) {
        tracing::debug!("Installed rule in tenant {}", rule.home());
        self.rules.push(rule);
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Handle one save event.
    ///
    /// Autosaves, revisions and newly created records are ignored, as are
    /// records this orchestrator is currently writing.
    #[tracing::instrument(skip_all, fields(tenant = %event.tenant, record = %event.record.id))]
    pub fn handle_save(&self, store: &dyn ContentStore, event: &SaveEvent) -> Result<Vec<SyncReport>> {
        if event.autosave || event.record.is_revision() || !event.is_update {
            tracing::debug!(
                autosave = event.autosave,
                is_update = event.is_update,
                "Ignoring save of {} record",
                event.record.record_type
            );
            return Ok(Vec::new());
        }
        self.run(store, event.tenant, &event.record)
    }

    /// Sync a stored record outside of the event path
    pub fn sync_record(
        &self,
        store: &dyn ContentStore,
        tenant: TenantId,
        record: RecordId,
    ) -> Result<Vec<SyncReport>> {
        let record = TenantScope::new(store, tenant).require_record(record)?;
        self.run(store, tenant, &record)
    }

    /// Sync `record` unless it is already in flight.
    ///
    /// Saves made by other threads while the record, or a copy it writes, is
    /// held are picked up here before returning, against the stored state.
    fn run(&self, store: &dyn ContentStore, tenant: TenantId, record: &Record) -> Result<Vec<SyncReport>> {
        let key = record.key(tenant);
        let Some(mut guard) = self.in_flight.enter(key) else {
            tracing::debug!("{} is being synced already, leaving it to that sync", key);
            return Ok(Vec::new());
        };

        let mut reports = self.run_rules(store, &mut guard, tenant, record)?;
        loop {
            match guard.release() {
                Release::Rerun => {
                    tracing::debug!("{} was saved again during its sync, running again", key);
                    let latest = TenantScope::new(store, tenant).require_record(record.id)?;
                    reports.extend(self.run_rules(store, &mut guard, tenant, &latest)?);
                }
                Release::Released(saved) => {
                    drop(guard);
                    for key in saved {
                        let scope = TenantScope::new(store, key.tenant);
                        if let Some(latest) = scope.record(key.record)? {
                            tracing::debug!("Syncing {} saved during another sync", key);
                            reports.extend(self.run(store, key.tenant, &latest)?);
                        }
                    }
                    return Ok(reports);
                }
            }
        }
    }

    fn run_rules(
        &self,
        store: &dyn ContentStore,
        guard: &mut InFlightGuard<'_>,
        tenant: TenantId,
        record: &Record,
    ) -> Result<Vec<SyncReport>> {
        self.rules
            .iter()
            .filter(|rule| rule.home() == tenant)
            .map(|rule| self.sync_rule(store, guard, rule, record))
            .collect()
    }

    fn sync_rule(
        &self,
        store: &dyn ContentStore,
        guard: &mut InFlightGuard<'_>,
        rule: &Rule,
        record: &Record,
    ) -> Result<SyncReport> {
        let home = rule.home();
        let origin = record.key(home);

        if let Eligibility::Ineligible(reason) =
            EligibilityFilter::new(rule.origin()).evaluate(store, home, record)?
        {
            tracing::debug!("Skipping {}: {}", origin, reason);
            return Ok(SyncReport::skipped(origin, reason));
        }

        let spec = rule.destination();
        let delta = SyncDelta::compute(TenantScope::new(store, home), record.id, spec)?;
        let reconciler = Reconciler::new(store, &self.settings);
        let mut report = SyncReport::new(origin);

        for tenant in rule.destination_tenants(store)? {
            let outcome = reconciler.reconcile(guard, tenant, home, record, &delta, spec);
            if let Err(e) = &outcome {
                tracing::error!("Failed to sync {} to tenant {}: {}", origin, tenant, e);
            }
            let outcome = match outcome {
                Err(e) if self.settings.on_destination_error == DestinationErrorPolicy::Abort => {
                    return Err(e)
                }
                outcome => outcome,
            };
            report.destinations.push(DestinationResult { tenant, outcome });
        }

        Ok(report)
    }
}

impl SaveListener for SyncOrchestrator {
    fn on_record_saved(&self, store: &dyn ContentStore, event: &SaveEvent) -> Result<()> {
        let reports = self.handle_save(store, event)?;

        let failed: Vec<TenantId> = reports.iter().flat_map(|r| r.failed_tenants()).collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(SyncError::DestinationsFailed { tenants: failed })
        }
    }
}
