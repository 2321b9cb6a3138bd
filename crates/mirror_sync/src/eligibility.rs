//! Does a saved record qualify for propagation?

use mirror_common::{AuthorId, ContentStore, Record, Result, TenantId, TenantScope};
use mirror_config::OriginSpec;
use std::fmt;

/// Why a record was not propagated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    TenantNotSelected(TenantId),
    RecordType(String),
    Status(String),
    Author(AuthorId),
    MissingTerms { taxonomy: String },
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TenantNotSelected(tenant) => write!(f, "tenant {} is not an origin", tenant),
            Self::RecordType(t) => write!(f, "record type {:?} is not synced", t),
            Self::Status(s) => write!(f, "status {:?} is not synced", s),
            Self::Author(a) => write!(f, "author {} is not synced", a),
            Self::MissingTerms { taxonomy } => {
                write!(f, "no required term in taxonomy {:?}", taxonomy)
            }
        }
    }
}

/// Verdict of the [`EligibilityFilter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(Ineligible),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Predicate over records, driven by an [`OriginSpec`]
#[derive(Debug, Clone, Copy)]
pub struct EligibilityFilter<'a> {
    spec: &'a OriginSpec,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(spec: &'a OriginSpec) -> Self {
        Self { spec }
    }

    /// Evaluate `record`, saved in `home`, stopping at the first failed check.
    ///
    /// Only reads: the tenant list (for non-explicit selectors) and the
    /// record's current terms.
    pub fn evaluate(
        &self,
        store: &dyn ContentStore,
        home: TenantId,
        record: &Record,
    ) -> Result<Eligibility> {
        let spec = self.spec;

        let origins = spec.tenants().resolve(|| store.tenant_ids())?;
        if !origins.contains(&home) {
            return Ok(Eligibility::Ineligible(Ineligible::TenantNotSelected(home)));
        }

        if !spec.record_types().contains(&record.record_type) {
            return Ok(Eligibility::Ineligible(Ineligible::RecordType(
                record.record_type.clone(),
            )));
        }

        if !spec.statuses().contains(&record.status) {
            return Ok(Eligibility::Ineligible(Ineligible::Status(
                record.status.clone(),
            )));
        }

        if let Some(authors) = spec.authors() {
            if !authors.contains(&record.author) {
                return Ok(Eligibility::Ineligible(Ineligible::Author(record.author)));
            }
        }

        let scope = TenantScope::new(store, home);
        for (taxonomy, required) in spec.required_terms() {
            let current = scope.terms(record.id, taxonomy)?;
            if !current.iter().any(|term| required.contains(term)) {
                return Ok(Eligibility::Ineligible(Ineligible::MissingTerms {
                    taxonomy: taxonomy.clone(),
                }));
            }
        }

        Ok(Eligibility::Eligible)
    }

    pub fn is_eligible(
        &self,
        store: &dyn ContentStore,
        home: TenantId,
        record: &Record,
    ) -> Result<bool> {
        Ok(self.evaluate(store, home, record)?.is_eligible())
    }
}
