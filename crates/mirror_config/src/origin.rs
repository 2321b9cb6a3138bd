//! Origin side of a rule: which records qualify for propagation

use crate::selector::TenantSelector;
use mirror_common::{AuthorId, Result, SyncError, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which records, in which tenants, are syncable.
///
/// Built through [`OriginSpec::builder`]; immutable once built.
#[derive(Debug, Clone)]
pub struct OriginSpec {
    tenants: TenantSelector,
    record_types: BTreeSet<String>,
    statuses: BTreeSet<String>,
    authors: Option<BTreeSet<AuthorId>>,
    required_terms: BTreeMap<String, BTreeSet<String>>,
}

impl OriginSpec {
    pub fn builder() -> OriginSpecBuilder {
        OriginSpecBuilder::default()
    }

    pub fn tenants(&self) -> &TenantSelector {
        &self.tenants
    }

    pub fn record_types(&self) -> &BTreeSet<String> {
        &self.record_types
    }

    pub fn statuses(&self) -> &BTreeSet<String> {
        &self.statuses
    }

    /// Allowed authors; `None` means any author
    pub fn authors(&self) -> Option<&BTreeSet<AuthorId>> {
        self.authors.as_ref()
    }

    /// Taxonomy -> terms of which a record must carry at least one
    pub fn required_terms(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.required_terms
    }
}

impl Default for OriginSpec {
    fn default() -> Self {
        Self {
            tenants: TenantSelector::All,
            record_types: default_record_types(),
            statuses: default_statuses(),
            authors: None,
            required_terms: BTreeMap::new(),
        }
    }
}

fn default_record_types() -> BTreeSet<String> {
    BTreeSet::from(["post".to_string()])
}

fn default_statuses() -> BTreeSet<String> {
    BTreeSet::from(["publish".to_string()])
}

/// Builder for [`OriginSpec`]
#[derive(Debug, Default)]
pub struct OriginSpecBuilder {
    spec: OriginSpec,
}

impl OriginSpecBuilder {
    pub fn tenants(mut self, tenants: TenantSelector) -> Self {
        self.spec.tenants = tenants;
        self
    }

    pub fn record_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.record_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn authors(mut self, authors: impl IntoIterator<Item = AuthorId>) -> Self {
        self.spec.authors = Some(authors.into_iter().collect());
        self
    }

    /// Require at least one of `terms` in `taxonomy`
    pub fn require_terms<I, S>(mut self, taxonomy: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .required_terms
            .entry(taxonomy.into())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<OriginSpec> {
        let spec = self.spec;

        spec.tenants.validate("origin.tenants")?;
        if spec.record_types.is_empty() {
            return Err(SyncError::ConfigError(
                "origin.record_types cannot be empty".to_string(),
            ));
        }
        if spec.statuses.is_empty() {
            return Err(SyncError::ConfigError(
                "origin.statuses cannot be empty".to_string(),
            ));
        }
        if let Some(authors) = &spec.authors {
            if authors.is_empty() {
                return Err(SyncError::ConfigError(
                    "origin.authors cannot be an empty set (omit it to allow any author)"
                        .to_string(),
                ));
            }
        }
        for (taxonomy, terms) in &spec.required_terms {
            if terms.is_empty() {
                return Err(SyncError::ConfigError(format!(
                    "origin.required_terms.{taxonomy} cannot be empty"
                )));
            }
        }

        Ok(spec)
    }
}

/// Declarative form of [`OriginSpec`] as read from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OriginSettings {
    /// Explicit tenant ids; omitted means every tenant
    pub tenants: Option<Vec<TenantId>>,
    pub record_types: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub authors: Option<Vec<AuthorId>>,
    pub required_terms: BTreeMap<String, Vec<String>>,
}

impl TryFrom<OriginSettings> for OriginSpec {
    type Error = SyncError;

    fn try_from(settings: OriginSettings) -> Result<Self> {
        let mut builder = OriginSpec::builder().tenants(settings.tenants.into());
        if let Some(types) = settings.record_types {
            builder = builder.record_types(types);
        }
        if let Some(statuses) = settings.statuses {
            builder = builder.statuses(statuses);
        }
        if let Some(authors) = settings.authors {
            builder = builder.authors(authors);
        }
        for (taxonomy, terms) in settings.required_terms {
            if terms.is_empty() {
                return Err(SyncError::ConfigError(format!(
                    "origin.required_terms.{taxonomy} cannot be empty"
                )));
            }
            builder = builder.require_terms(taxonomy, terms);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = OriginSpec::builder().build().unwrap();
        assert!(matches!(spec.tenants(), TenantSelector::All));
        assert!(spec.record_types().contains("post"));
        assert!(spec.statuses().contains("publish"));
        assert!(spec.authors().is_none());
        assert!(spec.required_terms().is_empty());
    }

    #[test]
    fn test_required_terms_accumulate_per_taxonomy() {
        let spec = OriginSpec::builder()
            .require_terms("category", ["news"])
            .require_terms("category", ["featured"])
            .build()
            .unwrap();

        let terms = &spec.required_terms()["category"];
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn test_invalid_specs_are_rejected() {
        let empty: [&str; 0] = [];
        assert!(OriginSpec::builder().record_types(empty).build().is_err());
        assert!(OriginSpec::builder().statuses(empty).build().is_err());
        assert!(OriginSpec::builder().authors(Vec::new()).build().is_err());
        assert!(OriginSpec::builder()
            .require_terms("category", empty)
            .build()
            .is_err());
    }

    #[test]
    fn test_settings_conversion() {
        let settings = OriginSettings {
            tenants: Some(vec![TenantId(1)]),
            record_types: Some(vec!["post".into(), "page".into()]),
            required_terms: BTreeMap::from([("category".to_string(), vec!["news".to_string()])]),
            ..Default::default()
        };

        let spec = OriginSpec::try_from(settings).unwrap();
        assert_eq!(spec.record_types().len(), 2);
        assert!(matches!(spec.tenants(), TenantSelector::Explicit(ids) if ids.len() == 1));
    }
}
