//! Domain-specific assertions for SiteMirror tests

use mirror_common::{Metadata, RecordKey, IDENTITY_META_KEY};
use predicates::prelude::*;
use std::collections::BTreeSet;

/// Metadata holds exactly `values`, in order, under `key`
pub fn metadata_values(key: &str, values: &[&str]) -> impl Predicate<Metadata> {
    let key = key.to_string();
    let expected: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    predicate::function(move |metadata: &Metadata| metadata.get(&key) == Some(&expected))
}

/// Metadata marks its record as the copy of `origin`
pub fn copy_of(origin: RecordKey) -> impl Predicate<Metadata> {
    let marker = origin.to_string();
    predicate::function(move |metadata: &Metadata| {
        metadata
            .get(IDENTITY_META_KEY)
            .is_some_and(|values| values.len() == 1 && values[0] == marker)
    })
}

/// Term list holds exactly `terms`, each once, in any order
pub fn same_terms(terms: &[&str]) -> impl Predicate<[String]> {
    let expected: BTreeSet<String> = terms.iter().map(|t| t.to_string()).collect();
    predicate::function(move |actual: &[String]| {
        let actual_set: BTreeSet<String> = actual.iter().cloned().collect();
        actual_set.len() == actual.len() && actual_set == expected
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_common::{RecordId, TenantId};

    #[test]
    fn test_metadata_values() {
        let mut metadata = Metadata::new();
        metadata.insert("color".into(), vec!["red".into(), "blue".into()]);

        assert!(metadata_values("color", &["red", "blue"]).eval(&metadata));
        assert!(!metadata_values("color", &["blue", "red"]).eval(&metadata));
        assert!(!metadata_values("size", &["xl"]).eval(&metadata));
    }

    #[test]
    fn test_copy_of() {
        let origin = RecordKey::new(TenantId(1), RecordId(4));
        let mut metadata = Metadata::new();
        assert!(!copy_of(origin).eval(&metadata));

        metadata.insert(IDENTITY_META_KEY.into(), vec!["1:4".into()]);
        assert!(copy_of(origin).eval(&metadata));
    }

    #[test]
    fn test_same_terms() {
        let terms = vec!["world".to_string(), "news".to_string()];
        assert!(same_terms(&["news", "world"]).eval(terms.as_slice()));
        assert!(!same_terms(&["news"]).eval(terms.as_slice()));

        let doubled = vec!["news".to_string(), "news".to_string()];
        assert!(!same_terms(&["news", "world"]).eval(doubled.as_slice()));
        assert!(!same_terms(&["news"]).eval(doubled.as_slice()));
    }
}
