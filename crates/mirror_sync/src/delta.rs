//! Metadata and term deltas
//!
//! Deltas are computed once per origin save and applied identically to every
//! destination of a rule. Applying a delta replaces, per key or taxonomy,
//! whatever the destination held before; keys and taxonomies absent from the
//! delta are left alone.

use mirror_common::{Metadata, RecordId, Result, TenantScope, IDENTITY_META_KEY};
use mirror_config::DestinationSpec;
use std::collections::{BTreeMap, BTreeSet};

/// Metadata key -> values written to the destination, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataDelta(BTreeMap<String, Vec<String>>);

impl MetadataDelta {
    /// A delta that copies `metadata` verbatim, identity marker excluded
    pub fn mirror(mut metadata: Metadata) -> Self {
        metadata.remove(IDENTITY_META_KEY);
        Self(metadata)
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Delete-then-rewrite every key of the delta on `id`
    pub fn apply(&self, scope: TenantScope<'_>, id: RecordId) -> Result<()> {
        for (key, values) in &self.0 {
            scope.replace_metadata(id, key, values)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

/// Taxonomy -> exact term set written to the destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermsDelta(BTreeMap<String, BTreeSet<String>>);

impl TermsDelta {
    pub fn get(&self, taxonomy: &str) -> Option<&BTreeSet<String>> {
        self.0.get(taxonomy)
    }

    pub fn taxonomies(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set each taxonomy of the delta on `id` to exactly the delta's terms
    pub fn apply(&self, scope: TenantScope<'_>, id: RecordId) -> Result<()> {
        for (taxonomy, terms) in &self.0 {
            let terms: Vec<String> = terms.iter().cloned().collect();
            scope.set_terms(id, taxonomy, &terms)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> BTreeMap<String, BTreeSet<String>> {
        self.0
    }
}

/// Metadata to write on destination copies of `record`.
///
/// Origin metadata (when `sync_metadata` is on), then `add_metadata` values
/// appended per key without dedup, then `remove_metadata` keys dropped.
pub fn compute_metadata_delta(
    origin: TenantScope<'_>,
    record: RecordId,
    spec: &DestinationSpec,
) -> Result<MetadataDelta> {
    let mut delta = if spec.sync_metadata() {
        MetadataDelta::mirror(origin.metadata(record)?)
    } else {
        MetadataDelta::default()
    };

    for (key, values) in spec.add_metadata() {
        delta
            .0
            .entry(key.clone())
            .or_default()
            .extend(values.iter().cloned());
    }
    for key in spec.remove_metadata() {
        delta.0.remove(key);
    }

    Ok(delta)
}

/// Terms to set on destination copies of `record`.
///
/// A synced taxonomy is present only when the origin has terms in it, unless
/// the spec asks for empty taxonomies to be cleared. Taxonomies named by
/// `add_terms` are always present.
pub fn compute_terms_delta(
    origin: TenantScope<'_>,
    record: RecordId,
    spec: &DestinationSpec,
) -> Result<TermsDelta> {
    let mut delta = BTreeMap::new();

    for taxonomy in spec.synced_taxonomies() {
        let terms: BTreeSet<String> = origin.terms(record, taxonomy)?.into_iter().collect();
        if !terms.is_empty() || spec.clear_empty_taxonomies() {
            delta.insert(taxonomy.clone(), terms);
        }
    }
    for (taxonomy, terms) in spec.add_terms() {
        delta
            .entry(taxonomy.clone())
            .or_insert_with(BTreeSet::new)
            .extend(terms.iter().cloned());
    }
    for (taxonomy, terms) in spec.remove_terms() {
        if let Some(current) = delta.get_mut(taxonomy) {
            current.retain(|term| !terms.contains(term));
        }
    }

    Ok(TermsDelta(delta))
}

/// Both deltas for one origin save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDelta {
    pub metadata: MetadataDelta,
    pub terms: TermsDelta,
}

impl SyncDelta {
    pub fn compute(
        origin: TenantScope<'_>,
        record: RecordId,
        spec: &DestinationSpec,
    ) -> Result<Self> {
        Ok(Self {
            metadata: compute_metadata_delta(origin, record, spec)?,
            terms: compute_terms_delta(origin, record, spec)?,
        })
    }
}
