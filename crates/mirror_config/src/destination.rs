//! Destination side of a rule: where copies go and how they are shaped

use crate::selector::TenantSelector;
use mirror_common::{
    AuthorId, Record, RecordDraft, RecordId, Result, SyncError, TenantId, TenantScope,
    IDENTITY_META_KEY,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// What a [`PostSyncHook`] gets to see after a destination copy is written
#[derive(Debug)]
pub struct HookContext<'a> {
    /// The destination tenant, for follow-up reads and writes
    pub destination: TenantScope<'a>,

    /// Destination copy the draft was written to
    pub destination_id: RecordId,

    pub origin: &'a Record,

    pub draft: &'a RecordDraft,
}

/// Caller-defined augmentation run after each destination write
pub type PostSyncHook = Arc<dyn Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Where and how synced copies are written.
///
/// Built through [`DestinationSpec::builder`]; immutable once built.
#[derive(Clone)]
pub struct DestinationSpec {
    tenants: TenantSelector,
    type_mapping: BTreeMap<String, String>,
    add_terms: BTreeMap<String, BTreeSet<String>>,
    remove_terms: BTreeMap<String, BTreeSet<String>>,
    add_metadata: BTreeMap<String, Vec<String>>,
    remove_metadata: BTreeSet<String>,
    author_override: Option<AuthorId>,
    new_record_status: String,
    publish_updates_in_place: bool,
    synced_taxonomies: BTreeSet<String>,
    clear_empty_taxonomies: bool,
    sync_metadata: bool,
    sync_attachments: bool,
    post_sync_hook: Option<PostSyncHook>,
}

impl DestinationSpec {
    pub fn builder() -> DestinationSpecBuilder {
        DestinationSpecBuilder::default()
    }

    pub fn tenants(&self) -> &TenantSelector {
        &self.tenants
    }

    /// Destination type for an origin record type
    pub fn map_type<'a>(&'a self, origin_type: &'a str) -> &'a str {
        self.type_mapping
            .get(origin_type)
            .map(String::as_str)
            .unwrap_or(origin_type)
    }

    pub fn type_mapping(&self) -> &BTreeMap<String, String> {
        &self.type_mapping
    }

    pub fn add_terms(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.add_terms
    }

    pub fn remove_terms(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.remove_terms
    }

    pub fn add_metadata(&self) -> &BTreeMap<String, Vec<String>> {
        &self.add_metadata
    }

    pub fn remove_metadata(&self) -> &BTreeSet<String> {
        &self.remove_metadata
    }

    pub fn author_override(&self) -> Option<AuthorId> {
        self.author_override
    }

    pub fn new_record_status(&self) -> &str {
        &self.new_record_status
    }

    pub fn publish_updates_in_place(&self) -> bool {
        self.publish_updates_in_place
    }

    pub fn synced_taxonomies(&self) -> &BTreeSet<String> {
        &self.synced_taxonomies
    }

    /// Whether synced taxonomies the origin has no terms in are cleared on
    /// the destination instead of left alone
    pub fn clear_empty_taxonomies(&self) -> bool {
        self.clear_empty_taxonomies
    }

    pub fn sync_metadata(&self) -> bool {
        self.sync_metadata
    }

    pub fn sync_attachments(&self) -> bool {
        self.sync_attachments
    }

    pub fn post_sync_hook(&self) -> Option<&PostSyncHook> {
        self.post_sync_hook.as_ref()
    }
}

impl Default for DestinationSpec {
    fn default() -> Self {
        Self {
            tenants: TenantSelector::All,
            type_mapping: BTreeMap::new(),
            add_terms: BTreeMap::new(),
            remove_terms: BTreeMap::new(),
            add_metadata: BTreeMap::new(),
            remove_metadata: BTreeSet::new(),
            author_override: None,
            new_record_status: default_new_record_status(),
            publish_updates_in_place: false,
            synced_taxonomies: default_synced_taxonomies(),
            clear_empty_taxonomies: false,
            sync_metadata: true,
            sync_attachments: true,
            post_sync_hook: None,
        }
    }
}

fn default_new_record_status() -> String {
    "pending".to_string()
}

fn default_synced_taxonomies() -> BTreeSet<String> {
    BTreeSet::from(["category".to_string(), "tag".to_string()])
}

impl fmt::Debug for DestinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationSpec")
            .field("tenants", &self.tenants)
            .field("type_mapping", &self.type_mapping)
            .field("add_terms", &self.add_terms)
            .field("remove_terms", &self.remove_terms)
            .field("add_metadata", &self.add_metadata)
            .field("remove_metadata", &self.remove_metadata)
            .field("author_override", &self.author_override)
            .field("new_record_status", &self.new_record_status)
            .field("publish_updates_in_place", &self.publish_updates_in_place)
            .field("synced_taxonomies", &self.synced_taxonomies)
            .field("clear_empty_taxonomies", &self.clear_empty_taxonomies)
            .field("sync_metadata", &self.sync_metadata)
            .field("sync_attachments", &self.sync_attachments)
            .field("post_sync_hook", &self.post_sync_hook.is_some())
            .finish()
    }
}

/// Builder for [`DestinationSpec`]
#[derive(Debug, Default)]
pub struct DestinationSpecBuilder {
    spec: DestinationSpec,
}

impl DestinationSpecBuilder {
    pub fn tenants(mut self, tenants: TenantSelector) -> Self {
        self.spec.tenants = tenants;
        self
    }

    pub fn map_type(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.spec.type_mapping.insert(from.into(), to.into());
        self
    }

    pub fn add_terms<I, S>(mut self, taxonomy: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .add_terms
            .entry(taxonomy.into())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn remove_terms<I, S>(mut self, taxonomy: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .remove_terms
            .entry(taxonomy.into())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }

    /// Force-include `values` under `key` (appended after origin values)
    pub fn add_metadata<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .add_metadata
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn remove_metadata(mut self, key: impl Into<String>) -> Self {
        self.spec.remove_metadata.insert(key.into());
        self
    }

    pub fn author_override(mut self, author: AuthorId) -> Self {
        self.spec.author_override = Some(author);
        self
    }

    pub fn new_record_status(mut self, status: impl Into<String>) -> Self {
        self.spec.new_record_status = status.into();
        self
    }

    pub fn publish_updates_in_place(mut self, in_place: bool) -> Self {
        self.spec.publish_updates_in_place = in_place;
        self
    }

    pub fn synced_taxonomies<I, S>(mut self, taxonomies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.synced_taxonomies = taxonomies.into_iter().map(Into::into).collect();
        self
    }

    pub fn clear_empty_taxonomies(mut self, enabled: bool) -> Self {
        self.spec.clear_empty_taxonomies = enabled;
        self
    }

    pub fn sync_metadata(mut self, enabled: bool) -> Self {
        self.spec.sync_metadata = enabled;
        self
    }

    pub fn sync_attachments(mut self, enabled: bool) -> Self {
        self.spec.sync_attachments = enabled;
        self
    }

    pub fn post_sync_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.spec.post_sync_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<DestinationSpec> {
        let spec = self.spec;

        spec.tenants.validate("destination.tenants")?;
        if spec.new_record_status.trim().is_empty() {
            return Err(SyncError::ConfigError(
                "destination.new_record_status cannot be empty".to_string(),
            ));
        }
        for (from, to) in &spec.type_mapping {
            if from.is_empty() || to.is_empty() {
                return Err(SyncError::ConfigError(format!(
                    "destination.type_mapping: invalid entry {from:?} -> {to:?}"
                )));
            }
        }
        if spec.synced_taxonomies.iter().any(|t| t.is_empty()) {
            return Err(SyncError::ConfigError(
                "destination.synced_taxonomies contains an empty name".to_string(),
            ));
        }
        if spec.add_metadata.contains_key(IDENTITY_META_KEY)
            || spec.remove_metadata.contains(IDENTITY_META_KEY)
        {
            return Err(SyncError::ConfigError(format!(
                "destination metadata overlays cannot touch the reserved key {IDENTITY_META_KEY}"
            )));
        }

        Ok(spec)
    }
}

/// Declarative form of [`DestinationSpec`] as read from TOML.
///
/// Predicate selectors and post-sync hooks can only be set from code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationSettings {
    /// Explicit tenant ids; omitted means every tenant
    pub tenants: Option<Vec<TenantId>>,
    pub type_mapping: BTreeMap<String, String>,
    pub add_terms: BTreeMap<String, Vec<String>>,
    pub remove_terms: BTreeMap<String, Vec<String>>,
    pub add_metadata: BTreeMap<String, Vec<String>>,
    pub remove_metadata: Vec<String>,
    pub author_override: Option<AuthorId>,
    pub new_record_status: Option<String>,
    pub publish_updates_in_place: bool,
    pub synced_taxonomies: Option<Vec<String>>,
    pub clear_empty_taxonomies: bool,
    pub sync_metadata: Option<bool>,
    pub sync_attachments: Option<bool>,
}

impl TryFrom<DestinationSettings> for DestinationSpec {
    type Error = SyncError;

    fn try_from(settings: DestinationSettings) -> Result<Self> {
        let mut builder = DestinationSpec::builder()
            .tenants(settings.tenants.into())
            .publish_updates_in_place(settings.publish_updates_in_place)
            .clear_empty_taxonomies(settings.clear_empty_taxonomies);

        for (from, to) in settings.type_mapping {
            builder = builder.map_type(from, to);
        }
        for (taxonomy, terms) in settings.add_terms {
            builder = builder.add_terms(taxonomy, terms);
        }
        for (taxonomy, terms) in settings.remove_terms {
            builder = builder.remove_terms(taxonomy, terms);
        }
        for (key, values) in settings.add_metadata {
            builder = builder.add_metadata(key, values);
        }
        for key in settings.remove_metadata {
            builder = builder.remove_metadata(key);
        }
        if let Some(author) = settings.author_override {
            builder = builder.author_override(author);
        }
        if let Some(status) = settings.new_record_status {
            builder = builder.new_record_status(status);
        }
        if let Some(taxonomies) = settings.synced_taxonomies {
            builder = builder.synced_taxonomies(taxonomies);
        }
        if let Some(enabled) = settings.sync_metadata {
            builder = builder.sync_metadata(enabled);
        }
        if let Some(enabled) = settings.sync_attachments {
            builder = builder.sync_attachments(enabled);
        }

        builder.build()
    }
}
