//! In-memory multi-tenant content platform

use crate::files;
use chrono::Utc;
use mirror_common::{
    ContentStore, FileCopyMode, Metadata, Record, RecordDraft, RecordId, Result, SaveEvent,
    SaveListener, SyncError, TenantId, ATTACHMENT_TYPE, REVISION_TYPE,
};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything one tenant stores
#[derive(Debug, Default)]
struct TenantState {
    next_id: u64,
    records: BTreeMap<RecordId, Record>,
    metadata: HashMap<RecordId, Metadata>,
    terms: HashMap<RecordId, BTreeMap<String, Vec<String>>>,
    featured: HashMap<RecordId, RecordId>,
    variants: HashMap<RecordId, Vec<PathBuf>>,
}

impl TenantState {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }

    fn require(&self, tenant: TenantId, id: RecordId) -> Result<&Record> {
        self.records
            .get(&id)
            .ok_or(SyncError::RecordNotFound { tenant, record: id })
    }
}

/// Thread-safe in-memory implementation of [`ContentStore`].
///
/// File payloads live on disk under `<root>/tenant-<id>/`. Save events are
/// dispatched to subscribers after the write completes and after every
/// internal lock is released, so a listener may write back into the store.
pub struct MemoryStore {
    root: PathBuf,
    variant_sizes: Vec<String>,
    tenants: Mutex<BTreeMap<TenantId, TenantState>>,
    listeners: Mutex<Vec<Arc<dyn SaveListener>>>,
}

impl MemoryStore {
    /// Create an empty platform storing payloads under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            variant_sizes: vec!["thumbnail".to_string(), "medium".to_string()],
            tenants: Mutex::new(BTreeMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Sizes produced by [`ContentStore::generate_file_variants`]
    pub fn with_variant_sizes<I, S>(mut self, sizes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variant_sizes = sizes.into_iter().map(Into::into).collect();
        self
    }

    /// Register a tenant and create its upload directory
    pub fn add_tenant(&self, tenant: TenantId) -> Result<()> {
        fs::create_dir_all(self.tenant_dir(tenant))?;
        self.lock_tenants().entry(tenant).or_default();
        tracing::debug!("Added tenant {}", tenant);
        Ok(())
    }

    /// Register a listener (the platform's `onRecordSaved`)
    pub fn subscribe(&self, listener: Arc<dyn SaveListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Records of a tenant, revisions included, in id order
    pub fn records(&self, tenant: TenantId) -> Vec<Record> {
        self.lock_tenants()
            .get(&tenant)
            .map(|state| state.records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Records of a tenant that are neither revisions nor attachments
    pub fn content_records(&self, tenant: TenantId) -> Vec<Record> {
        self.records(tenant)
            .into_iter()
            .filter(|r| !r.is_revision() && !r.is_attachment())
            .collect()
    }

    /// Revisions staged for `parent`
    pub fn revisions_of(&self, tenant: TenantId, parent: RecordId) -> Vec<Record> {
        self.records(tenant)
            .into_iter()
            .filter(|r| r.is_revision() && r.parent == Some(parent))
            .collect()
    }

    /// Variant files last generated for an attachment
    pub fn variants(&self, tenant: TenantId, attachment: RecordId) -> Vec<PathBuf> {
        self.lock_tenants()
            .get(&tenant)
            .and_then(|state| state.variants.get(&attachment).cloned())
            .unwrap_or_default()
    }

    fn tenant_dir(&self, tenant: TenantId) -> PathBuf {
        self.root.join(format!("tenant-{}", tenant))
    }

    fn lock_tenants(&self) -> MutexGuard<'_, BTreeMap<TenantId, TenantState>> {
        self.tenants.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against one tenant's state under the lock
    fn with_tenant<T>(
        &self,
        tenant: TenantId,
        f: impl FnOnce(&mut TenantState) -> Result<T>,
    ) -> Result<T> {
        let mut tenants = self.lock_tenants();
        let state = tenants
            .get_mut(&tenant)
            .ok_or_else(|| SyncError::StoreError(format!("unknown tenant {}", tenant)))?;
        f(state)
    }

    fn dispatch(&self, event: SaveEvent) -> Result<()> {
        let listeners: Vec<Arc<dyn SaveListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in listeners {
            listener.on_record_saved(self, &event)?;
        }
        Ok(())
    }

    fn new_record(tenant: TenantId, id: RecordId, draft: &RecordDraft) -> Record {
        let now = Utc::now();
        Record {
            id,
            record_type: draft.record_type.clone(),
            status: draft.status.clone(),
            author: draft.author,
            title: draft.title.clone(),
            content: draft.content.clone(),
            excerpt: draft.excerpt.clone(),
            guid: format!("mirror://tenant-{}/records/{}", tenant, id),
            parent: draft.parent,
            file: draft.file.clone(),
            mime_type: draft.mime_type.clone(),
            created_at: now,
            modified_at: now,
        }
    }
}

impl ContentStore for MemoryStore {
    fn tenant_ids(&self) -> Result<Vec<TenantId>> {
        Ok(self.lock_tenants().keys().copied().collect())
    }

    fn get_record(&self, tenant: TenantId, id: RecordId) -> Result<Option<Record>> {
        self.with_tenant(tenant, |state| Ok(state.records.get(&id).cloned()))
    }

    fn insert_record(&self, tenant: TenantId, draft: &RecordDraft) -> Result<RecordId> {
        let record = self.with_tenant(tenant, |state| {
            let id = state.allocate_id();
            let record = Self::new_record(tenant, id, draft);
            state.records.insert(id, record.clone());
            Ok(record)
        })?;

        let id = record.id;
        tracing::debug!("Inserted {} record {} in tenant {}", record.record_type, id, tenant);
        self.dispatch(SaveEvent {
            tenant,
            record,
            is_update: false,
            autosave: false,
        })?;
        Ok(id)
    }

    fn update_record(&self, tenant: TenantId, id: RecordId, draft: &RecordDraft) -> Result<()> {
        let record = self.with_tenant(tenant, |state| {
            let record = state
                .records
                .get_mut(&id)
                .ok_or(SyncError::RecordNotFound { tenant, record: id })?;

            record.record_type = draft.record_type.clone();
            record.status = draft.status.clone();
            record.author = draft.author;
            record.title = draft.title.clone();
            record.content = draft.content.clone();
            record.excerpt = draft.excerpt.clone();
            record.parent = draft.parent;
            record.file = draft.file.clone();
            record.mime_type = draft.mime_type.clone();
            record.modified_at = Utc::now();
            Ok(record.clone())
        })?;

        tracing::debug!("Updated record {} in tenant {}", id, tenant);
        self.dispatch(SaveEvent {
            tenant,
            record,
            is_update: true,
            autosave: false,
        })
    }

    fn create_revision(
        &self,
        tenant: TenantId,
        parent: RecordId,
        draft: &RecordDraft,
    ) -> Result<RecordId> {
        let revision = self.with_tenant(tenant, |state| {
            state.require(tenant, parent)?;
            let id = state.allocate_id();
            let mut staged = draft.clone();
            staged.record_type = REVISION_TYPE.to_string();
            staged.parent = Some(parent);
            let revision = Self::new_record(tenant, id, &staged);
            state.records.insert(id, revision.clone());
            Ok(revision)
        })?;

        let id = revision.id;
        tracing::debug!("Staged revision {} of record {} in tenant {}", id, parent, tenant);
        self.dispatch(SaveEvent {
            tenant,
            record: revision,
            is_update: false,
            autosave: false,
        })?;
        Ok(id)
    }

    fn pending_revision(&self, tenant: TenantId, parent: RecordId) -> Result<Option<RecordId>> {
        self.with_tenant(tenant, |state| {
            Ok(state
                .records
                .values()
                .filter(|r| r.is_revision() && r.parent == Some(parent))
                .map(|r| r.id)
                .max())
        })
    }

    fn delete_revision(&self, tenant: TenantId, revision: RecordId) -> Result<()> {
        self.with_tenant(tenant, |state| {
            if !state.require(tenant, revision)?.is_revision() {
                return Err(SyncError::StoreError(format!(
                    "record {} in tenant {} is not a revision",
                    revision, tenant
                )));
            }
            state.records.remove(&revision);
            state.metadata.remove(&revision);
            state.terms.remove(&revision);
            Ok(())
        })
    }

    fn get_metadata(&self, tenant: TenantId, id: RecordId) -> Result<Metadata> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, id)?;
            Ok(state.metadata.get(&id).cloned().unwrap_or_default())
        })
    }

    fn add_metadata_value(
        &self,
        tenant: TenantId,
        id: RecordId,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, id)?;
            state
                .metadata
                .entry(id)
                .or_default()
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
            Ok(())
        })
    }

    fn delete_metadata_key(&self, tenant: TenantId, id: RecordId, key: &str) -> Result<()> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, id)?;
            if let Some(metadata) = state.metadata.get_mut(&id) {
                metadata.remove(key);
            }
            Ok(())
        })
    }

    fn find_by_metadata(&self, tenant: TenantId, key: &str, value: &str) -> Result<Vec<RecordId>> {
        self.with_tenant(tenant, |state| {
            let mut ids: Vec<RecordId> = state
                .metadata
                .iter()
                .filter(|(_, metadata)| {
                    metadata
                        .get(key)
                        .is_some_and(|values| values.iter().any(|v| v == value))
                })
                .map(|(id, _)| *id)
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn get_terms(&self, tenant: TenantId, id: RecordId, taxonomy: &str) -> Result<Vec<String>> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, id)?;
            Ok(state
                .terms
                .get(&id)
                .and_then(|taxonomies| taxonomies.get(taxonomy).cloned())
                .unwrap_or_default())
        })
    }

    fn set_terms(
        &self,
        tenant: TenantId,
        id: RecordId,
        taxonomy: &str,
        terms: &[String],
    ) -> Result<()> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, id)?;
            let mut unique: Vec<String> = Vec::with_capacity(terms.len());
            for term in terms {
                if !unique.contains(term) {
                    unique.push(term.clone());
                }
            }
            state
                .terms
                .entry(id)
                .or_default()
                .insert(taxonomy.to_string(), unique);
            Ok(())
        })
    }

    fn attachments_of(&self, tenant: TenantId, parent: RecordId) -> Result<Vec<Record>> {
        self.with_tenant(tenant, |state| {
            Ok(state
                .records
                .values()
                .filter(|r| r.record_type == ATTACHMENT_TYPE && r.parent == Some(parent))
                .cloned()
                .collect())
        })
    }

    fn featured_attachment(&self, tenant: TenantId, id: RecordId) -> Result<Option<RecordId>> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, id)?;
            Ok(state.featured.get(&id).copied())
        })
    }

    fn set_featured_attachment(
        &self,
        tenant: TenantId,
        id: RecordId,
        attachment: RecordId,
    ) -> Result<()> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, id)?;
            if !state.require(tenant, attachment)?.is_attachment() {
                return Err(SyncError::StoreError(format!(
                    "record {} in tenant {} is not an attachment",
                    attachment, tenant
                )));
            }
            state.featured.insert(id, attachment);
            Ok(())
        })
    }

    fn upload_dir(&self, tenant: TenantId) -> Result<PathBuf> {
        self.with_tenant(tenant, |_| Ok(()))?;
        Ok(self.tenant_dir(tenant))
    }

    fn copy_file(&self, src: &Path, dest_dir: &Path, mode: FileCopyMode) -> Result<PathBuf> {
        files::copy_file(src, dest_dir, mode)
    }

    fn generate_file_variants(
        &self,
        tenant: TenantId,
        attachment: RecordId,
        path: &Path,
    ) -> Result<Vec<PathBuf>> {
        self.with_tenant(tenant, |state| {
            state.require(tenant, attachment).map(|_| ())
        })?;

        let variants = files::write_variants(path, &self.variant_sizes)?;
        self.with_tenant(tenant, |state| {
            state.variants.insert(attachment, variants.clone());
            Ok(())
        })?;
        Ok(variants)
    }
}
