//! Host platform contract
//!
//! SiteMirror does not own any storage. Everything it reads or writes goes
//! through [`ContentStore`], which a multi-tenant content platform provides.
//! Every call names its tenant explicitly; [`TenantScope`] binds a store to
//! one tenant for the duration of a borrow, so there is no ambient "current
//! tenant" to switch and restore.

use crate::{Metadata, Record, RecordDraft, RecordId, RecordKey, Result, SyncError, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// How file payloads are duplicated into another tenant's storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCopyMode {
    /// Byte copy
    #[default]
    Copy,

    /// Hard link (same filesystem only)
    HardLink,
}

/// Storage operations consumed from the host platform
pub trait ContentStore {
    /// Every tenant known to the platform
    fn tenant_ids(&self) -> Result<Vec<TenantId>>;

    fn get_record(&self, tenant: TenantId, id: RecordId) -> Result<Option<Record>>;

    fn insert_record(&self, tenant: TenantId, draft: &RecordDraft) -> Result<RecordId>;

    /// Overwrite the live fields of an existing record
    fn update_record(&self, tenant: TenantId, id: RecordId, draft: &RecordDraft) -> Result<()>;

    /// Stage `draft` as a revision of `parent` without touching its live fields
    fn create_revision(
        &self,
        tenant: TenantId,
        parent: RecordId,
        draft: &RecordDraft,
    ) -> Result<RecordId>;

    /// The staged revision of `parent` awaiting review, if any
    fn pending_revision(&self, tenant: TenantId, parent: RecordId) -> Result<Option<RecordId>>;

    fn delete_revision(&self, tenant: TenantId, revision: RecordId) -> Result<()>;

    fn get_metadata(&self, tenant: TenantId, id: RecordId) -> Result<Metadata>;

    fn add_metadata_value(&self, tenant: TenantId, id: RecordId, key: &str, value: &str)
        -> Result<()>;

    fn delete_metadata_key(&self, tenant: TenantId, id: RecordId, key: &str) -> Result<()>;

    /// Records carrying `value` under `key`, in ascending id order
    fn find_by_metadata(&self, tenant: TenantId, key: &str, value: &str) -> Result<Vec<RecordId>>;

    fn get_terms(&self, tenant: TenantId, id: RecordId, taxonomy: &str) -> Result<Vec<String>>;

    /// Replace the record's terms in `taxonomy` with exactly `terms`
    fn set_terms(&self, tenant: TenantId, id: RecordId, taxonomy: &str, terms: &[String])
        -> Result<()>;

    /// Attachments whose parent is `parent`
    fn attachments_of(&self, tenant: TenantId, parent: RecordId) -> Result<Vec<Record>>;

    fn featured_attachment(&self, tenant: TenantId, id: RecordId) -> Result<Option<RecordId>>;

    fn set_featured_attachment(
        &self,
        tenant: TenantId,
        id: RecordId,
        attachment: RecordId,
    ) -> Result<()>;

    /// Directory holding the tenant's file payloads
    fn upload_dir(&self, tenant: TenantId) -> Result<PathBuf>;

    /// Duplicate `src` into `dest_dir`, returning the new path
    fn copy_file(&self, src: &Path, dest_dir: &Path, mode: FileCopyMode) -> Result<PathBuf>;

    /// Regenerate derived files (thumbnails etc.) for an attachment payload
    fn generate_file_variants(
        &self,
        tenant: TenantId,
        attachment: RecordId,
        path: &Path,
    ) -> Result<Vec<PathBuf>>;
}

/// A store bound to one tenant
#[derive(Clone, Copy)]
pub struct TenantScope<'s> {
    store: &'s dyn ContentStore,
    tenant: TenantId,
}

impl<'s> TenantScope<'s> {
    pub fn new(store: &'s dyn ContentStore, tenant: TenantId) -> Self {
        Self { store, tenant }
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn store(&self) -> &'s dyn ContentStore {
        self.store
    }

    pub fn key(&self, id: RecordId) -> RecordKey {
        RecordKey::new(self.tenant, id)
    }

    pub fn record(&self, id: RecordId) -> Result<Option<Record>> {
        self.store.get_record(self.tenant, id)
    }

    /// Like [`record`](Self::record) but a missing record is an error
    pub fn require_record(&self, id: RecordId) -> Result<Record> {
        self.record(id)?.ok_or(SyncError::RecordNotFound {
            tenant: self.tenant,
            record: id,
        })
    }

    pub fn insert(&self, draft: &RecordDraft) -> Result<RecordId> {
        self.store.insert_record(self.tenant, draft)
    }

    pub fn update(&self, id: RecordId, draft: &RecordDraft) -> Result<()> {
        self.store.update_record(self.tenant, id, draft)
    }

    pub fn create_revision(&self, parent: RecordId, draft: &RecordDraft) -> Result<RecordId> {
        self.store.create_revision(self.tenant, parent, draft)
    }

    pub fn pending_revision(&self, parent: RecordId) -> Result<Option<RecordId>> {
        self.store.pending_revision(self.tenant, parent)
    }

    pub fn delete_revision(&self, revision: RecordId) -> Result<()> {
        self.store.delete_revision(self.tenant, revision)
    }

    pub fn metadata(&self, id: RecordId) -> Result<Metadata> {
        self.store.get_metadata(self.tenant, id)
    }

    pub fn add_metadata(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        self.store.add_metadata_value(self.tenant, id, key, value)
    }

    /// Delete every value under `key`, then write `values` in order
    pub fn replace_metadata(&self, id: RecordId, key: &str, values: &[String]) -> Result<()> {
        self.store.delete_metadata_key(self.tenant, id, key)?;
        for value in values {
            self.store.add_metadata_value(self.tenant, id, key, value)?;
        }
        Ok(())
    }

    pub fn find_by_metadata(&self, key: &str, value: &str) -> Result<Vec<RecordId>> {
        self.store.find_by_metadata(self.tenant, key, value)
    }

    pub fn terms(&self, id: RecordId, taxonomy: &str) -> Result<Vec<String>> {
        self.store.get_terms(self.tenant, id, taxonomy)
    }

    pub fn set_terms(&self, id: RecordId, taxonomy: &str, terms: &[String]) -> Result<()> {
        self.store.set_terms(self.tenant, id, taxonomy, terms)
    }

    pub fn attachments_of(&self, parent: RecordId) -> Result<Vec<Record>> {
        self.store.attachments_of(self.tenant, parent)
    }

    pub fn featured_attachment(&self, id: RecordId) -> Result<Option<RecordId>> {
        self.store.featured_attachment(self.tenant, id)
    }

    pub fn set_featured_attachment(&self, id: RecordId, attachment: RecordId) -> Result<()> {
        self.store.set_featured_attachment(self.tenant, id, attachment)
    }

    pub fn upload_dir(&self) -> Result<PathBuf> {
        self.store.upload_dir(self.tenant)
    }

    /// Copy a payload from anywhere into this tenant's upload directory
    pub fn import_file(&self, src: &Path, mode: FileCopyMode) -> Result<PathBuf> {
        let dest_dir = self.upload_dir()?;
        self.store.copy_file(src, &dest_dir, mode)
    }

    pub fn generate_file_variants(&self, attachment: RecordId, path: &Path) -> Result<Vec<PathBuf>> {
        self.store.generate_file_variants(self.tenant, attachment, path)
    }
}

impl fmt::Debug for TenantScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantScope")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

/// A "record saved" notification raised by the host platform
#[derive(Debug, Clone)]
pub struct SaveEvent {
    /// Tenant the record was saved in
    pub tenant: TenantId,

    /// The record as saved
    pub record: Record,

    /// False when the save created the record
    pub is_update: bool,

    /// True for editor autosaves
    pub autosave: bool,
}

impl SaveEvent {
    pub fn key(&self) -> RecordKey {
        self.record.key(self.tenant)
    }
}

/// Receiver of [`SaveEvent`]s (the host's `onRecordSaved` hook).
///
/// Listeners are called synchronously from inside the write that raised the
/// event; an error fails that write.
pub trait SaveListener: Send + Sync {
    fn on_record_saved(&self, store: &dyn ContentStore, event: &SaveEvent) -> Result<()>;
}
