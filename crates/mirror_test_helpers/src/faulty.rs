//! Fault injection
//!
//! [`FaultyStore`] forwards to a real store but refuses writes to chosen
//! tenants, or refuses to copy files, so failure policies can be exercised.

use mirror_common::{
    ContentStore, FileCopyMode, Metadata, Record, RecordDraft, RecordId, Result, SyncError,
    TenantId,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub struct FaultyStore<'a> {
    inner: &'a dyn ContentStore,
    failing_tenants: BTreeSet<TenantId>,
    fail_file_copies: bool,
}

impl<'a> FaultyStore<'a> {
    pub fn new(inner: &'a dyn ContentStore) -> Self {
        Self {
            inner,
            failing_tenants: BTreeSet::new(),
            fail_file_copies: false,
        }
    }

    /// Refuse every write to `tenant`
    pub fn failing_tenant(mut self, tenant: TenantId) -> Self {
        self.failing_tenants.insert(tenant);
        self
    }

    /// Refuse every file copy
    pub fn failing_file_copies(mut self) -> Self {
        self.fail_file_copies = true;
        self
    }

    fn check(&self, tenant: TenantId) -> Result<()> {
        if self.failing_tenants.contains(&tenant) {
            return Err(SyncError::StoreError(format!(
                "injected write failure in tenant {}",
                tenant
            )));
        }
        Ok(())
    }
}

impl ContentStore for FaultyStore<'_> {
    fn tenant_ids(&self) -> Result<Vec<TenantId>> {
        self.inner.tenant_ids()
    }

    fn get_record(&self, tenant: TenantId, id: RecordId) -> Result<Option<Record>> {
        self.inner.get_record(tenant, id)
    }

    fn insert_record(&self, tenant: TenantId, draft: &RecordDraft) -> Result<RecordId> {
        self.check(tenant)?;
        self.inner.insert_record(tenant, draft)
    }

    fn update_record(&self, tenant: TenantId, id: RecordId, draft: &RecordDraft) -> Result<()> {
        self.check(tenant)?;
        self.inner.update_record(tenant, id, draft)
    }

    fn create_revision(
        &self,
        tenant: TenantId,
        parent: RecordId,
        draft: &RecordDraft,
    ) -> Result<RecordId> {
        self.check(tenant)?;
        self.inner.create_revision(tenant, parent, draft)
    }

    fn pending_revision(&self, tenant: TenantId, parent: RecordId) -> Result<Option<RecordId>> {
        self.inner.pending_revision(tenant, parent)
    }

    fn delete_revision(&self, tenant: TenantId, revision: RecordId) -> Result<()> {
        self.check(tenant)?;
        self.inner.delete_revision(tenant, revision)
    }

    fn get_metadata(&self, tenant: TenantId, id: RecordId) -> Result<Metadata> {
        self.inner.get_metadata(tenant, id)
    }

    fn add_metadata_value(
        &self,
        tenant: TenantId,
        id: RecordId,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.check(tenant)?;
        self.inner.add_metadata_value(tenant, id, key, value)
    }

    fn delete_metadata_key(&self, tenant: TenantId, id: RecordId, key: &str) -> Result<()> {
        self.check(tenant)?;
        self.inner.delete_metadata_key(tenant, id, key)
    }

    fn find_by_metadata(&self, tenant: TenantId, key: &str, value: &str) -> Result<Vec<RecordId>> {
        self.inner.find_by_metadata(tenant, key, value)
    }

    fn get_terms(&self, tenant: TenantId, id: RecordId, taxonomy: &str) -> Result<Vec<String>> {
        self.inner.get_terms(tenant, id, taxonomy)
    }

    fn set_terms(
        &self,
        tenant: TenantId,
        id: RecordId,
        taxonomy: &str,
        terms: &[String],
    ) -> Result<()> {
        self.check(tenant)?;
        self.inner.set_terms(tenant, id, taxonomy, terms)
    }

    fn attachments_of(&self, tenant: TenantId, parent: RecordId) -> Result<Vec<Record>> {
        self.inner.attachments_of(tenant, parent)
    }

    fn featured_attachment(&self, tenant: TenantId, id: RecordId) -> Result<Option<RecordId>> {
        self.inner.featured_attachment(tenant, id)
    }

    fn set_featured_attachment(
        &self,
        tenant: TenantId,
        id: RecordId,
        attachment: RecordId,
    ) -> Result<()> {
        self.check(tenant)?;
        self.inner.set_featured_attachment(tenant, id, attachment)
    }

    fn upload_dir(&self, tenant: TenantId) -> Result<PathBuf> {
        self.inner.upload_dir(tenant)
    }

    fn copy_file(&self, src: &Path, dest_dir: &Path, mode: FileCopyMode) -> Result<PathBuf> {
        if self.fail_file_copies {
            return Err(SyncError::FileCopy {
                path: src.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected copy failure"),
            });
        }
        self.inner.copy_file(src, dest_dir, mode)
    }

    fn generate_file_variants(
        &self,
        tenant: TenantId,
        attachment: RecordId,
        path: &Path,
    ) -> Result<Vec<PathBuf>> {
        self.inner.generate_file_variants(tenant, attachment, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{platform_with_tenants, published_post};

    #[test]
    fn test_only_chosen_tenant_fails() {
        let (_temp, store) = platform_with_tenants(&[1, 2]);
        let faulty = FaultyStore::new(&store).failing_tenant(TenantId(2));

        assert!(faulty.insert_record(TenantId(1), &published_post("ok")).is_ok());
        assert!(matches!(
            faulty.insert_record(TenantId(2), &published_post("nope")),
            Err(SyncError::StoreError(_))
        ));
        assert_eq!(faulty.tenant_ids().unwrap().len(), 2);
    }
}
