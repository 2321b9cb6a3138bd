//! Seeded platforms for tests
//!
//! Everything here panics on failure; these are test fixtures.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use mirror_common::{FileCopyMode, RecordDraft, RecordId, TenantId, TenantScope};
use mirror_store::MemoryStore;

/// Create a temporary directory, removed on drop
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// A platform with the given tenants, storing payloads in a temp dir.
///
/// Keep the `TempDir` alive for as long as the store is used.
pub fn platform_with_tenants(ids: &[u64]) -> (TempDir, MemoryStore) {
    let temp = temp_dir();
    let store = MemoryStore::new(temp.path().join("platform"));
    for id in ids {
        store
            .add_tenant(TenantId(*id))
            .expect("Failed to add tenant");
    }
    (temp, store)
}

/// Draft of a published post
pub fn published_post(title: &str) -> RecordDraft {
    RecordDraft::new("post", title)
        .with_status("publish")
        .with_content(format!("Body of {title}"))
}

/// Insert a published post carrying `categories`
pub fn seed_post(store: &MemoryStore, tenant: TenantId, title: &str, categories: &[&str]) -> RecordId {
    let scope = TenantScope::new(store, tenant);
    let id = scope
        .insert(&published_post(title))
        .expect("Failed to insert post");
    let terms: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
    scope
        .set_terms(id, "category", &terms)
        .expect("Failed to set categories");
    id
}

/// Write `name` under `temp/incoming`, import it into `tenant` and insert
/// an attachment record for it
pub fn seed_attachment(
    temp: &TempDir,
    store: &MemoryStore,
    tenant: TenantId,
    parent: Option<RecordId>,
    name: &str,
) -> RecordId {
    let src = temp.child("incoming").child(name);
    src.write_str(&format!("payload of {name}"))
        .expect("Failed to write payload");

    let scope = TenantScope::new(store, tenant);
    let path = scope
        .import_file(src.path(), FileCopyMode::Copy)
        .expect("Failed to import payload");

    let mut draft = RecordDraft::new("attachment", name).with_file(path, "image/png");
    draft.parent = parent;
    scope.insert(&draft).expect("Failed to insert attachment")
}

/// Save a record again with `edit` applied, as an editor would
pub fn touch(store: &MemoryStore, tenant: TenantId, id: RecordId, edit: impl FnOnce(&mut RecordDraft)) {
    let scope = TenantScope::new(store, tenant);
    let record = scope.require_record(id).expect("Record to touch is missing");
    let mut draft = RecordDraft::from(&record);
    edit(&mut draft);
    scope.update(id, &draft).expect("Failed to update record");
}
