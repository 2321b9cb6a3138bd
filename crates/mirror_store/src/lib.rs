//! # SiteMirror Store
//!
//! Reference implementation of the host platform contract
//! ([`mirror_common::ContentStore`]): an in-process, multi-tenant record
//! store with metadata, taxonomies, revisions, attachments on disk and
//! synchronous save events.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mirror_common::{ContentStore, RecordDraft, TenantId};
//! use mirror_store::MemoryStore;
//!
//! fn main() -> mirror_common::Result<()> {
//!     let store = MemoryStore::new("/var/lib/sitemirror");
//!     store.add_tenant(TenantId(1))?;
//!     let id = store.insert_record(TenantId(1), &RecordDraft::new("post", "Hello"))?;
//!     assert!(store.get_record(TenantId(1), id)?.is_some());
//!     Ok(())
//! }
//! ```

pub mod files;
pub mod memory;

pub use files::copy_file;
pub use memory::MemoryStore;
