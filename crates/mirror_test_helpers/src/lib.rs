//! Shared test utilities for SiteMirror test suites
//!
//! # Modules
//!
//! - [`platform`]: Seeded in-memory platforms in temp directories
//! - [`faulty`]: A store wrapper that fails writes on demand
//! - [`logging`]: Test logging configuration
//! - [`assertions`]: Predicates over metadata, terms and payloads
//!
//! # Example
//!
//! ```rust
//! use mirror_test_helpers::prelude::*;
//!
//! let (_temp, store) = platform_with_tenants(&[1, 2]);
//! let post = seed_post(&store, TenantId(1), "Hello", &["news"]);
//! assert!(store.records(TenantId(1)).iter().any(|r| r.id == post));
//! ```

pub mod assertions;
pub mod faulty;
pub mod logging;
pub mod platform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::faulty::FaultyStore;
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::platform::{
        platform_with_tenants, published_post, seed_attachment, seed_post, temp_dir, touch,
    };
    pub use mirror_common::{RecordDraft, RecordId, TenantId, TenantScope};
    pub use mirror_store::MemoryStore;
}
