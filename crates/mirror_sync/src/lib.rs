//! # SiteMirror Sync Engine
//!
//! Replicates content records between the tenants of a multi-tenant content
//! platform.
//!
//! ## Architecture
//!
//! - **Eligibility**: an [`OriginSpec`](mirror_config::OriginSpec) decides which saves propagate
//! - **Deltas**: metadata and terms computed once per save, full-replace on apply
//! - **Reconciliation**: create-or-update keyed by the `SYNC:origin` identity marker
//! - **Attachments**: cascaded with their own identity markers and file payloads
//! - **Re-entrancy**: an in-flight set of records, released on drop; saves from
//!   other threads during a sync are picked up before release
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mirror_common::{RecordDraft, TenantId, TenantScope};
//! use mirror_config::{DestinationSpec, OriginSpec, SyncSettings};
//! use mirror_store::MemoryStore;
//! use mirror_sync::{Rule, SyncOrchestrator};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     mirror_common::telemetry::init_tracing(false, false);
//!
//!     let store = MemoryStore::new("/var/lib/site-mirror");
//!     store.add_tenant(TenantId(1))?;
//!     store.add_tenant(TenantId(2))?;
//!
//!     let rule = Rule::new(
//!         TenantId(1),
//!         OriginSpec::builder().require_terms("category", ["news"]).build()?,
//!         DestinationSpec::builder().map_type("post", "article").build()?,
//!     );
//!     store.subscribe(Arc::new(
//!         SyncOrchestrator::new(SyncSettings::default()).with_rule(rule),
//!     ));
//!
//!     let site = TenantScope::new(&store, TenantId(1));
//!     let post = site.insert(&RecordDraft::new("post", "Hello").with_status("publish"))?;
//!     site.set_terms(post, "category", &["news".to_string()])?;
//!     // Updates propagate; the copy in tenant 2 is an "article"
//!     site.update(post, &RecordDraft::new("post", "Hello again").with_status("publish"))?;
//!
//!     Ok(())
//! }
//! ```

pub mod attachments;
pub mod delta;
pub mod eligibility;
pub mod guard;
pub mod identity;
pub mod orchestrator;
pub mod reconcile;
pub mod report;
pub mod rule;

pub use attachments::{AttachmentFailure, AttachmentOutcome, AttachmentReplicator};
pub use delta::{compute_metadata_delta, compute_terms_delta, MetadataDelta, SyncDelta, TermsDelta};
pub use eligibility::{Eligibility, EligibilityFilter, Ineligible};
pub use guard::{InFlight, InFlightGuard, Release};
pub use identity::IdentityMap;
pub use orchestrator::SyncOrchestrator;
pub use reconcile::{ReconcileOutcome, Reconciler, SyncAction};
pub use report::{DestinationResult, SyncReport};
pub use rule::Rule;
