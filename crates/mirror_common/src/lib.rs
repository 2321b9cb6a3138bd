//! Common types and errors for SiteMirror
//!
//! This crate provides the identifiers, record shapes, error type and host
//! platform contract shared by every SiteMirror component.

pub mod platform;
pub mod record;
pub mod telemetry;

pub use platform::{ContentStore, FileCopyMode, SaveEvent, SaveListener, TenantScope};
pub use record::{Metadata, Record, RecordDraft};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Metadata key under which a destination copy records where it came from
pub const IDENTITY_META_KEY: &str = "SYNC:origin";

/// Record type of file attachments
pub const ATTACHMENT_TYPE: &str = "attachment";

/// Record type of staged revisions
pub const REVISION_TYPE: &str = "revision";

/// Status of live, published records
pub const STATUS_PUBLISH: &str = "publish";

/// Core error types for SiteMirror operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Record {record} not found in tenant {tenant}")]
    RecordNotFound { tenant: TenantId, record: RecordId },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Failed to copy file {path:?}: {source}")]
    FileCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid identity marker: {0:?}")]
    InvalidIdentity(String),

    #[error("Origin {origin} already maps to record {existing} in tenant {tenant}")]
    IdentityConflict {
        tenant: TenantId,
        origin: RecordKey,
        existing: RecordId,
    },

    #[error("Post-sync hook failed: {0}")]
    HookFailed(#[source] anyhow::Error),

    #[error("Sync failed for {} destination tenant(s): {tenants:?}", tenants.len())]
    DestinationsFailed { tenants: Vec<TenantId> },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;

/// Identifier of a tenant (one isolated content store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u64);

/// Identifier of a record, unique within its tenant only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

/// Identifier of a record author
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub u64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record addressed across tenants.
///
/// The `Display` form `"<tenant>:<record>"` is the persisted identity marker
/// value stored under [`IDENTITY_META_KEY`] on destination copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub tenant: TenantId,
    pub record: RecordId,
}

impl RecordKey {
    pub fn new(tenant: TenantId, record: RecordId) -> Self {
        Self { tenant, record }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tenant, self.record)
    }
}

impl FromStr for RecordKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let (tenant, record) = s
            .split_once(':')
            .ok_or_else(|| SyncError::InvalidIdentity(s.to_string()))?;

        let tenant = tenant
            .parse::<u64>()
            .map_err(|_| SyncError::InvalidIdentity(s.to_string()))?;
        let record = record
            .parse::<u64>()
            .map_err(|_| SyncError::InvalidIdentity(s.to_string()))?;

        Ok(Self::new(TenantId(tenant), RecordId(record)))
    }
}
