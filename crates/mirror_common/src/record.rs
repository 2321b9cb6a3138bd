//! Content records and the drafts written to destination tenants

use crate::{AuthorId, RecordId, RecordKey, TenantId, ATTACHMENT_TYPE, REVISION_TYPE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Metadata of one record: key -> ordered list of values
pub type Metadata = BTreeMap<String, Vec<String>>;

/// A stored content record (post, page, attachment, revision...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Tenant-local identifier
    pub id: RecordId,

    /// Record type (post, page, attachment, ...)
    pub record_type: String,

    /// Publication status (publish, pending, draft, ...)
    pub status: String,

    pub author: AuthorId,

    pub title: String,

    pub content: String,

    pub excerpt: String,

    /// Globally-unique URL of the record
    pub guid: String,

    /// Parent record (attachments point at the record they belong to)
    #[serde(default)]
    pub parent: Option<RecordId>,

    /// Stored file payload, attachments only
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub mime_type: Option<String>,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

impl Record {
    pub fn key(&self, tenant: TenantId) -> RecordKey {
        RecordKey::new(tenant, self.id)
    }

    pub fn is_attachment(&self) -> bool {
        self.record_type == ATTACHMENT_TYPE
    }

    pub fn is_revision(&self) -> bool {
        self.record_type == REVISION_TYPE
    }
}

/// Working copy of a record's fields, without identity-sensitive fields.
///
/// A draft never carries the id, the guid or the creation/modification
/// timestamps: those belong to whichever tenant stores the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub record_type: String,
    pub status: String,
    pub author: AuthorId,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub parent: Option<RecordId>,
    pub file: Option<PathBuf>,
    pub mime_type: Option<String>,
}

impl RecordDraft {
    pub fn new(record_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_author(mut self, author: AuthorId) -> Self {
        self.author = author;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_parent(mut self, parent: RecordId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self.mime_type = Some(mime_type.into());
        self
    }
}

impl From<&Record> for RecordDraft {
    fn from(record: &Record) -> Self {
        Self {
            record_type: record.record_type.clone(),
            status: record.status.clone(),
            author: record.author,
            title: record.title.clone(),
            content: record.content.clone(),
            excerpt: record.excerpt.clone(),
            parent: record.parent,
            file: record.file.clone(),
            mime_type: record.mime_type.clone(),
        }
    }
}
