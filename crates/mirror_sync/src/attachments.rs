//! Attachment replication
//!
//! Attachments are mapped by their own identity marker, like any record.
//! Their payload is copied only when the destination copy is first created.

use crate::delta::MetadataDelta;
use crate::guard::InFlightGuard;
use crate::identity::IdentityMap;
use crate::reconcile::SyncAction;
use mirror_common::{FileCopyMode, Record, RecordDraft, RecordId, Result, SyncError, TenantScope};
use std::path::PathBuf;

/// One replicated attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOutcome {
    pub origin_id: RecordId,
    pub destination_id: RecordId,
    pub action: SyncAction,
    pub featured: bool,
    /// Derived files generated for a newly created copy
    pub variants: Vec<PathBuf>,
}

/// An attachment that could not be replicated
#[derive(Debug)]
pub struct AttachmentFailure {
    pub origin_id: RecordId,
    pub error: SyncError,
}

/// Result of replicating every attachment of one record
#[derive(Debug, Default)]
pub struct AttachmentReport {
    pub replicated: Vec<AttachmentOutcome>,
    pub failed: Vec<AttachmentFailure>,
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    featured: bool,
    /// Move an existing copy under the new parent
    reparent: bool,
}

/// Copies attachments from an origin tenant into a destination tenant
#[derive(Debug, Clone, Copy)]
pub struct AttachmentReplicator<'s> {
    origin: TenantScope<'s>,
    destination: TenantScope<'s>,
    file_copy: FileCopyMode,
}

impl<'s> AttachmentReplicator<'s> {
    pub fn new(
        origin: TenantScope<'s>,
        destination: TenantScope<'s>,
        file_copy: FileCopyMode,
    ) -> Self {
        Self {
            origin,
            destination,
            file_copy,
        }
    }

    /// Replicate the attachments parented to `record`, plus its featured
    /// attachment when that one lives elsewhere, under `new_parent`.
    ///
    /// A failing attachment is logged and reported; the others still go.
    /// A featured attachment parented elsewhere keeps its destination parent
    /// once its copy exists.
    pub fn replicate_all(
        &self,
        guard: &mut InFlightGuard<'_>,
        record: &Record,
        new_parent: RecordId,
    ) -> Result<AttachmentReport> {
        let attachments = self.origin.attachments_of(record.id)?;
        let featured = self.origin.featured_attachment(record.id)?;
        let mut report = AttachmentReport::default();

        for attachment in &attachments {
            let is_featured = featured == Some(attachment.id);
            let placement = Placement {
                featured: is_featured,
                reparent: true,
            };
            self.replicate_contained(guard, attachment, new_parent, placement, &mut report);
        }

        if let Some(featured_id) = featured {
            if !attachments.iter().any(|a| a.id == featured_id) {
                match self.origin.require_record(featured_id) {
                    Ok(attachment) => self.replicate_contained(
                        guard,
                        &attachment,
                        new_parent,
                        Placement {
                            featured: true,
                            reparent: false,
                        },
                        &mut report,
                    ),
                    Err(error) => {
                        tracing::warn!("Featured attachment {} unavailable: {}", featured_id, error);
                        report.failed.push(AttachmentFailure {
                            origin_id: featured_id,
                            error,
                        });
                    }
                }
            }
        }

        Ok(report)
    }

    fn replicate_contained(
        &self,
        guard: &mut InFlightGuard<'_>,
        attachment: &Record,
        new_parent: RecordId,
        placement: Placement,
        report: &mut AttachmentReport,
    ) {
        match self.replicate(guard, attachment, new_parent, placement) {
            Ok(outcome) => report.replicated.push(outcome),
            Err(error) => {
                tracing::warn!(
                    origin_tenant = %self.origin.tenant(),
                    destination_tenant = %self.destination.tenant(),
                    "Failed to replicate attachment {}: {}",
                    attachment.id,
                    error
                );
                report.failed.push(AttachmentFailure {
                    origin_id: attachment.id,
                    error,
                });
            }
        }
    }

    /// Create or update the destination copy of one attachment under
    /// `new_parent`
    pub fn replicate_attachment(
        &self,
        guard: &mut InFlightGuard<'_>,
        attachment: &Record,
        new_parent: RecordId,
        is_featured: bool,
    ) -> Result<AttachmentOutcome> {
        let placement = Placement {
            featured: is_featured,
            reparent: true,
        };
        self.replicate(guard, attachment, new_parent, placement)
    }

    fn replicate(
        &self,
        guard: &mut InFlightGuard<'_>,
        attachment: &Record,
        new_parent: RecordId,
        placement: Placement,
    ) -> Result<AttachmentOutcome> {
        let is_featured = placement.featured;
        let identity = IdentityMap::new(self.destination);
        let origin_key = self.origin.key(attachment.id);

        let mut draft = RecordDraft::from(attachment);
        draft.parent = Some(new_parent);

        let (destination_id, action, variants) = match identity.lookup(origin_key)? {
            Some(existing) => {
                guard.hold(self.destination.key(existing));
                let current = self.destination.require_record(existing)?;
                draft.file = current.file;
                if !placement.reparent {
                    draft.parent = current.parent;
                }
                self.destination.update(existing, &draft)?;
                (existing, SyncAction::Updated, Vec::new())
            }
            None => {
                if let Some(src) = &attachment.file {
                    draft.file = Some(self.destination.import_file(src, self.file_copy)?);
                }
                let created = self.destination.insert(&draft)?;
                guard.hold(self.destination.key(created));
                identity.record(created, origin_key)?;

                let variants = match &draft.file {
                    Some(path) => self.destination.generate_file_variants(created, path)?,
                    None => Vec::new(),
                };
                (created, SyncAction::Created, variants)
            }
        };

        MetadataDelta::mirror(self.origin.metadata(attachment.id)?)
            .apply(self.destination, destination_id)?;

        if is_featured {
            self.destination
                .set_featured_attachment(new_parent, destination_id)?;
        }

        tracing::debug!(
            "{} attachment {} as {} in tenant {}",
            action,
            origin_key,
            destination_id,
            self.destination.tenant()
        );

        Ok(AttachmentOutcome {
            origin_id: attachment.id,
            destination_id,
            action,
            featured: is_featured,
            variants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::InFlight;
    use assert_fs::prelude::*;
    use mirror_common::{TenantId, IDENTITY_META_KEY};
    use mirror_store::MemoryStore;

    struct Fixture {
        temp: assert_fs::TempDir,
        store: MemoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = assert_fs::TempDir::new().unwrap();
            let store = MemoryStore::new(temp.path().join("platform"));
            store.add_tenant(TenantId(1)).unwrap();
            store.add_tenant(TenantId(2)).unwrap();
            Self { temp, store }
        }

        fn origin(&self) -> TenantScope<'_> {
            TenantScope::new(&self.store, TenantId(1))
        }

        fn destination(&self) -> TenantScope<'_> {
            TenantScope::new(&self.store, TenantId(2))
        }

        fn attach(&self, parent: Option<RecordId>, name: &str) -> RecordId {
            let src = self.temp.child(format!("incoming/{name}"));
            src.write_binary(name.as_bytes()).unwrap();
            let path = self.origin().import_file(src.path(), FileCopyMode::Copy).unwrap();
            let mut draft = RecordDraft::new("attachment", name).with_file(path, "image/png");
            draft.parent = parent;
            self.origin().insert(&draft).unwrap()
        }
    }

    #[test]
    fn test_create_then_update() {
        let fx = Fixture::new();
        let post = fx.origin().insert(&RecordDraft::new("post", "p")).unwrap();
        let attachment = fx.attach(Some(post), "cat.png");
        fx.origin().add_metadata(attachment, "alt", "a cat").unwrap();
        let dest_post = fx.destination().insert(&RecordDraft::new("post", "p")).unwrap();

        let in_flight = InFlight::new();
        let mut guard = in_flight.enter(fx.origin().key(post)).unwrap();
        let replicator =
            AttachmentReplicator::new(fx.origin(), fx.destination(), FileCopyMode::Copy);
        let record = fx.origin().require_record(attachment).unwrap();

        let created = replicator
            .replicate_attachment(&mut guard, &record, dest_post, false)
            .unwrap();
        assert_eq!(created.action, SyncAction::Created);
        assert_eq!(created.variants.len(), 2);

        let copy = fx.destination().require_record(created.destination_id).unwrap();
        assert_eq!(copy.parent, Some(dest_post));
        let copied_path = copy.file.clone().unwrap();
        assert!(copied_path.starts_with(fx.destination().upload_dir().unwrap()));
        let metadata = fx.destination().metadata(created.destination_id).unwrap();
        assert_eq!(metadata["alt"], vec!["a cat".to_string()]);
        assert_eq!(metadata[IDENTITY_META_KEY], vec![format!("1:{}", attachment)]);

        let updated = replicator
            .replicate_attachment(&mut guard, &record, dest_post, false)
            .unwrap();
        assert_eq!(updated.action, SyncAction::Updated);
        assert_eq!(updated.destination_id, created.destination_id);
        let copy = fx.destination().require_record(created.destination_id).unwrap();
        assert_eq!(copy.file, Some(copied_path));
        assert_eq!(fx.destination().attachments_of(dest_post).unwrap().len(), 1);
    }

    #[test]
    fn test_shared_featured_image_stays_with_its_parent() {
        let fx = Fixture::new();
        let post_a = fx.origin().insert(&RecordDraft::new("post", "a")).unwrap();
        let post_b = fx.origin().insert(&RecordDraft::new("post", "b")).unwrap();
        let image = fx.attach(Some(post_a), "shared.png");
        fx.origin().set_featured_attachment(post_b, image).unwrap();
        let dest_a = fx.destination().insert(&RecordDraft::new("post", "a")).unwrap();
        let dest_b = fx.destination().insert(&RecordDraft::new("post", "b")).unwrap();

        let in_flight = InFlight::new();
        let replicator =
            AttachmentReplicator::new(fx.origin(), fx.destination(), FileCopyMode::Copy);
        let sync = |origin: RecordId, copy: RecordId| {
            let mut guard = in_flight.enter(fx.origin().key(origin)).unwrap();
            let record = fx.origin().require_record(origin).unwrap();
            replicator.replicate_all(&mut guard, &record, copy).unwrap()
        };

        let report = sync(post_a, dest_a);
        let image_copy = report.replicated[0].destination_id;
        for _ in 0..2 {
            let report = sync(post_b, dest_b);
            assert_eq!(report.replicated[0].destination_id, image_copy);
            assert_eq!(report.replicated[0].action, SyncAction::Updated);

            let copy = fx.destination().require_record(image_copy).unwrap();
            assert_eq!(copy.parent, Some(dest_a));
            assert_eq!(
                fx.destination().featured_attachment(dest_b).unwrap(),
                Some(image_copy)
            );
        }
        sync(post_a, dest_a);
        let copy = fx.destination().require_record(image_copy).unwrap();
        assert_eq!(copy.parent, Some(dest_a));
    }

    #[test]
    fn test_missing_payload_is_contained() {
        let fx = Fixture::new();
        let post = fx.origin().insert(&RecordDraft::new("post", "p")).unwrap();
        let good = fx.attach(Some(post), "good.png");
        let broken = fx
            .origin()
            .insert(
                &RecordDraft::new("attachment", "gone")
                    .with_parent(post)
                    .with_file(fx.temp.path().join("nowhere/gone.png"), "image/png"),
            )
            .unwrap();
        let dest_post = fx.destination().insert(&RecordDraft::new("post", "p")).unwrap();

        let in_flight = InFlight::new();
        let mut guard = in_flight.enter(fx.origin().key(post)).unwrap();
        let record = fx.origin().require_record(post).unwrap();
        let report = AttachmentReplicator::new(fx.origin(), fx.destination(), FileCopyMode::Copy)
            .replicate_all(&mut guard, &record, dest_post)
            .unwrap();

        assert_eq!(report.replicated.len(), 1);
        assert_eq!(report.replicated[0].origin_id, good);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].origin_id, broken);
        assert!(matches!(report.failed[0].error, SyncError::FileCopy { .. }));
    }
}
