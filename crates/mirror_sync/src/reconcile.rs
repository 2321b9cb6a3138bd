//! Create-or-update of one destination copy

use crate::attachments::{AttachmentFailure, AttachmentOutcome, AttachmentReplicator};
use crate::delta::SyncDelta;
use crate::guard::InFlightGuard;
use crate::identity::IdentityMap;
use mirror_common::{
    ContentStore, FileCopyMode, Record, RecordDraft, RecordId, RecordKey, Result, SyncError,
    TenantId, TenantScope, STATUS_PUBLISH,
};
use mirror_config::{DestinationSpec, HookContext, SyncSettings};
use std::fmt;

/// What happened to a destination copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// A new copy was inserted
    Created,

    /// The live copy was overwritten
    Updated,

    /// A revision of the live copy was staged
    Revised,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Revised => "revised",
        };
        f.write_str(s)
    }
}

/// Result of reconciling one destination tenant
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub tenant: TenantId,
    pub destination_id: RecordId,
    pub action: SyncAction,
    /// Staged revision, when `action` is [`SyncAction::Revised`]
    pub revision_id: Option<RecordId>,
    pub attachments: Vec<AttachmentOutcome>,
    pub failed_attachments: Vec<AttachmentFailure>,
}

/// Writes destination copies of origin records
#[derive(Clone, Copy)]
pub struct Reconciler<'s> {
    store: &'s dyn ContentStore,
    file_copy: FileCopyMode,
}

impl<'s> Reconciler<'s> {
    pub fn new(store: &'s dyn ContentStore, settings: &SyncSettings) -> Self {
        Self {
            store,
            file_copy: settings.file_copy,
        }
    }

    /// Bring the copy of `origin` (saved in `home`) in `destination` up to
    /// date.
    ///
    /// Every destination record written is held on `guard` so the save
    /// events it raises are not synced back.
    #[tracing::instrument(
        skip_all,
        fields(destination = %destination, origin = %origin.key(home))
    )]
    pub fn reconcile(
        &self,
        guard: &mut InFlightGuard<'_>,
        destination: TenantId,
        home: TenantId,
        origin: &Record,
        delta: &SyncDelta,
        spec: &DestinationSpec,
    ) -> Result<ReconcileOutcome> {
        let origin_scope = TenantScope::new(self.store, home);
        let dest = TenantScope::new(self.store, destination);
        let identity = IdentityMap::new(dest);
        let origin_key = origin.key(home);

        let existing = identity.lookup(origin_key)?;

        let mut draft = RecordDraft::from(origin);
        draft.record_type = spec.map_type(&origin.record_type).to_string();
        if let Some(author) = spec.author_override() {
            draft.author = author;
        }
        draft.parent = match origin.parent {
            Some(parent) => identity.lookup(RecordKey::new(home, parent))?,
            None => None,
        };

        let (destination_id, action, revision_id) = match existing {
            Some(id) if spec.publish_updates_in_place() => {
                guard.hold(dest.key(id));
                draft.status = STATUS_PUBLISH.to_string();
                dest.update(id, &draft)?;
                (id, SyncAction::Updated, None)
            }
            Some(id) => {
                guard.hold(dest.key(id));
                if let Some(stale) = dest.pending_revision(id)? {
                    tracing::debug!("Discarding stale revision {} of {}", stale, id);
                    dest.delete_revision(stale)?;
                }
                let revision = dest.create_revision(id, &draft)?;
                (id, SyncAction::Revised, Some(revision))
            }
            None => {
                draft.status = spec.new_record_status().to_string();
                let id = dest.insert(&draft)?;
                guard.hold(dest.key(id));
                identity.record(id, origin_key)?;
                (id, SyncAction::Created, None)
            }
        };

        delta.terms.apply(dest, destination_id)?;
        delta.metadata.apply(dest, destination_id)?;

        if let Some(hook) = spec.post_sync_hook() {
            let context = HookContext {
                destination: dest,
                destination_id,
                origin,
                draft: &draft,
            };
            hook(&context).map_err(SyncError::HookFailed)?;
        }

        let (attachments, failed_attachments) = if spec.sync_attachments() {
            let report = AttachmentReplicator::new(origin_scope, dest, self.file_copy)
                .replicate_all(guard, origin, destination_id)?;
            (report.replicated, report.failed)
        } else {
            (Vec::new(), Vec::new())
        };

        tracing::info!(
            "{} {} as {} in tenant {} ({} attachment(s), {} failed)",
            action,
            origin_key,
            destination_id,
            destination,
            attachments.len(),
            failed_attachments.len()
        );

        Ok(ReconcileOutcome {
            tenant: destination,
            destination_id,
            action,
            revision_id,
            attachments,
            failed_attachments,
        })
    }
}

impl fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("file_copy", &self.file_copy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::InFlight;
    use mirror_common::{AuthorId, IDENTITY_META_KEY};
    use mirror_store::MemoryStore;

    struct Fixture {
        _temp: assert_fs::TempDir,
        store: MemoryStore,
        in_flight: InFlight,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = assert_fs::TempDir::new().unwrap();
            let store = MemoryStore::new(temp.path());
            store.add_tenant(TenantId(1)).unwrap();
            store.add_tenant(TenantId(2)).unwrap();
            Self {
                _temp: temp,
                store,
                in_flight: InFlight::new(),
            }
        }

        fn origin(&self) -> TenantScope<'_> {
            TenantScope::new(&self.store, TenantId(1))
        }

        fn destination(&self) -> TenantScope<'_> {
            TenantScope::new(&self.store, TenantId(2))
        }

        fn run(&self, id: RecordId, spec: &DestinationSpec) -> Result<ReconcileOutcome> {
            let record = self.origin().require_record(id)?;
            let delta = SyncDelta::compute(self.origin(), id, spec)?;
            let mut guard = self
                .in_flight
                .enter(self.origin().key(id))
                .ok_or_else(|| SyncError::StoreError("already in flight".into()))?;
            Reconciler::new(&self.store, &SyncSettings::default()).reconcile(
                &mut guard,
                TenantId(2),
                TenantId(1),
                &record,
                &delta,
                spec,
            )
        }
    }

    fn post(title: &str, content: &str) -> RecordDraft {
        RecordDraft::new("post", title)
            .with_status("publish")
            .with_author(AuthorId(5))
            .with_content(content)
    }

    #[test]
    fn test_create_maps_type_and_status() {
        let fx = Fixture::new();
        let id = fx.origin().insert(&post("Hello", "v1")).unwrap();
        let spec = DestinationSpec::builder()
            .map_type("post", "article")
            .author_override(AuthorId(99))
            .build()
            .unwrap();

        let outcome = fx.run(id, &spec).unwrap();
        assert_eq!(outcome.action, SyncAction::Created);

        let copy = fx.destination().require_record(outcome.destination_id).unwrap();
        assert_eq!(copy.record_type, "article");
        assert_eq!(copy.status, "pending");
        assert_eq!(copy.author, AuthorId(99));
        assert_eq!(copy.content, "v1");
        assert_ne!(copy.guid, fx.origin().require_record(id).unwrap().guid);
        assert_eq!(
            fx.destination().metadata(copy.id).unwrap()[IDENTITY_META_KEY],
            vec![format!("1:{}", id)]
        );
        assert!(fx.in_flight.is_empty());
    }

    #[test]
    fn test_update_in_place_publishes() {
        let fx = Fixture::new();
        let id = fx.origin().insert(&post("Hello", "v1")).unwrap();
        let spec = DestinationSpec::builder()
            .publish_updates_in_place(true)
            .build()
            .unwrap();

        let first = fx.run(id, &spec).unwrap();
        fx.origin().update(id, &post("Hello", "v2")).unwrap();
        let second = fx.run(id, &spec).unwrap();

        assert_eq!(second.action, SyncAction::Updated);
        assert_eq!(second.destination_id, first.destination_id);
        let copy = fx.destination().require_record(first.destination_id).unwrap();
        assert_eq!(copy.status, STATUS_PUBLISH);
        assert_eq!(copy.content, "v2");
        assert_eq!(fx.store.content_records(TenantId(2)).len(), 1);
    }

    #[test]
    fn test_update_stages_single_revision() {
        let fx = Fixture::new();
        let id = fx.origin().insert(&post("Hello", "v1")).unwrap();
        let spec = DestinationSpec::builder()
            .new_record_status("publish")
            .build()
            .unwrap();

        let first = fx.run(id, &spec).unwrap();
        fx.origin().update(id, &post("Hello", "v2")).unwrap();
        fx.run(id, &spec).unwrap();
        fx.origin().update(id, &post("Hello", "v3")).unwrap();
        let third = fx.run(id, &spec).unwrap();

        assert_eq!(third.action, SyncAction::Revised);
        let live = fx.destination().require_record(first.destination_id).unwrap();
        assert_eq!(live.content, "v1");

        let revisions = fx.store.revisions_of(TenantId(2), first.destination_id);
        assert_eq!(revisions.len(), 1);
        assert_eq!(Some(revisions[0].id), third.revision_id);
        assert_eq!(revisions[0].content, "v3");
    }

    #[test]
    fn test_parent_is_translated() {
        let fx = Fixture::new();
        let spec = DestinationSpec::builder().build().unwrap();
        let parent = fx.origin().insert(&post("Parent", "")).unwrap();
        let parent_copy = fx.run(parent, &spec).unwrap().destination_id;

        let child = fx
            .origin()
            .insert(&post("Child", "").with_parent(parent))
            .unwrap();
        let child_copy = fx.run(child, &spec).unwrap().destination_id;
        assert_eq!(
            fx.destination().require_record(child_copy).unwrap().parent,
            Some(parent_copy)
        );

        let orphan = fx
            .origin()
            .insert(&post("Orphan", "").with_parent(RecordId(500)))
            .unwrap();
        let orphan_copy = fx.run(orphan, &spec).unwrap().destination_id;
        assert_eq!(fx.destination().require_record(orphan_copy).unwrap().parent, None);
    }

    #[test]
    fn test_hook_failure_propagates() {
        let fx = Fixture::new();
        let id = fx.origin().insert(&post("Hello", "v1")).unwrap();
        let spec = DestinationSpec::builder()
            .post_sync_hook(|ctx| {
                ctx.destination
                    .add_metadata(ctx.destination_id, "hooked", &ctx.origin.title)?;
                anyhow::bail!("hook refused {}", ctx.draft.title)
            })
            .build()
            .unwrap();

        let err = fx.run(id, &spec).unwrap_err();
        assert!(matches!(err, SyncError::HookFailed(_)));
        assert!(err.to_string().contains("hook refused Hello"));
        assert!(fx.in_flight.is_empty());

        let copy = fx.store.content_records(TenantId(2))[0].id;
        assert_eq!(
            fx.destination().metadata(copy).unwrap()["hooked"],
            vec!["Hello".to_string()]
        );
    }
}
