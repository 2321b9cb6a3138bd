//! Attachment cascade

use mirror_common::{ContentStore, FileCopyMode};
use mirror_config::{DestinationSpec, OriginSpec, SyncSettings, TenantSelector};
use mirror_sync::{Rule, SyncAction, SyncOrchestrator};
use mirror_test_helpers::prelude::*;
use predicates::prelude::*;

fn orchestrator(file_copy: FileCopyMode) -> SyncOrchestrator {
    let settings = SyncSettings {
        file_copy,
        ..Default::default()
    };
    SyncOrchestrator::new(settings).with_rule(Rule::new(
        TenantId(1),
        OriginSpec::default(),
        DestinationSpec::builder()
            .tenants(TenantSelector::explicit([TenantId(2)]))
            .build()
            .unwrap(),
    ))
}

/// Offset destination ids so they cannot coincide with origin ids
fn pad(store: &MemoryStore, tenant: TenantId, count: usize) {
    let scope = TenantScope::new(store, tenant);
    for n in 0..count {
        scope
            .insert(&RecordDraft::new("page", format!("filler {n}")))
            .unwrap();
    }
}

#[test]
fn test_attachment_and_distinct_featured_image() {
    suppress_logs();
    let (temp, store) = platform_with_tenants(&[1, 2]);
    pad(&store, TenantId(2), 10);

    let post = seed_post(&store, TenantId(1), "Gallery", &[]);
    let photo = seed_attachment(&temp, &store, TenantId(1), Some(post), "photo.jpg");
    let cover = seed_attachment(&temp, &store, TenantId(1), None, "cover.jpg");
    let origin = TenantScope::new(&store, TenantId(1));
    origin.set_featured_attachment(post, cover).unwrap();
    origin.add_metadata(photo, "alt", "a photo").unwrap();

    let reports = orchestrator(FileCopyMode::Copy)
        .sync_record(&store, TenantId(1), post)
        .unwrap();
    let outcome = reports[0].outcome_for(TenantId(2)).unwrap();
    assert_eq!(outcome.attachments.len(), 2);
    assert!(outcome.failed_attachments.is_empty());

    let dest = TenantScope::new(&store, TenantId(2));
    assert_eq!(dest.attachments_of(outcome.destination_id).unwrap().len(), 2);

    let featured = outcome
        .attachments
        .iter()
        .find(|a| a.origin_id == cover)
        .unwrap();
    assert!(featured.featured);
    let dest_featured = dest.featured_attachment(outcome.destination_id).unwrap();
    assert_eq!(dest_featured, Some(featured.destination_id));
    assert_ne!(dest_featured, Some(cover));

    let photo_copy = outcome
        .attachments
        .iter()
        .find(|a| a.origin_id == photo)
        .unwrap();
    assert!(metadata_values("alt", &["a photo"]).eval(&dest.metadata(photo_copy.destination_id).unwrap()));
    assert!(copy_of(origin.key(photo)).eval(&dest.metadata(photo_copy.destination_id).unwrap()));

    let copied = dest.require_record(photo_copy.destination_id).unwrap().file.unwrap();
    let source = origin.require_record(photo).unwrap().file.unwrap();
    assert!(predicate::path::eq_file(source.as_path()).eval(copied.as_path()));
    assert_eq!(photo_copy.variants, store.variants(TenantId(2), photo_copy.destination_id));
}

#[test]
fn test_resync_updates_attachments_in_place() {
    suppress_logs();
    let (temp, store) = platform_with_tenants(&[1, 2]);
    let post = seed_post(&store, TenantId(1), "Gallery", &[]);
    let photo = seed_attachment(&temp, &store, TenantId(1), Some(post), "photo.jpg");
    let orchestrator = orchestrator(FileCopyMode::HardLink);

    orchestrator.sync_record(&store, TenantId(1), post).unwrap();
    touch(&store, TenantId(1), photo, |d| d.title = "Renamed".into());
    let reports = orchestrator.sync_record(&store, TenantId(1), post).unwrap();

    let outcome = reports[0].outcome_for(TenantId(2)).unwrap();
    assert_eq!(outcome.action, SyncAction::Revised);
    assert_eq!(outcome.attachments.len(), 1);
    assert_eq!(outcome.attachments[0].action, SyncAction::Updated);

    let attachments = store
        .attachments_of(TenantId(2), outcome.destination_id)
        .unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].title, "Renamed");
}

#[test]
fn test_file_copy_failure_does_not_fail_the_record() {
    suppress_logs();
    let (temp, store) = platform_with_tenants(&[1, 2]);
    let post = seed_post(&store, TenantId(1), "Gallery", &[]);
    let photo = seed_attachment(&temp, &store, TenantId(1), Some(post), "photo.jpg");

    let faulty = FaultyStore::new(&store).failing_file_copies();
    let reports = orchestrator(FileCopyMode::Copy)
        .sync_record(&faulty, TenantId(1), post)
        .unwrap();

    assert!(reports[0].is_success());
    let outcome = reports[0].outcome_for(TenantId(2)).unwrap();
    assert_eq!(outcome.action, SyncAction::Created);
    assert!(outcome.attachments.is_empty());
    assert_eq!(outcome.failed_attachments.len(), 1);
    assert_eq!(outcome.failed_attachments[0].origin_id, photo);
    assert_eq!(store.content_records(TenantId(2)).len(), 1);
}

#[test]
fn test_attachments_can_be_left_out() {
    suppress_logs();
    let (temp, store) = platform_with_tenants(&[1, 2]);
    let post = seed_post(&store, TenantId(1), "Gallery", &[]);
    seed_attachment(&temp, &store, TenantId(1), Some(post), "photo.jpg");

    let orchestrator = SyncOrchestrator::default().with_rule(Rule::new(
        TenantId(1),
        OriginSpec::default(),
        DestinationSpec::builder().sync_attachments(false).build().unwrap(),
    ));
    orchestrator.sync_record(&store, TenantId(1), post).unwrap();

    assert!(store
        .records(TenantId(2))
        .iter()
        .all(|record| !record.is_attachment()));
}
