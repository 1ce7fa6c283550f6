//! Batch behaviour of the ingestion controller against scripted uploads.

mod common;

use common::{config, init_tracing, jpeg, png, CountingPreviews, RecordingNotifier, Script, ScriptedUploader};
use image_ingest::{
    BatchOutcome, DropEvent, FileError, FileRejection, ImageUrls, IncomingFile,
    IngestionController, NotificationKind, RejectionCode, StateInvariantError, UploadError,
    UploadMode, ValidationError,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    controller: IngestionController,
    uploader: Arc<ScriptedUploader>,
    notifier: Arc<RecordingNotifier>,
    previews: Arc<CountingPreviews>,
}

fn harness(max_files: usize, urls: ImageUrls, uploader: ScriptedUploader) -> Harness {
    init_tracing();
    let uploader = Arc::new(uploader);
    let notifier = Arc::new(RecordingNotifier::default());
    let previews = Arc::new(CountingPreviews::default());
    let controller = IngestionController::builder(config(max_files))
        .initial_urls(urls)
        .uploader(uploader.clone())
        .notifier(notifier.clone())
        .previews(previews.clone())
        .build()
        .expect("controller");
    Harness {
        controller,
        uploader,
        notifier,
        previews,
    }
}

fn url(name: &str) -> String {
    ScriptedUploader::url_for("products", name)
}

#[tokio::test]
async fn multi_mode_appends_in_completion_order_and_skips_failures() {
    let uploader = ScriptedUploader::new()
        .with("one.png", Script::Ok { delay_ms: 150 })
        .with(
            "two.png",
            Script::Fail {
                delay_ms: 10,
                error: UploadError::Rejected {
                    status: 400,
                    message: Some("Invalid image file".into()),
                },
            },
        )
        .with("three.jpg", Script::Ok { delay_ms: 40 });
    let h = harness(3, ImageUrls::Multi(vec!["https://old/keep.png".into()]), uploader);

    let report = h
        .controller
        .ingest(DropEvent::new(vec![png("one.png"), png("two.png"), jpeg("three.jpg")]))
        .await;

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.uploaded, vec![url("three.jpg"), url("one.png")]);
    assert_eq!(
        h.controller.urls(),
        ImageUrls::Multi(vec![
            "https://old/keep.png".into(),
            url("three.jpg"),
            url("one.png"),
        ])
    );

    // One attempt per file, no retry of the failure.
    assert_eq!(h.uploader.calls(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name(), "two.png");
    assert!(!report.is_success());

    // Exactly one notification per settled upload.
    assert_eq!(h.notifier.all().len(), 3);
    assert_eq!(
        h.notifier.successes(),
        vec!["Image Uploaded successfully!", "Image Uploaded successfully!"]
    );
    assert_eq!(h.notifier.errors(), vec!["Invalid image file"]);

    assert_eq!(report.previews_created, 3);
    h.previews.assert_balanced();
}

#[tokio::test]
async fn failure_without_remote_message_uses_generic_text() {
    let uploader = ScriptedUploader::new().with(
        "a.png",
        Script::Fail {
            delay_ms: 0,
            error: UploadError::Rejected {
                status: 500,
                message: None,
            },
        },
    );
    let h = harness(2, ImageUrls::empty(UploadMode::Multi), uploader);

    let report = h.controller.ingest(DropEvent::new(vec![png("a.png")])).await;

    assert!(report.uploaded.is_empty());
    assert_eq!(h.notifier.errors(), vec!["Upload failed"]);
    assert!(h.controller.urls().is_empty());
    h.previews.assert_balanced();
}

#[tokio::test]
async fn single_mode_replaces_previous_url() {
    let h = harness(
        2,
        ImageUrls::Single(Some("https://old/avatar.png".into())),
        ScriptedUploader::new(),
    );
    let mut rx = h.controller.subscribe();

    let report = h.controller.ingest(DropEvent::new(vec![png("avatar 2.png")])).await;

    assert!(report.is_success());
    assert_eq!(h.controller.urls(), ImageUrls::Single(Some(url("avatar 2.png"))));
    assert_eq!(h.controller.urls().len(), 1);
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), ImageUrls::Single(Some(url("avatar 2.png"))));
}

#[tokio::test]
async fn single_mode_refuses_more_than_one_file() {
    let h = harness(5, ImageUrls::empty(UploadMode::Single), ScriptedUploader::new());
    assert_eq!(h.controller.max_files(), 1);

    let report = h
        .controller
        .ingest(DropEvent::new(vec![png("a.png"), png("b.png")]))
        .await;

    assert_eq!(
        report.outcome,
        BatchOutcome::Rejected(vec![ValidationError::TooManyFiles { limit: 1 }])
    );
    assert_eq!(h.uploader.calls(), 0);
    assert_eq!(h.controller.urls(), ImageUrls::Single(None));
}

#[tokio::test]
async fn too_many_files_refuses_whole_batch_with_one_notification() {
    let h = harness(2, ImageUrls::empty(UploadMode::Multi), ScriptedUploader::new());

    let report = h
        .controller
        .ingest(DropEvent::new(vec![png("a.png"), png("b.png"), png("c.png")]))
        .await;

    assert!(matches!(report.outcome, BatchOutcome::Rejected(_)));
    assert_eq!(h.uploader.calls(), 0);
    assert!(h.previews.created().is_empty());
    assert_eq!(
        h.notifier.all(),
        vec![(NotificationKind::Error, "Maximum 2 images can be uploaded!".to_string())]
    );
    assert!(h.controller.urls().is_empty());
}

#[tokio::test]
async fn drop_source_too_many_files_yields_single_count_notification() {
    let h = harness(2, ImageUrls::empty(UploadMode::Multi), ScriptedUploader::new());
    let event = DropEvent::default()
        .with_rejection(FileRejection::new("a.png", RejectionCode::TooManyFiles))
        .with_rejection(FileRejection::new("b.png", RejectionCode::TooManyFiles))
        .with_rejection(FileRejection::new("c.png", RejectionCode::TooManyFiles));

    let report = h.controller.ingest(event).await;

    assert_eq!(
        report.outcome,
        BatchOutcome::Rejected(vec![ValidationError::TooManyFiles { limit: 2 }])
    );
    assert_eq!(h.notifier.errors(), vec!["Maximum 2 images can be uploaded!"]);
}

#[tokio::test]
async fn oversize_and_wrong_type_files_refuse_the_batch() {
    let h = harness(3, ImageUrls::empty(UploadMode::Multi), ScriptedUploader::new());
    let big = IncomingFile::new("huge.png", "image/png", vec![0u8; 5 * 1024 * 1024 + 1]);
    let gif = IncomingFile::new("anim.gif", "image/gif", vec![b'G', b'I', b'F']);

    let report = h
        .controller
        .ingest(DropEvent::new(vec![png("fine.png"), big, gif]))
        .await;

    let BatchOutcome::Rejected(violations) = &report.outcome else {
        panic!("expected refusal, got {:?}", report.outcome);
    };
    assert_eq!(violations.len(), 2);
    assert!(matches!(
        &violations[0],
        ValidationError::TooLarge { name, .. } if name == "huge.png"
    ));
    assert!(matches!(
        &violations[1],
        ValidationError::UnsupportedType { name, .. } if name == "anim.gif"
    ));

    // The valid sibling is not uploaded either.
    assert_eq!(h.uploader.calls(), 0);
    assert_eq!(h.notifier.errors().len(), 2);
}

#[tokio::test]
async fn drop_source_rejection_is_reported_per_reason() {
    let h = harness(3, ImageUrls::empty(UploadMode::Multi), ScriptedUploader::new());
    let event = DropEvent::new(vec![png("a.png")])
        .with_rejection(FileRejection::new("b.bmp", RejectionCode::FileInvalidType));

    let report = h.controller.ingest(event).await;

    assert!(matches!(report.outcome, BatchOutcome::Rejected(ref v) if v.len() == 1));
    let errors = h.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("b.bmp"));
    assert_eq!(h.uploader.calls(), 0);
}

#[tokio::test]
async fn undecodable_file_is_excluded_and_siblings_upload() {
    let h = harness(3, ImageUrls::empty(UploadMode::Multi), ScriptedUploader::new());
    let broken = IncomingFile::new("broken.png", "image/png", b"definitely not a png".to_vec());

    let report = h
        .controller
        .ingest(DropEvent::new(vec![png("ok.png"), broken]))
        .await;

    assert_eq!(report.outcome, BatchOutcome::Completed);
    assert_eq!(report.uploaded, vec![url("ok.png")]);
    assert_eq!(h.uploader.calls(), 1);
    assert!(matches!(
        report.failures.as_slice(),
        [FileError::Decode { name, .. }] if name == "broken.png"
    ));

    let errors = h.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("broken.png"));
    assert_eq!(h.notifier.successes().len(), 1);

    assert_eq!(report.previews_created, 1);
    h.previews.assert_balanced();
}

#[tokio::test]
async fn every_preview_is_revoked_when_all_uploads_fail() {
    let fail = || Script::Fail {
        delay_ms: 5,
        error: UploadError::Network {
            detail: "connection reset".into(),
        },
    };
    let uploader = ScriptedUploader::new()
        .with("a.png", fail())
        .with("b.jpg", fail());
    let h = harness(2, ImageUrls::empty(UploadMode::Multi), uploader);

    let report = h
        .controller
        .ingest(DropEvent::new(vec![png("a.png"), jpeg("b.jpg")]))
        .await;

    assert!(report.uploaded.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(h.previews.created().len(), 2);
    h.previews.assert_balanced();
    assert_eq!(h.notifier.errors(), vec!["Upload failed", "Upload failed"]);
}

#[tokio::test]
async fn dropping_an_in_flight_batch_revokes_its_previews() {
    let uploader = ScriptedUploader::new()
        .with("a.png", Script::Stall)
        .with("b.png", Script::Stall);
    let h = harness(2, ImageUrls::empty(UploadMode::Multi), uploader);

    let mut ingest = Box::pin(
        h.controller
            .ingest(DropEvent::new(vec![png("a.png"), png("b.png")])),
    );
    let both_started = async {
        while h.uploader.calls() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::select! {
        _ = &mut ingest => panic!("stalled uploads cannot settle"),
        _ = tokio::time::timeout(Duration::from_secs(10), both_started) => {}
    }

    assert_eq!(h.previews.created().len(), 2);
    assert!(h.previews.revoked().is_empty());

    drop(ingest);

    h.previews.assert_balanced();
    assert!(h.notifier.all().is_empty());
    assert!(h.controller.urls().is_empty());
}

#[tokio::test]
async fn overlapping_batches_both_reconcile() {
    let uploader = ScriptedUploader::new()
        .with("slow.png", Script::Ok { delay_ms: 120 })
        .with("fast.png", Script::Ok { delay_ms: 10 });
    let h = harness(2, ImageUrls::empty(UploadMode::Multi), uploader);

    let (first, second) = tokio::join!(
        h.controller.ingest(DropEvent::new(vec![png("slow.png")])),
        h.controller.ingest(DropEvent::new(vec![png("fast.png")])),
    );

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(
        h.controller.urls(),
        ImageUrls::Multi(vec![url("fast.png"), url("slow.png")])
    );
    h.previews.assert_balanced();
}

#[tokio::test]
async fn empty_drop_does_nothing() {
    let h = harness(2, ImageUrls::empty(UploadMode::Multi), ScriptedUploader::new());

    let report = h.controller.ingest(DropEvent::default()).await;

    assert_eq!(report.outcome, BatchOutcome::Empty);
    assert_eq!(h.uploader.calls(), 0);
    assert!(h.notifier.all().is_empty());
}

#[tokio::test]
async fn reupload_of_existing_url_is_not_duplicated() {
    let h = harness(
        2,
        ImageUrls::Multi(vec![url("same.png")]),
        ScriptedUploader::new(),
    );

    let report = h.controller.ingest(DropEvent::new(vec![png("same.png")])).await;

    assert_eq!(report.uploaded, vec![url("same.png")]);
    assert_eq!(h.controller.urls(), ImageUrls::Multi(vec![url("same.png")]));
}

#[test]
fn remove_image_removes_exact_match_only() {
    let h = harness(
        2,
        ImageUrls::Multi(vec![
            "https://x/a.png".into(),
            "https://x/ab.png".into(),
            "https://x/c.png".into(),
        ]),
        ScriptedUploader::new(),
    );

    h.controller.remove_image("https://x/a.png").unwrap();

    assert_eq!(
        h.controller.urls(),
        ImageUrls::Multi(vec!["https://x/ab.png".into(), "https://x/c.png".into()])
    );
    assert_eq!(
        h.notifier.all(),
        vec![(NotificationKind::Success, "Image deleted successfully!".to_string())]
    );
}

#[test]
fn remove_image_absent_is_a_silent_noop() {
    let h = harness(
        2,
        ImageUrls::Multi(vec!["https://x/a.png".into()]),
        ScriptedUploader::new(),
    );
    let mut rx = h.controller.subscribe();

    let err = h.controller.remove_image("https://x/zzz.png").unwrap_err();

    assert_eq!(
        err,
        StateInvariantError::NotPresent {
            url: "https://x/zzz.png".into()
        }
    );
    assert_eq!(h.controller.urls().len(), 1);
    assert!(!rx.has_changed().unwrap());
    assert!(h.notifier.all().is_empty());
    assert_eq!(h.controller.remove_image(""), Err(StateInvariantError::EmptyUrl));
}

#[test]
fn single_mode_remove_clears_current_url() {
    let h = harness(
        2,
        ImageUrls::Single(Some("https://x/avatar.png".into())),
        ScriptedUploader::new(),
    );
    assert_eq!(h.controller.mode(), UploadMode::Single);

    h.controller.remove_image("https://x/avatar.png").unwrap();

    assert_eq!(h.controller.urls(), ImageUrls::Single(None));
    assert_eq!(h.notifier.successes().len(), 1);
}
