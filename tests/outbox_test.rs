mod common;

use chrono::Duration;
use common::{Harness, RecordingCertificates};
use seva::clock::Clock;
use seva::config::BookingPolicy;
use seva::outbox::{OutboxTaskKind, OutboxTaskStatus};
use seva::proofs::MediaKind;
use seva::store::Store;

#[tokio::test]
async fn test_first_proof_queues_one_certificate_task() {
    let h = Harness::new();
    let booking = h.confirmed_booking(None).await;
    for locator in ["s3://1.jpg", "s3://2.jpg"] {
        h.engine
            .proofs
            .record_proof(&h.officiant, booking.id, MediaKind::Image, locator)
            .await
            .unwrap();
    }

    let tasks = h.store.list_tasks(booking.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, OutboxTaskKind::CertificateGeneration);
    assert_eq!(tasks[0].status, OutboxTaskStatus::Pending);
    // Nothing runs inline with the upload
    assert_eq!(h.certificates.call_count(), 0);

    let report = h.engine.outbox.run_once(h.clock.now()).await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(*h.certificates.calls.lock().unwrap(), vec![booking.id]);

    let tasks = h.store.list_tasks(booking.id).await.unwrap();
    assert_eq!(tasks[0].status, OutboxTaskStatus::Done);
}

#[tokio::test]
async fn test_failed_task_retries_after_backoff() {
    let h = Harness::with(BookingPolicy::default(), RecordingCertificates::failing(1));
    let booking = h.confirmed_booking(None).await;
    h.engine
        .proofs
        .record_proof(&h.officiant, booking.id, MediaKind::Image, "s3://1.jpg")
        .await
        .unwrap();
    let now = h.clock.now();

    let first = h.engine.outbox.run_once(now).await.unwrap();
    assert_eq!(first.retried, 1);
    let task = h.store.list_tasks(booking.id).await.unwrap().remove(0);
    assert_eq!(task.status, OutboxTaskStatus::Pending);
    assert_eq!(task.attempts, 1);
    assert_eq!(task.next_attempt_at, now + Duration::seconds(30));
    assert_eq!(task.last_error.as_deref(), Some("renderer unavailable"));

    let too_early = h
        .engine
        .outbox
        .run_once(now + Duration::seconds(10))
        .await
        .unwrap();
    assert_eq!(too_early.claimed, 0);

    let retry = h
        .engine
        .outbox
        .run_once(now + Duration::seconds(31))
        .await
        .unwrap();
    assert_eq!(retry.completed, 1);
    assert_eq!(h.certificates.call_count(), 2);
    let task = h.store.list_tasks(booking.id).await.unwrap().remove(0);
    assert_eq!(task.status, OutboxTaskStatus::Done);
}

#[tokio::test]
async fn test_task_dies_after_max_attempts() {
    let policy = BookingPolicy {
        outbox_max_attempts: 2,
        ..Default::default()
    };
    let h = Harness::with(policy, RecordingCertificates::failing(100));
    let booking = h.confirmed_booking(None).await;
    h.engine
        .proofs
        .record_proof(&h.officiant, booking.id, MediaKind::Image, "s3://1.jpg")
        .await
        .unwrap();
    let now = h.clock.now();

    assert_eq!(h.engine.outbox.run_once(now).await.unwrap().retried, 1);
    let second = h
        .engine
        .outbox
        .run_once(now + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(second.dead, 1);

    let task = h.store.list_tasks(booking.id).await.unwrap().remove(0);
    assert_eq!(task.status, OutboxTaskStatus::Dead);
    assert_eq!(task.attempts, 2);

    let later = h
        .engine
        .outbox
        .run_once(now + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(later.claimed, 0);
    assert_eq!(h.certificates.call_count(), 2);
}

#[tokio::test]
async fn test_certificate_failure_never_fails_upload() {
    let h = Harness::with(BookingPolicy::default(), RecordingCertificates::failing(100));
    let booking = h.confirmed_booking(None).await;
    let proof = h
        .engine
        .proofs
        .record_proof(&h.officiant, booking.id, MediaKind::Video, "s3://v.mp4")
        .await;
    assert!(proof.is_ok());
    h.engine
        .outbox
        .run_once(h.clock.now())
        .await
        .unwrap();
    assert_eq!(h.engine.proofs.count_usable(booking.id).await.unwrap(), 1);
}
