mod common;

use common::{
    Harness, RecordingCertificates, checkout_signature, webhook_body, webhook_signature,
};
use seva::EngineError;
use seva::bookings::BookingStatus;
use seva::config::BookingPolicy;
use seva::gateway::ProviderPayment;
use seva::ops_issues::{IssueSeverity, IssueType};
use seva::payments::PaymentStatus;
use seva::reconciler::{WebhookAck, webhook_event_id};
use seva::settlement::SettlementPolicy;
use seva::store::Store;
use serde_json::json;

#[tokio::test]
async fn test_payment_order_checks_amount_and_reuses_open_order() {
    let h = Harness::new();
    let service = h.service(120_000, None).await;
    let booking = h.book(&service).await;

    let short = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 100_000)
        .await;
    assert!(matches!(
        short,
        Err(EngineError::AmountMismatch {
            expected: 120_000,
            actual: 100_000
        })
    ));
    let zero = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 0)
        .await;
    assert!(matches!(zero, Err(EngineError::InvalidInput(_))));

    let first = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 120_000)
        .await
        .unwrap();
    let second = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 120_000)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.provider, "razorpay");
    assert_eq!(h.gateway.orders_created(), 1);

    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Created);
    assert_eq!(payment.provider_order_id, first.provider_order_id);
}

#[tokio::test]
async fn test_payment_order_only_for_owner() {
    let h = Harness::new();
    let service = h.service(120_000, None).await;
    let booking = h.book(&service).await;

    let by_ops = h
        .engine
        .payments
        .create_payment_order(&h.ops, booking.id, 120_000)
        .await;
    assert!(matches!(by_ops, Err(EngineError::Forbidden(_))));
    assert_eq!(h.gateway.orders_created(), 0);
}

#[tokio::test]
async fn test_provider_failure_surfaces_as_provider_error() {
    let h = Harness::new();
    let service = h.service(120_000, None).await;
    let booking = h.book(&service).await;
    h.gateway.fail_orders(true);

    let result = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 120_000)
        .await;
    assert!(matches!(result, Err(EngineError::ProviderError(_))));
    assert!(h.store.get_payment_by_booking(booking.id).await.unwrap().is_none());

    h.gateway.fail_orders(false);
    assert!(
        h.engine
            .payments
            .create_payment_order(&h.devotee, booking.id, 120_000)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_confirmation_captures_confirms_and_splits() {
    let h = Harness::new();
    let service = h.service(100_000, None).await;
    let booking = h.book(&service).await;

    let outcome = h.pay(&booking).await;
    assert_eq!(outcome.payment_status, PaymentStatus::Captured);
    assert_eq!(outcome.booking_status, BookingStatus::Confirmed);
    assert!(outcome.booking_confirmed);
    assert!(outcome.payout_created);

    let payout = h.store.get_payout(booking.id).await.unwrap().unwrap();
    // 15% commission, venue takes half of the rest
    assert_eq!(payout.platform_fee, 15_000);
    assert_eq!(payout.venue_share, 42_500);
    assert_eq!(payout.officiant_share, 42_500);
    assert_eq!(payout.total_amount, 100_000);

    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(
        payment.provider_payment_id.as_deref(),
        Some(format!("pay_{}", booking.id.simple()).as_str())
    );
    assert!(payment.provider_signature.is_some());
}

#[tokio::test]
async fn test_repeated_confirmation_is_a_no_op() {
    let h = Harness::new();
    let service = h.service(100_000, None).await;
    let booking = h.book(&service).await;
    h.pay(&booking).await;

    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    let payment_id = payment.provider_payment_id.clone().unwrap();
    let again = h
        .engine
        .payments
        .confirm_payment(
            &h.devotee,
            booking.id,
            &payment.provider_order_id,
            &payment_id,
            &checkout_signature(&payment.provider_order_id, &payment_id),
        )
        .await
        .unwrap();
    assert!(!again.booking_confirmed);
    assert!(!again.payout_created);
    assert_eq!(again.booking_status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_tampered_checkout_signature_is_rejected() {
    let h = Harness::new();
    let service = h.service(100_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 100_000)
        .await
        .unwrap();
    h.gateway.set_payment(ProviderPayment {
        id: "pay_real".to_string(),
        order_id: Some(order.provider_order_id.clone()),
        amount: 100_000,
        currency: "INR".to_string(),
        status: "captured".to_string(),
    });

    // Signature for a different payment id
    let forged = checkout_signature(&order.provider_order_id, "pay_other");
    let result = h
        .engine
        .payments
        .confirm_payment(
            &h.devotee,
            booking.id,
            &order.provider_order_id,
            "pay_real",
            &forged,
        )
        .await;
    assert!(matches!(result, Err(EngineError::InvalidSignature)));

    let garbage = h
        .engine
        .payments
        .confirm_payment(
            &h.devotee,
            booking.id,
            &order.provider_order_id,
            "pay_real",
            "not-hex",
        )
        .await;
    assert!(matches!(garbage, Err(EngineError::InvalidSignature)));

    assert_eq!(h.booking(booking.id).await.status, BookingStatus::PaymentPending);
    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Created);
}

#[tokio::test]
async fn test_confirmation_rejects_amount_reported_by_provider() {
    let h = Harness::new();
    let service = h.service(100_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 100_000)
        .await
        .unwrap();
    h.gateway.set_payment(ProviderPayment {
        id: "pay_short".to_string(),
        order_id: Some(order.provider_order_id.clone()),
        amount: 1_000,
        currency: "INR".to_string(),
        status: "captured".to_string(),
    });

    let result = h
        .engine
        .payments
        .confirm_payment(
            &h.devotee,
            booking.id,
            &order.provider_order_id,
            "pay_short",
            &checkout_signature(&order.provider_order_id, "pay_short"),
        )
        .await;
    assert!(matches!(result, Err(EngineError::AmountMismatch { .. })));
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::PaymentPending);
}

#[tokio::test]
async fn test_webhook_replays_create_one_payout_and_one_confirmation() {
    let h = Harness::new();
    let service = h.service(99_999, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 99_999)
        .await
        .unwrap();

    let body = webhook_body(
        "payment.captured",
        "pay_hook",
        &order.provider_order_id,
        99_999,
        "captured",
    );
    let signature = webhook_signature(&body);

    // Same event redelivered under distinct ids, then under the same id
    let mut confirmations = 0;
    for attempt in 0..5 {
        let event_id = format!("evt_{}", attempt);
        let before = h.booking(booking.id).await.status;
        let ack = h
            .engine
            .payments
            .handle_webhook(&body, &signature, Some(&event_id))
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Processed);
        if before == BookingStatus::PaymentPending
            && h.booking(booking.id).await.status == BookingStatus::Confirmed
        {
            confirmations += 1;
        }
    }
    for _ in 0..3 {
        let ack = h
            .engine
            .payments
            .handle_webhook(&body, &signature, Some("evt_0"))
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Duplicate);
    }

    assert_eq!(confirmations, 1);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
    let payout = h.store.get_payout(booking.id).await.unwrap().unwrap();
    assert_eq!(
        payout.platform_fee + payout.venue_share + payout.officiant_share,
        99_999
    );
    assert!(h.store.is_payment_event_processed("evt_4").await.unwrap());
}

#[tokio::test]
async fn test_webhook_without_event_id_is_keyed_by_body() {
    let h = Harness::new();
    let service = h.service(10_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 10_000)
        .await
        .unwrap();
    let body = webhook_body(
        "order.paid",
        "pay_1",
        &order.provider_order_id,
        10_000,
        "captured",
    );
    let signature = webhook_signature(&body);

    let first = h
        .engine
        .payments
        .handle_webhook(&body, &signature, None)
        .await
        .unwrap();
    let second = h
        .engine
        .payments
        .handle_webhook(&body, &signature, Some("  "))
        .await
        .unwrap();
    assert_eq!(first, WebhookAck::Processed);
    assert_eq!(second, WebhookAck::Duplicate);
    assert!(
        h.store
            .is_payment_event_processed(&webhook_event_id(None, &body))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_tampered_webhook_is_rejected() {
    let h = Harness::new();
    let service = h.service(10_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 10_000)
        .await
        .unwrap();

    let genuine = webhook_body(
        "payment.failed",
        "pay_1",
        &order.provider_order_id,
        10_000,
        "failed",
    );
    let signature = webhook_signature(&genuine);
    let tampered = webhook_body(
        "payment.captured",
        "pay_1",
        &order.provider_order_id,
        10_000,
        "captured",
    );

    let result = h
        .engine
        .payments
        .handle_webhook(&tampered, &signature, Some("evt_t"))
        .await;
    assert!(matches!(result, Err(EngineError::InvalidSignature)));
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::PaymentPending);
    assert!(!h.store.is_payment_event_processed("evt_t").await.unwrap());
}

#[tokio::test]
async fn test_failed_then_captured_payment() {
    let h = Harness::new();
    let service = h.service(10_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 10_000)
        .await
        .unwrap();

    let failed = webhook_body(
        "payment.failed",
        "pay_1",
        &order.provider_order_id,
        10_000,
        "failed",
    );
    h.engine
        .payments
        .handle_webhook(&failed, &webhook_signature(&failed), Some("evt_f"))
        .await
        .unwrap();
    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::PaymentPending);

    let captured = webhook_body(
        "payment.captured",
        "pay_2",
        &order.provider_order_id,
        10_000,
        "captured",
    );
    h.engine
        .payments
        .handle_webhook(&captured, &webhook_signature(&captured), Some("evt_c"))
        .await
        .unwrap();
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
    assert!(h.store.get_payout(booking.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_webhook_amount_mismatch_is_left_for_redelivery() {
    let h = Harness::new();
    let service = h.service(10_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 10_000)
        .await
        .unwrap();
    let body = webhook_body(
        "payment.captured",
        "pay_1",
        &order.provider_order_id,
        9_000,
        "captured",
    );

    let result = h
        .engine
        .payments
        .handle_webhook(&body, &webhook_signature(&body), Some("evt_m"))
        .await;
    assert!(matches!(result, Err(EngineError::AmountMismatch { .. })));
    assert!(!h.store.is_payment_event_processed("evt_m").await.unwrap());
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::PaymentPending);
}

#[tokio::test]
async fn test_unknown_order_and_event_type_are_acknowledged() {
    let h = Harness::new();
    let unknown_failure = webhook_body("payment.failed", "pay_x", "order_nope", 500, "failed");
    let ack = h
        .engine
        .payments
        .handle_webhook(
            &unknown_failure,
            &webhook_signature(&unknown_failure),
            Some("evt_u"),
        )
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Ignored);
    assert!(h.store.is_payment_event_processed("evt_u").await.unwrap());

    let refund = webhook_body("refund.created", "pay_x", "order_nope", 500, "refunded");
    let ack = h
        .engine
        .payments
        .handle_webhook(&refund, &webhook_signature(&refund), Some("evt_r"))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Ignored);
}

#[tokio::test]
async fn test_signed_malformed_body_is_acknowledged_not_redelivered() {
    let h = Harness::new();
    let malformed = b"{not json".to_vec();
    let ack = h
        .engine
        .payments
        .handle_webhook(&malformed, &webhook_signature(&malformed), Some("evt_bad"))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Malformed);
    assert!(!h.store.is_payment_event_processed("evt_bad").await.unwrap());

    // Payment event without a payment entity
    let hollow = serde_json::to_vec(&json!({ "event": "payment.captured", "payload": {} })).unwrap();
    let ack = h
        .engine
        .payments
        .handle_webhook(&hollow, &webhook_signature(&hollow), Some("evt_hollow"))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Malformed);

    // The journal row stays unprocessed, so a redelivery gets the same answer
    let again = h
        .engine
        .payments
        .handle_webhook(&malformed, &webhook_signature(&malformed), Some("evt_bad"))
        .await
        .unwrap();
    assert_eq!(again, WebhookAck::Malformed);
}

#[tokio::test]
async fn test_capture_on_unknown_order_opens_issue() {
    let h = Harness::new();
    let service = h.service(10_000, None).await;
    let booking = h.book(&service).await;

    let body = serde_json::to_vec(&json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_stray",
                    "order_id": "order_elsewhere",
                    "amount": 10_000,
                    "status": "captured",
                    "notes": { "booking_id": booking.id.to_string() },
                }
            }
        }
    }))
    .unwrap();
    let signature = webhook_signature(&body);
    for event_id in ["evt_stray_1", "evt_stray_2"] {
        let ack = h
            .engine
            .payments
            .handle_webhook(&body, &signature, Some(event_id))
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Unmatched);
        assert!(!h.store.is_payment_event_processed(event_id).await.unwrap());
    }

    let issues = h.store.list_issues(booking.id).await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::UnmatchedCapture);
    assert_eq!(issues[0].severity, IssueSeverity::High);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::PaymentPending);

    // Without a booking hint the capture is still not acknowledged as handled
    let bare = webhook_body("payment.captured", "pay_bare", "order_gone", 500, "captured");
    let ack = h
        .engine
        .payments
        .handle_webhook(&bare, &webhook_signature(&bare), Some("evt_bare"))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Unmatched);
}

#[tokio::test]
async fn test_capture_on_original_order_after_failed_retry() {
    let h = Harness::new();
    let service = h.service(40_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 40_000)
        .await
        .unwrap();

    let failed = webhook_body(
        "payment.failed",
        "pay_declined",
        &order.provider_order_id,
        40_000,
        "failed",
    );
    h.engine
        .payments
        .handle_webhook(&failed, &webhook_signature(&failed), Some("evt_failed"))
        .await
        .unwrap();

    // The devotee retries checkout
    let retry = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 40_000)
        .await
        .unwrap();
    assert_eq!(retry.provider_order_id, order.provider_order_id);
    assert_eq!(retry.payment_id, order.payment_id);
    assert_eq!(h.gateway.orders_created(), 1);
    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    let wrong_amount = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 39_000)
        .await;
    assert!(matches!(
        wrong_amount,
        Err(EngineError::AmountMismatch { .. })
    ));

    let captured = webhook_body(
        "payment.captured",
        "pay_second_try",
        &order.provider_order_id,
        40_000,
        "captured",
    );
    let ack = h
        .engine
        .payments
        .handle_webhook(&captured, &webhook_signature(&captured), Some("evt_captured"))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Processed);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Captured);
    assert_eq!(payment.provider_payment_id.as_deref(), Some("pay_second_try"));
    let payout = h.store.get_payout(booking.id).await.unwrap().unwrap();
    assert_eq!(payout.total_amount, 40_000);
    assert!(h.store.list_issues(booking.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_authorized_then_captured_webhooks() {
    let h = Harness::new();
    let service = h.service(30_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 30_000)
        .await
        .unwrap();
    let authorized = webhook_body(
        "payment.authorized",
        "pay_auth",
        &order.provider_order_id,
        30_000,
        "authorized",
    );
    let ack = h
        .engine
        .payments
        .handle_webhook(&authorized, &webhook_signature(&authorized), Some("evt_a"))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Processed);
    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Authorized);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::PaymentPending);
    assert!(h.store.get_payout(booking.id).await.unwrap().is_none());

    let captured = webhook_body(
        "payment.captured",
        "pay_auth",
        &order.provider_order_id,
        30_000,
        "captured",
    );
    let ack = h
        .engine
        .payments
        .handle_webhook(&captured, &webhook_signature(&captured), Some("evt_c"))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Processed);
    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Captured);
    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
    assert!(h.store.get_payout(booking.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_late_webhooks_never_downgrade_capture() {
    let h = Harness::new();
    let service = h.service(30_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 30_000)
        .await
        .unwrap();

    let captured = webhook_body(
        "payment.captured",
        "pay_1",
        &order.provider_order_id,
        30_000,
        "captured",
    );
    h.engine
        .payments
        .handle_webhook(&captured, &webhook_signature(&captured), Some("evt_c"))
        .await
        .unwrap();
    let payout = h.store.get_payout(booking.id).await.unwrap().unwrap();

    for (event, status, event_id) in [
        ("payment.authorized", "authorized", "evt_late_a"),
        ("payment.failed", "failed", "evt_late_f"),
    ] {
        let late = webhook_body(event, "pay_1", &order.provider_order_id, 30_000, status);
        let ack = h
            .engine
            .payments
            .handle_webhook(&late, &webhook_signature(&late), Some(event_id))
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Processed);

        let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Captured);
        assert_eq!(h.booking(booking.id).await.status, BookingStatus::Confirmed);
        let still = h.store.get_payout(booking.id).await.unwrap().unwrap();
        assert_eq!(still.id, payout.id);
    }
}

#[tokio::test]
async fn test_capture_after_cancellation_does_not_resurrect() {
    let h = Harness::new();
    let service = h.service(10_000, None).await;
    let booking = h.book(&service).await;
    let order = h
        .engine
        .payments
        .create_payment_order(&h.devotee, booking.id, 10_000)
        .await
        .unwrap();
    h.engine
        .bookings
        .cancel_booking(&h.devotee, booking.id)
        .await
        .unwrap();

    let body = webhook_body(
        "payment.captured",
        "pay_late",
        &order.provider_order_id,
        10_000,
        "captured",
    );
    let signature = webhook_signature(&body);
    for event_id in ["evt_1", "evt_2"] {
        let ack = h
            .engine
            .payments
            .handle_webhook(&body, &signature, Some(event_id))
            .await
            .unwrap();
        assert_eq!(ack, WebhookAck::Processed);
    }

    assert_eq!(h.booking(booking.id).await.status, BookingStatus::Cancelled);
    let payment = h.store.get_payment_by_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Captured);
    assert!(h.store.get_payout(booking.id).await.unwrap().is_none());

    let issues = h.store.list_issues(booking.id).await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue_type, IssueType::CaptureOnInactiveBooking);
    assert_eq!(issues[0].severity, IssueSeverity::High);
}

#[tokio::test]
async fn test_split_balances_through_capture() {
    for commission in [0, 15, 33] {
        let policy = BookingPolicy {
            settlement: SettlementPolicy::from_percentages(commission, 50),
            ..Default::default()
        };
        let h = Harness::with(policy, RecordingCertificates::default());

        for total in [1_i64, 99, 100_000, 333_333] {
            let service = h.service(total, None).await;
            let booking = h.book(&service).await;
            h.pay(&booking).await;

            let payout = h.store.get_payout(booking.id).await.unwrap().unwrap();
            assert_eq!(
                payout.officiant_share + payout.venue_share + payout.platform_fee,
                total,
                "commission {}% total {}",
                commission,
                total
            );
            assert!(payout.officiant_share >= 0 && payout.venue_share >= 0);
        }
    }

    for commission in [0, 15, 33] {
        let split = SettlementPolicy::from_percentages(commission, 50).split(0);
        assert!(split.is_balanced());
        assert_eq!(split.platform_fee, 0);
    }
}
