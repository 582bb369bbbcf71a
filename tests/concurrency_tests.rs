use carebook::domain::actor::Actor;
use carebook::domain::booking::BookingStatus;
use carebook::domain::payment::{PaymentStatus, WebhookEvent, WebhookKind};
use carebook::error::CareError;
use rust_decimal_macros::dec;

mod common;
use common::{booking_params, services, sig, TestServices};

async fn paid_cancelled_booking(svc: &TestServices) -> String {
    let customer = Actor::customer("alice");
    svc.engine
        .create_booking(&customer, booking_params("B1"))
        .await
        .unwrap();
    let payment = svc.reconciliation.create_order("B1").await.unwrap();
    svc.reconciliation
        .verify_payment(&payment.order_id, "pay_1", &sig(&payment.order_id, "pay_1"))
        .await
        .unwrap();

    // Cancel through the store-level path so no refund is queued yet and
    // the two explicit refund attempts below race for it.
    let mut booking = svc.bookings.get("B1").await.unwrap().unwrap();
    booking.cancel("customer request").unwrap();
    svc.bookings.update(booking).await.unwrap();

    payment.order_id
}

#[tokio::test]
async fn test_concurrent_refunds_produce_exactly_one() {
    let svc = services();
    let order_id = paid_cancelled_booking(&svc).await;
    let admin = Actor::admin("admin-1");

    let (first, second) = tokio::join!(
        svc.reconciliation
            .process_refund(&order_id, None, None, &admin),
        svc.reconciliation
            .process_refund(&order_id, None, None, &admin),
    );

    // At least one attempt wins; a loser either observed the refunded
    // state (no-op success) or lost the version race with `Conflict`.
    let mut successes = 0;
    for result in [first, second] {
        match result {
            Ok(payment) => {
                successes += 1;
                assert_eq!(payment.status, PaymentStatus::Refunded);
            }
            Err(CareError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(successes >= 1);

    // The money moved exactly once.
    let payment = svc.payments.get(&order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert_eq!(payment.refunds.len(), 1);
    assert_eq!(payment.refunded_amount(), dec!(2000));

    let booking = svc.bookings.get("B1").await.unwrap().unwrap();
    assert_eq!(booking.status(), BookingStatus::Cancelled);
    assert_eq!(booking.refund_amount, Some(dec!(2000)));
}

#[tokio::test]
async fn test_verify_racing_webhook_converges() {
    let svc = services();
    let customer = Actor::customer("alice");
    svc.engine
        .create_booking(&customer, booking_params("B1"))
        .await
        .unwrap();
    let payment = svc.reconciliation.create_order("B1").await.unwrap();
    let order_id = payment.order_id.clone();

    let event = WebhookEvent {
        event_id: "evt_1".into(),
        kind: WebhookKind::Captured,
        order_id: order_id.clone(),
        payment_ref: "pay_1".into(),
        amount: dec!(2000),
    };

    let sig_1 = sig(&order_id, "pay_1");
    let (verified, notified) = tokio::join!(
        svc.reconciliation
            .verify_payment(&order_id, "pay_1", &sig_1),
        svc.reconciliation.handle_webhook(&event),
    );

    // Whoever lost the race failed cleanly with a retryable conflict.
    if let Err(e) = &verified {
        assert!(matches!(e, CareError::Conflict(_)), "unexpected: {e}");
    }
    if let Err(e) = &notified {
        assert!(matches!(e, CareError::Conflict(_)), "unexpected: {e}");
    }
    assert!(verified.is_ok() || notified.is_ok());

    // Both records converged on paid, with no duplicate side effects.
    let stored = svc.payments.get(&order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Paid);
    assert_eq!(stored.payment_ref.as_deref(), Some("pay_1"));
    let booking = svc.bookings.get("B1").await.unwrap().unwrap();
    assert_eq!(booking.status(), BookingStatus::PaidPendingAdmin);

    // Retrying the losing webhook is now a recorded no-op.
    svc.reconciliation.handle_webhook(&event).await.unwrap();
    let stored = svc.payments.get(&order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_concurrent_transition_attempts_single_winner() {
    let svc = services();
    let customer = Actor::customer("alice");
    let admin = Actor::admin("admin-1");

    svc.engine
        .create_booking(&customer, booking_params("B1"))
        .await
        .unwrap();
    let payment = svc.reconciliation.create_order("B1").await.unwrap();
    svc.reconciliation
        .verify_payment(&payment.order_id, "pay_1", &sig(&payment.order_id, "pay_1"))
        .await
        .unwrap();

    // Two admins forward the same booking at once. Whatever the
    // interleaving, the loser either lost the version race (`Conflict`)
    // or found the transition already applied (`InvalidTransition`).
    let (first, second) = tokio::join!(
        svc.engine.forward_to_org(&admin, "B1", "verified by admin-1"),
        svc.engine.forward_to_org(&admin, "B1", "verified again"),
    );

    let mut winners = 0;
    for result in [first, second] {
        match result {
            Ok(booking) => {
                winners += 1;
                assert_eq!(booking.status(), BookingStatus::ForwardedToOrg);
            }
            Err(CareError::Conflict(_) | CareError::InvalidTransition { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1, "exactly one transition may win");

    let booking = svc.bookings.get("B1").await.unwrap().unwrap();
    assert_eq!(booking.status(), BookingStatus::ForwardedToOrg);
}
