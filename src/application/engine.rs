use super::authorization::authorize;
use super::reconciliation::PaymentReconciliation;
use crate::domain::actor::Actor;
use crate::domain::booking::{
    Booking, BookingAction, BookingStatus, LocalPaymentStatus, NewBooking,
};
use crate::domain::payment::Payment;
use crate::domain::ports::{BookingStoreRef, PaymentStoreRef};
use crate::error::{CareError, Result};
use tracing::{info, warn};

/// The entry point for actor-triggered booking transitions.
///
/// Each command loads the booking, consults the authorization gate, applies
/// the transition through the entity's validated mutators and persists with
/// a version check-and-set. A concurrent writer wins at most once; the
/// loser observes `Conflict` and the booking is never partially updated.
pub struct BookingEngine {
    bookings: BookingStoreRef,
    payments: PaymentStoreRef,
    reconciliation: PaymentReconciliation,
}

impl BookingEngine {
    pub fn new(
        bookings: BookingStoreRef,
        payments: PaymentStoreRef,
        reconciliation: PaymentReconciliation,
    ) -> Self {
        Self {
            bookings,
            payments,
            reconciliation,
        }
    }

    /// Creates a booking in `AWAITING_PAYMENT` for the requesting customer.
    pub async fn create_booking(&self, actor: &Actor, params: NewBooking) -> Result<Booking> {
        if actor.id != params.customer_id {
            return Err(CareError::Validation(
                "a booking can only be created by its customer".to_string(),
            ));
        }
        let booking = Booking::new(params)?;
        self.bookings.insert(booking.clone()).await?;
        info!(booking = %booking.id, customer = %booking.customer_id, "booking created");
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking> {
        self.load(booking_id).await
    }

    pub async fn bookings_for_customer(&self, customer_id: &str) -> Result<Vec<Booking>> {
        self.bookings.by_customer(customer_id).await
    }

    pub async fn bookings_for_organization(&self, organization_id: &str) -> Result<Vec<Booking>> {
        self.bookings.by_organization(organization_id).await
    }

    /// The payment currently attached to a booking, if checkout started.
    pub async fn active_payment(&self, booking_id: &str) -> Result<Option<Payment>> {
        self.payments.active_for_booking(booking_id).await
    }

    /// Admin forwards a paid booking to the caregiver's organization.
    pub async fn forward_to_org(
        &self,
        actor: &Actor,
        booking_id: &str,
        admin_notes: &str,
    ) -> Result<Booking> {
        self.transition(actor, booking_id, BookingAction::Forward, |b| {
            b.forward(admin_notes)
        })
        .await
    }

    pub async fn org_accept(
        &self,
        actor: &Actor,
        booking_id: &str,
        org_notes: &str,
    ) -> Result<Booking> {
        self.transition(actor, booking_id, BookingAction::OrgAccept, |b| {
            b.org_accept(org_notes)
        })
        .await
    }

    /// Organization declines the engagement; the booking is cancelled and,
    /// if the customer already paid, a refund is queued.
    pub async fn org_reject(
        &self,
        actor: &Actor,
        booking_id: &str,
        reason: &str,
    ) -> Result<Booking> {
        let booking = self
            .transition(actor, booking_id, BookingAction::OrgReject, |b| {
                b.org_reject(reason)
            })
            .await?;
        self.queue_refund_if_paid(&booking).await?;
        Ok(booking)
    }

    pub async fn start_service(&self, actor: &Actor, booking_id: &str) -> Result<Booking> {
        self.transition(actor, booking_id, BookingAction::Start, |b| b.start())
            .await
    }

    pub async fn complete_service(&self, actor: &Actor, booking_id: &str) -> Result<Booking> {
        self.transition(actor, booking_id, BookingAction::Complete, |b| b.complete())
            .await
    }

    /// Customer or admin cancellation. Legal before the service starts;
    /// queues a refund when the payment has already completed.
    pub async fn cancel(&self, actor: &Actor, booking_id: &str, reason: &str) -> Result<Booking> {
        let booking = self
            .transition(actor, booking_id, BookingAction::Cancel, |b| b.cancel(reason))
            .await?;
        self.queue_refund_if_paid(&booking).await?;
        Ok(booking)
    }

    /// Moves an in-progress or completed booking into `DISPUTED`.
    pub async fn dispute(&self, actor: &Actor, booking_id: &str) -> Result<Booking> {
        self.transition(actor, booking_id, BookingAction::Dispute, |b| b.dispute())
            .await
    }

    /// Direct admin refund of a disputed (or cancelled-after-payment)
    /// booking, delegated to the reconciliation engine.
    pub async fn refund(
        &self,
        actor: &Actor,
        booking_id: &str,
        amount: Option<rust_decimal::Decimal>,
        reason: Option<String>,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        let order_id = booking.payment.order_id.clone().ok_or_else(|| {
            CareError::Validation(format!("booking {booking_id} has no payment order"))
        })?;
        self.reconciliation
            .process_refund(&order_id, amount, reason, actor)
            .await?;
        self.load(booking_id).await
    }

    /// One authorize-validate-persist cycle. The booking read under a
    /// failed authorization or an illegal transition is discarded.
    async fn transition<F>(
        &self,
        actor: &Actor,
        booking_id: &str,
        action: BookingAction,
        apply: F,
    ) -> Result<Booking>
    where
        F: FnOnce(&mut Booking) -> Result<()>,
    {
        let mut booking = self.load(booking_id).await?;
        authorize(actor, action, &booking)?;
        apply(&mut booking)?;
        let booking = self.bookings.update(booking).await?;
        info!(booking = booking_id, %action, status = %booking.status(), "transition applied");
        Ok(booking)
    }

    /// Refund path for cancellations of an already-paid booking. Failures
    /// here are reported but do not undo the cancellation; the payment can
    /// be refunded again by an admin since the idempotency keys make the
    /// retry safe.
    async fn queue_refund_if_paid(&self, booking: &Booking) -> Result<()> {
        if booking.payment.status != LocalPaymentStatus::Completed {
            return Ok(());
        }
        let Some(order_id) = booking.payment.order_id.clone() else {
            return Ok(());
        };
        debug_assert_eq!(booking.status(), BookingStatus::Cancelled);
        match self
            .reconciliation
            .process_refund(
                &order_id,
                None,
                Some("booking cancelled".to_string()),
                &Actor::system(),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_retryable() => {
                warn!(booking = %booking.id, order = %order_id, error = %e, "queued refund did not complete; safe to retry");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn load(&self, booking_id: &str) -> Result<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CareError::NotFound(format!("booking {booking_id}")))
    }
}
