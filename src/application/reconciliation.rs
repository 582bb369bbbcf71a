use crate::domain::actor::Actor;
use crate::domain::booking::{Booking, BookingAction, BookingStatus, LocalPaymentStatus};
use crate::domain::payment::{
    Payment, PaymentStatus, Refund, RefundStatus, WebhookEvent, WebhookKind, payment_signature,
};
use crate::domain::ports::{BookingStoreRef, PaymentGatewayRef, PaymentStoreRef};
use crate::error::{CareError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(5);

/// How many times an internal booking write is retried when it loses a
/// version race before the operation reports `Conflict` to the caller.
const MAX_CAS_RETRIES: usize = 3;

/// Keeps gateway money state and booking state consistent under
/// asynchronous, duplicated and out-of-order notifications.
///
/// Every mutating operation is keyed: order creation by the booking's
/// active-payment check, confirmation by the gateway order id, webhooks by
/// the gateway event id and refunds by the order id. Retries therefore
/// converge on the same end state.
#[derive(Clone)]
pub struct PaymentReconciliation {
    bookings: BookingStoreRef,
    payments: PaymentStoreRef,
    gateway: PaymentGatewayRef,
    webhook_secret: String,
    gateway_timeout: Duration,
}

impl PaymentReconciliation {
    pub fn new(
        bookings: BookingStoreRef,
        payments: PaymentStoreRef,
        gateway: PaymentGatewayRef,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            bookings,
            payments,
            gateway,
            webhook_secret: webhook_secret.into(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Creates a gateway order for a booking awaiting payment.
    ///
    /// At most one non-terminal payment may exist per booking; a second
    /// checkout attempt gets `AlreadyInProgress` and should poll the
    /// existing order instead.
    pub async fn create_order(&self, booking_id: &str) -> Result<Payment> {
        let booking = self.get_booking(booking_id).await?;
        if booking.status() != BookingStatus::AwaitingPayment {
            return Err(CareError::InvalidTransition {
                from: booking.status(),
                action: BookingAction::MarkPaid,
            });
        }
        if let Some(active) = self.payments.active_for_booking(booking_id).await? {
            return Err(CareError::AlreadyInProgress(active.order_id));
        }

        let amount = booking.pricing.total_amount;
        let currency = booking.pricing.currency.clone();
        let order_id = self
            .bounded(self.gateway.create_order(amount, &currency))
            .await?;

        let payment = Payment::new(order_id.clone(), booking_id, amount, currency);
        self.payments.insert(payment.clone()).await?;
        self.update_booking(booking_id, |b| {
            b.attach_order(order_id.clone())?;
            Ok(true)
        })
        .await?;

        info!(booking = booking_id, order = %payment.order_id, %amount, "gateway order created");
        Ok(payment)
    }

    /// Verifies a client-submitted payment confirmation and marks both the
    /// payment and the booking paid.
    ///
    /// Idempotent: replaying an already-applied triple is a no-op success.
    /// A signature mismatch mutates nothing and is logged at high severity.
    pub async fn verify_payment(
        &self,
        order_id: &str,
        payment_ref: &str,
        signature: &str,
    ) -> Result<Payment> {
        let mut payment = self.get_payment(order_id).await?;

        let expected = payment_signature(order_id, payment_ref, &self.webhook_secret);
        if expected != signature {
            error!(order = order_id, payment = payment_ref, "signature mismatch on payment confirmation");
            return Err(CareError::SignatureMismatch(order_id.to_string()));
        }

        if payment.status.rank() >= PaymentStatus::Paid.rank() {
            if payment.payment_ref.as_deref() == Some(payment_ref) {
                debug!(order = order_id, "payment already confirmed; verify is a no-op");
                return Ok(payment);
            }
            return Err(CareError::StatusAnomaly {
                order_id: order_id.to_string(),
                detail: format!(
                    "confirmation for {payment_ref} but payment was captured as {:?}",
                    payment.payment_ref
                ),
            });
        }
        if payment.status == PaymentStatus::Failed {
            return Err(CareError::StatusAnomaly {
                order_id: order_id.to_string(),
                detail: "confirmation received for a payment the gateway reported failed"
                    .to_string(),
            });
        }

        payment.mark_paid(payment_ref, signature);
        let payment = self.payments.update(payment).await?;
        self.mark_booking_paid(&payment, payment_ref).await?;

        info!(order = order_id, payment = payment_ref, "payment verified");
        Ok(payment)
    }

    /// Applies an asynchronous gateway notification.
    ///
    /// Duplicate event ids and events that would move the payment backward
    /// are no-ops; a reported amount that disagrees with the recorded
    /// payment is surfaced for manual review without touching state.
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> Result<()> {
        if self.payments.event_seen(&event.event_id).await? {
            debug!(event = %event.event_id, "duplicate webhook delivery ignored");
            return Ok(());
        }
        let payment = self.get_payment(&event.order_id).await?;

        match event.kind {
            WebhookKind::Captured => self.apply_captured(payment, event).await?,
            WebhookKind::Failed => self.apply_failed(payment, event).await?,
            WebhookKind::Refunded => self.apply_refunded(payment, event).await?,
        }
        self.payments.mark_event(&event.event_id).await
    }

    async fn apply_captured(&self, mut payment: Payment, event: &WebhookEvent) -> Result<()> {
        if event.amount != payment.amount {
            error!(order = %event.order_id, "webhook amount disagrees with recorded payment");
            return Err(CareError::AmountMismatch {
                order_id: event.order_id.clone(),
                expected: payment.amount,
                reported: event.amount,
            });
        }
        if payment.status.rank() >= PaymentStatus::Paid.rank() {
            warn!(
                order = %event.order_id,
                status = %payment.status,
                "stale capture event ignored"
            );
            return Ok(());
        }

        let signature = payment_signature(&event.order_id, &event.payment_ref, &self.webhook_secret);
        payment.mark_paid(&event.payment_ref, signature);
        payment.events.push(event.payload());
        let payment = self.payments.update(payment).await?;
        self.mark_booking_paid(&payment, &event.payment_ref).await?;
        info!(order = %event.order_id, "payment captured via webhook");
        Ok(())
    }

    async fn apply_failed(&self, mut payment: Payment, event: &WebhookEvent) -> Result<()> {
        if payment.status.rank() >= PaymentStatus::Paid.rank() {
            // The gateway contradicting an already-verified payment is not
            // something to resolve automatically.
            return Err(CareError::StatusAnomaly {
                order_id: event.order_id.clone(),
                detail: format!(
                    "failure reported for a payment already {}",
                    payment.status
                ),
            });
        }
        if payment.status == PaymentStatus::Failed {
            warn!(order = %event.order_id, "duplicate failure event ignored");
            return Ok(());
        }

        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        payment.events.push(event.payload());
        self.payments.update(payment).await?;
        self.update_booking_if_present(&event.order_id, |b| {
            if b.payment.status == LocalPaymentStatus::Failed {
                return Ok(false);
            }
            b.payment.status = LocalPaymentStatus::Failed;
            Ok(true)
        })
        .await?;
        info!(order = %event.order_id, "payment marked failed via webhook");
        Ok(())
    }

    async fn apply_refunded(&self, mut payment: Payment, event: &WebhookEvent) -> Result<()> {
        if payment.status == PaymentStatus::Refunded {
            warn!(order = %event.order_id, "stale refund event ignored");
            return Ok(());
        }
        if payment.status.rank() < PaymentStatus::Paid.rank() {
            return Err(CareError::StatusAnomaly {
                order_id: event.order_id.clone(),
                detail: "refund reported for a payment never captured".to_string(),
            });
        }
        if payment.refunded_amount() + event.amount > payment.amount {
            return Err(CareError::AmountMismatch {
                order_id: event.order_id.clone(),
                expected: payment.amount,
                reported: event.amount,
            });
        }

        // Complete the matching pending refund if one exists, otherwise
        // record the gateway-initiated refund as-is.
        let pending = payment
            .refunds
            .iter_mut()
            .find(|r| r.status == RefundStatus::Pending && r.amount == event.amount);
        if let Some(refund) = pending {
            refund.status = RefundStatus::Completed;
            payment.status = if payment.refunded_amount() == payment.amount {
                PaymentStatus::Refunded
            } else {
                PaymentStatus::PartiallyRefunded
            };
            payment.updated_at = Utc::now();
        } else {
            payment.apply_refund(Refund {
                refund_id: event.event_id.clone(),
                amount: event.amount,
                reason: None,
                status: RefundStatus::Completed,
                issued_at: Utc::now(),
            })?;
        }
        payment.events.push(event.payload());
        let payment = self.payments.update(payment).await?;
        if payment.status == PaymentStatus::Refunded {
            self.settle_refunded_booking(&payment).await?;
        }
        info!(order = %event.order_id, "refund confirmed via webhook");
        Ok(())
    }

    /// Executes a refund against the gateway and reconciles both records.
    ///
    /// Defaults to the full remaining amount. A payment that is already
    /// refunded makes this a no-op; a concurrent refund loses the version
    /// race and gets `Conflict`.
    pub async fn process_refund(
        &self,
        order_id: &str,
        amount: Option<Decimal>,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<Payment> {
        let mut payment = self.get_payment(order_id).await?;
        let booking = self.get_booking(&payment.booking_id).await?;
        super::authorization::authorize(actor, BookingAction::Refund, &booking)?;

        if payment.status == PaymentStatus::Refunded {
            debug!(order = order_id, "payment already refunded; refund is a no-op");
            return Ok(payment);
        }
        if !matches!(
            payment.status,
            PaymentStatus::Paid | PaymentStatus::PartiallyRefunded
        ) {
            return Err(CareError::Validation(format!(
                "payment for order {order_id} is {} and cannot be refunded",
                payment.status
            )));
        }
        if !matches!(
            booking.status(),
            BookingStatus::Disputed | BookingStatus::Cancelled
        ) {
            return Err(CareError::Validation(format!(
                "booking {} is {} and not eligible for a refund",
                booking.id,
                booking.status()
            )));
        }

        let remaining = payment.amount - payment.refunded_amount();
        let amount = amount.unwrap_or(remaining);
        if amount <= Decimal::ZERO || amount > remaining {
            return Err(CareError::Validation(format!(
                "refund of {amount} is outside the remaining balance of {remaining}"
            )));
        }
        let payment_ref = payment.payment_ref.clone().ok_or_else(|| {
            CareError::Validation(format!("order {order_id} has no captured payment reference"))
        })?;

        let mut refund = Refund {
            refund_id: String::new(),
            amount,
            reason,
            status: RefundStatus::Pending,
            issued_at: Utc::now(),
        };
        refund.refund_id = self
            .bounded(self.gateway.issue_refund(&payment_ref, amount))
            .await?;
        refund.status = RefundStatus::Completed;

        payment.apply_refund(refund)?;
        let payment = self.payments.update(payment).await?;
        if payment.status == PaymentStatus::Refunded {
            self.settle_refunded_booking(&payment).await?;
        }

        info!(order = order_id, %amount, "refund completed");
        Ok(payment)
    }

    /// Drives the booking side of a fully refunded payment: a disputed
    /// booking moves to `REFUNDED`; a booking that is already terminal
    /// keeps its status and only records the refund.
    async fn settle_refunded_booking(&self, payment: &Payment) -> Result<()> {
        let total = payment.refunded_amount();
        self.update_booking(&payment.booking_id, |b| {
            if b.payment.status == LocalPaymentStatus::Refunded {
                return Ok(false);
            }
            match b.status() {
                BookingStatus::Disputed => b.refund(total)?,
                s if s.is_terminal() => b.record_refund(total)?,
                s => {
                    warn!(
                        booking = %b.id,
                        status = %s,
                        "full refund completed outside a dispute or cancellation"
                    );
                    b.payment.status = LocalPaymentStatus::Refunded;
                    b.refund_amount = Some(total);
                }
            }
            Ok(true)
        })
        .await?;
        Ok(())
    }

    async fn mark_booking_paid(&self, payment: &Payment, payment_ref: &str) -> Result<Booking> {
        let result = self
            .update_booking(&payment.booking_id, |b| {
                if b.payment.status == LocalPaymentStatus::Completed
                    && b.payment.payment_ref.as_deref() == Some(payment_ref)
                {
                    return Ok(false);
                }
                b.mark_paid(payment_ref)?;
                Ok(true)
            })
            .await;
        match result {
            Err(CareError::InvalidTransition { from, .. }) => Err(CareError::StatusAnomaly {
                order_id: payment.order_id.clone(),
                detail: format!("payment captured while booking was {from}"),
            }),
            other => other,
        }
    }

    /// Read-modify-write with a bounded retry on version races. The closure
    /// returns `Ok(false)` when the booking is already in the target state,
    /// which skips the write entirely.
    async fn update_booking<F>(&self, booking_id: &str, mut apply: F) -> Result<Booking>
    where
        F: FnMut(&mut Booking) -> Result<bool>,
    {
        let mut attempt = 0;
        loop {
            let mut booking = self.get_booking(booking_id).await?;
            if !apply(&mut booking)? {
                return Ok(booking);
            }
            match self.bookings.update(booking).await {
                Ok(stored) => return Ok(stored),
                Err(CareError::Conflict(_)) if attempt < MAX_CAS_RETRIES => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn update_booking_if_present<F>(&self, order_id: &str, apply: F) -> Result<()>
    where
        F: FnMut(&mut Booking) -> Result<bool>,
    {
        let payment = self.get_payment(order_id).await?;
        self.update_booking(&payment.booking_id, apply).await?;
        Ok(())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CareError::NotFound(format!("booking {booking_id}")))
    }

    async fn get_payment(&self, order_id: &str) -> Result<Payment> {
        self.payments
            .get(order_id)
            .await?
            .ok_or_else(|| CareError::NotFound(format!("order {order_id}")))
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CareError::GatewayTimeout),
        }
    }
}
