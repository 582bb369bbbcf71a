use crate::error::{CareError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the gateway confirmation signature: HMAC-SHA256 over
/// `"{order_id}|{payment_ref}"` keyed with the shared secret, hex-encoded.
pub fn payment_signature(order_id: &str, payment_ref: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_ref.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Gateway-side lifecycle of one payment attempt.
///
/// The numeric rank gives webhook processing its effective ordering: an
/// event may only ever move a payment to a strictly higher rank.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Failed,
    Paid,
    PartiallyRefunded,
    Refunded,
}

impl PaymentStatus {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Failed => 1,
            Self::Paid => 2,
            Self::PartiallyRefunded => 3,
            Self::Refunded => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Failed => "failed",
            Self::Paid => "paid",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Refund {
    pub refund_id: String,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub issued_at: DateTime<Utc>,
}

/// One gateway transaction attempt, tied to exactly one booking.
///
/// Keyed by the gateway order id; the payment reference and signature are
/// only known once the customer completes checkout.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub order_id: String,
    pub booking_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_ref: Option<String>,
    pub signature: Option<String>,
    pub refunds: Vec<Refund>,
    /// Raw webhook payloads, retained verbatim for audit and dispute work.
    pub events: Vec<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Payment {
    pub fn new(
        order_id: impl Into<String>,
        booking_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            booking_id: booking_id.into(),
            amount,
            currency: currency.into(),
            status: PaymentStatus::Created,
            payment_ref: None,
            signature: None,
            refunds: Vec::new(),
            events: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Sum of refunds already issued against this payment.
    pub fn refunded_amount(&self) -> Decimal {
        self.refunds.iter().map(|r| r.amount).sum()
    }

    pub fn mark_paid(&mut self, payment_ref: impl Into<String>, signature: impl Into<String>) {
        self.status = PaymentStatus::Paid;
        self.payment_ref = Some(payment_ref.into());
        self.signature = Some(signature.into());
        self.updated_at = Utc::now();
    }

    /// Applies a refund that the gateway has confirmed. Moves to
    /// `Refunded` when the cumulative refunded amount reaches the original
    /// amount, `PartiallyRefunded` otherwise.
    pub fn apply_refund(&mut self, refund: Refund) -> Result<()> {
        let cumulative = self.refunded_amount() + refund.amount;
        if cumulative > self.amount {
            return Err(CareError::Validation(format!(
                "refund of {} exceeds remaining balance on order {}",
                refund.amount, self.order_id
            )));
        }
        self.refunds.push(refund);
        self.status = if cumulative == self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Kind of lifecycle event the gateway reports.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum WebhookKind {
    #[serde(rename = "payment.captured")]
    Captured,
    #[serde(rename = "payment.failed")]
    Failed,
    #[serde(rename = "refund.processed")]
    Refunded,
}

impl WebhookKind {
    /// The payment status this event is trying to move the payment to.
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            Self::Captured => PaymentStatus::Paid,
            Self::Failed => PaymentStatus::Failed,
            Self::Refunded => PaymentStatus::Refunded,
        }
    }
}

/// An asynchronous notification from the payment provider. Delivery may be
/// duplicated or out of order; `event_id` is the dedup key.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct WebhookEvent {
    pub event_id: String,
    pub kind: WebhookKind,
    pub order_id: String,
    pub payment_ref: String,
    pub amount: Decimal,
}

impl WebhookEvent {
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
