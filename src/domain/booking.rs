use crate::error::{CareError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a positive monetary amount.
///
/// Wrapper around `rust_decimal::Decimal` so that rates and refund amounts
/// can never be constructed zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(CareError::Validation("amount must be positive".to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = CareError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Lifecycle states of a booking, in forward order, with the terminal and
/// dispute branches at the end.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    AwaitingPayment,
    PaidPendingAdmin,
    ForwardedToOrg,
    OrgAccepted,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
    Refunded,
}

impl BookingStatus {
    /// Terminal states admit no further transitions, with the single
    /// exception of disputing a completed booking.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingPayment => "AWAITING_PAYMENT",
            Self::PaidPendingAdmin => "PAID_PENDING_ADMIN",
            Self::ForwardedToOrg => "FORWARDED_TO_ORG",
            Self::OrgAccepted => "ORG_ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Disputed => "DISPUTED",
            Self::Refunded => "REFUNDED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    MarkPaid,
    Forward,
    OrgAccept,
    OrgReject,
    Start,
    Complete,
    Cancel,
    Dispute,
    Refund,
}

impl std::fmt::Display for BookingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MarkPaid => "mark paid",
            Self::Forward => "forward to organization",
            Self::OrgAccept => "accept",
            Self::OrgReject => "reject",
            Self::Start => "start service",
            Self::Complete => "complete service",
            Self::Cancel => "cancel",
            Self::Dispute => "dispute",
            Self::Refund => "refund",
        };
        f.write_str(name)
    }
}

/// The transition table. Everything not listed here is illegal and leaves
/// the booking untouched.
pub fn next_status(from: BookingStatus, action: BookingAction) -> Result<BookingStatus> {
    use BookingAction as A;
    use BookingStatus as S;

    let next = match (from, action) {
        (S::AwaitingPayment, A::MarkPaid) => S::PaidPendingAdmin,
        (S::PaidPendingAdmin, A::Forward) => S::ForwardedToOrg,
        (S::ForwardedToOrg, A::OrgAccept) => S::OrgAccepted,
        (S::ForwardedToOrg, A::OrgReject) => S::Cancelled,
        (S::OrgAccepted, A::Start) => S::InProgress,
        (S::InProgress, A::Complete) => S::Completed,
        (
            S::AwaitingPayment | S::PaidPendingAdmin | S::ForwardedToOrg | S::OrgAccepted,
            A::Cancel,
        ) => S::Cancelled,
        (S::InProgress | S::Completed, A::Dispute) => S::Disputed,
        (S::Disputed, A::Refund) => S::Refunded,
        _ => return Err(CareError::InvalidTransition { from, action }),
    };
    Ok(next)
}

/// Local view of the payment attached to a booking, kept in sync with the
/// most recent `Payment` record by the reconciliation engine.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocalPaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl std::fmt::Display for LocalPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct PaymentLink {
    pub order_id: Option<String>,
    pub payment_ref: Option<String>,
    pub status: LocalPaymentStatus,
}

/// When the engagement takes place. Dates are inclusive; the time-of-day
/// window applies to every day in the range.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Schedule {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_hours: u32,
}

impl Schedule {
    pub fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(CareError::Validation(
                "end date precedes start date".to_string(),
            ));
        }
        if self.duration_hours == 0 {
            return Err(CareError::Validation(
                "duration must be at least one hour".to_string(),
            ));
        }
        let window = (self.end_time - self.start_time).num_minutes();
        if window <= 0 {
            return Err(CareError::Validation(
                "end time must be after start time".to_string(),
            ));
        }
        let days = (self.end_date - self.start_date).num_days() + 1;
        if days * window != i64::from(self.duration_hours) * 60 {
            return Err(CareError::Validation(format!(
                "declared duration of {}h does not match the scheduled span",
                self.duration_hours
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Pricing {
    pub hourly_rate: Amount,
    pub total_amount: Decimal,
    pub currency: String,
}

/// Creation parameters, as received from the customer-facing handler.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: String,
    pub customer_id: String,
    pub caregiver_id: String,
    pub organization_id: String,
    pub schedule: Schedule,
    pub hourly_rate: Amount,
    pub currency: String,
}

/// One scheduled care engagement between a customer and a caregiver under
/// an organization. Aggregate root: payments and incidents reference it but
/// are persisted independently.
///
/// `status` is private: every change goes through a validated transition
/// method, and persistence is guarded by the `version` check-and-set token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub caregiver_id: String,
    pub organization_id: String,
    pub schedule: Schedule,
    pub pricing: Pricing,
    status: BookingStatus,
    pub payment: PaymentLink,
    pre_dispute_status: Option<BookingStatus>,
    pub admin_notes: Option<String>,
    pub org_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Booking {
    pub fn new(params: NewBooking) -> Result<Self> {
        params.schedule.validate()?;
        let total_amount =
            params.hourly_rate.value() * Decimal::from(params.schedule.duration_hours);
        Ok(Self {
            id: params.id,
            customer_id: params.customer_id,
            caregiver_id: params.caregiver_id,
            organization_id: params.organization_id,
            schedule: params.schedule,
            pricing: Pricing {
                hourly_rate: params.hourly_rate,
                total_amount,
                currency: params.currency,
            },
            status: BookingStatus::AwaitingPayment,
            payment: PaymentLink::default(),
            pre_dispute_status: None,
            admin_notes: None,
            org_notes: None,
            cancellation_reason: None,
            refund_amount: None,
            created_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
            version: 0,
        })
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn pre_dispute_status(&self) -> Option<BookingStatus> {
        self.pre_dispute_status
    }

    /// Links a freshly created gateway order. Only meaningful while the
    /// booking still awaits payment.
    pub fn attach_order(&mut self, order_id: impl Into<String>) -> Result<()> {
        if self.status != BookingStatus::AwaitingPayment {
            return Err(CareError::InvalidTransition {
                from: self.status,
                action: BookingAction::MarkPaid,
            });
        }
        self.payment.order_id = Some(order_id.into());
        Ok(())
    }

    /// Driven by the reconciliation engine after a verified confirmation.
    pub fn mark_paid(&mut self, payment_ref: impl Into<String>) -> Result<()> {
        self.status = next_status(self.status, BookingAction::MarkPaid)?;
        self.payment.payment_ref = Some(payment_ref.into());
        self.payment.status = LocalPaymentStatus::Completed;
        Ok(())
    }

    pub fn forward(&mut self, admin_notes: impl Into<String>) -> Result<()> {
        self.status = next_status(self.status, BookingAction::Forward)?;
        self.admin_notes = Some(admin_notes.into());
        Ok(())
    }

    pub fn org_accept(&mut self, org_notes: impl Into<String>) -> Result<()> {
        self.status = next_status(self.status, BookingAction::OrgAccept)?;
        self.org_notes = Some(org_notes.into());
        Ok(())
    }

    pub fn org_reject(&mut self, reason: impl Into<String>) -> Result<()> {
        self.status = next_status(self.status, BookingAction::OrgReject)?;
        self.cancellation_reason = Some(reason.into());
        self.cancelled_at = Some(Utc::now());
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.status = next_status(self.status, BookingAction::Start)?;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.status = next_status(self.status, BookingAction::Complete)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<()> {
        self.status = next_status(self.status, BookingAction::Cancel)?;
        self.cancellation_reason = Some(reason.into());
        self.cancelled_at = Some(Utc::now());
        Ok(())
    }

    /// Moves into `DISPUTED`, remembering where the booking came from so a
    /// non-refund resolution can put it back.
    pub fn dispute(&mut self) -> Result<()> {
        let from = self.status;
        self.status = next_status(self.status, BookingAction::Dispute)?;
        self.pre_dispute_status = Some(from);
        Ok(())
    }

    /// Refund resolution of a disputed booking.
    pub fn refund(&mut self, amount: Decimal) -> Result<()> {
        self.status = next_status(self.status, BookingAction::Refund)?;
        self.refund_amount = Some(amount);
        self.payment.status = LocalPaymentStatus::Refunded;
        self.pre_dispute_status = None;
        Ok(())
    }

    /// Records a completed refund on a booking that is already terminal
    /// (e.g. cancelled after payment). The status is left where it is.
    pub fn record_refund(&mut self, amount: Decimal) -> Result<()> {
        if !self.status.is_terminal() {
            return Err(CareError::InvalidTransition {
                from: self.status,
                action: BookingAction::Refund,
            });
        }
        self.refund_amount = Some(amount);
        self.payment.status = LocalPaymentStatus::Refunded;
        Ok(())
    }

    /// Non-refund dispute resolution: restore the pre-dispute status.
    pub fn reinstate(&mut self) -> Result<()> {
        if self.status != BookingStatus::Disputed {
            return Err(CareError::InvalidTransition {
                from: self.status,
                action: BookingAction::Dispute,
            });
        }
        let Some(previous) = self.pre_dispute_status.take() else {
            return Err(CareError::Validation(
                "disputed booking has no recorded pre-dispute status".to_string(),
            ));
        };
        self.status = previous;
        Ok(())
    }

    /// Non-refund dispute resolution: close the booking as cancelled.
    pub fn close_dispute_cancelled(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status != BookingStatus::Disputed {
            return Err(CareError::InvalidTransition {
                from: self.status,
                action: BookingAction::Cancel,
            });
        }
        self.status = BookingStatus::Cancelled;
        self.cancellation_reason = Some(reason.into());
        self.cancelled_at = Some(Utc::now());
        self.pre_dispute_status = None;
        Ok(())
    }
}
