use crate::domain::actor::Role;
use crate::domain::booking::{BookingAction, BookingStatus};
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CareError>;

#[derive(Error, Debug)]
pub enum CareError {
    /// The requested move is illegal from the booking's current status.
    #[error("invalid transition: cannot {action} a booking in {from}")]
    InvalidTransition {
        from: BookingStatus,
        action: BookingAction,
    },
    /// The caller's role or ownership does not match the operation.
    #[error("unauthorized: {role} may not {action}")]
    Unauthorized { role: Role, action: String },
    /// A non-terminal payment already exists for this booking.
    #[error("payment {0} already in progress for this booking")]
    AlreadyInProgress(String),
    /// The submitted signature does not match the recomputed one.
    #[error("payment signature mismatch for order {0}")]
    SignatureMismatch(String),
    /// A webhook reported an amount that disagrees with the recorded payment.
    #[error("amount mismatch for order {order_id}: recorded {expected}, reported {reported}")]
    AmountMismatch {
        order_id: String,
        expected: Decimal,
        reported: Decimal,
    },
    /// A gateway notification contradicts local state in a way that needs
    /// an admin to look at it before anything is applied.
    #[error("order {order_id} flagged for manual review: {detail}")]
    StatusAnomaly { order_id: String, detail: String },
    #[error("payment gateway timed out")]
    GatewayTimeout,
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    /// A concurrent mutation won the race; retry with fresh state.
    #[error("conflict: {0} was modified concurrently")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CareError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Internal(Box::new(e))
    }
}

impl CareError {
    /// Transient errors are safe to retry with the same idempotency key.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GatewayTimeout | Self::GatewayUnavailable(_) | Self::Conflict(_)
        )
    }
}
