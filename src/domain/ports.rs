use super::booking::Booking;
use super::incident::Incident;
use super::payment::Payment;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Persistence port for bookings.
///
/// `update` is a check-and-set: the write only succeeds when the stored
/// version matches the entity's `version`, and the stored copy comes back
/// with the version bumped. A lost race is `CareError::Conflict`.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: Booking) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Booking>>;
    async fn update(&self, booking: Booking) -> Result<Booking>;
    async fn all(&self) -> Result<Vec<Booking>>;
    async fn by_customer(&self, customer_id: &str) -> Result<Vec<Booking>>;
    async fn by_organization(&self, organization_id: &str) -> Result<Vec<Booking>>;
}

/// Persistence port for payments, keyed by gateway order id.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, order_id: &str) -> Result<Option<Payment>>;
    async fn update(&self, payment: Payment) -> Result<Payment>;
    /// The payment in a non-terminal status for this booking, if any.
    /// The at-most-one-active invariant makes this unambiguous.
    async fn active_for_booking(&self, booking_id: &str) -> Result<Option<Payment>>;
    /// Whether this gateway event id has already been applied.
    async fn event_seen(&self, event_id: &str) -> Result<bool>;
    /// Records an applied gateway event id for deduplication.
    async fn mark_event(&self, event_id: &str) -> Result<()>;
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert(&self, incident: Incident) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Incident>>;
    async fn update(&self, incident: Incident) -> Result<Incident>;
    async fn by_booking(&self, booking_id: &str) -> Result<Vec<Incident>>;
}

/// Boundary to the external payment provider. Calls are made under a
/// bounded timeout by the reconciliation engine; implementations only have
/// to report success or unavailability.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a provider-side order and returns its id.
    async fn create_order(&self, amount: Decimal, currency: &str) -> Result<String>;
    /// Requests a (possibly partial) refund and returns the refund id.
    async fn issue_refund(&self, payment_ref: &str, amount: Decimal) -> Result<String>;
}

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type IncidentStoreRef = Arc<dyn IncidentStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
