use crate::domain::booking::Booking;
use crate::domain::incident::Incident;
use crate::domain::payment::Payment;
use crate::domain::ports::{BookingStore, IncidentStore, PaymentStore};
use crate::error::{CareError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for bookings.
///
/// Writes go through a version check-and-set: `update` only succeeds when
/// the caller saw the latest version, so two racing transition attempts
/// cannot both win. Ideal for tests and for the journal replay binary.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<String, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(CareError::Conflict(format!("booking {}", booking.id)));
        }
        bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(id).cloned())
    }

    async fn update(&self, mut booking: Booking) -> Result<Booking> {
        let mut bookings = self.bookings.write().await;
        let stored = bookings
            .get(&booking.id)
            .ok_or_else(|| CareError::NotFound(format!("booking {}", booking.id)))?;
        if stored.version != booking.version {
            return Err(CareError::Conflict(format!("booking {}", booking.id)));
        }
        booking.version += 1;
        bookings.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.values().cloned().collect())
    }

    async fn by_customer(&self, customer_id: &str) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn by_organization(&self, organization_id: &str) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| b.organization_id == organization_id)
            .cloned()
            .collect())
    }
}

/// A thread-safe in-memory store for payments, keyed by gateway order id,
/// with the applied-webhook-event set used for deduplication.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<String, Payment>>>,
    seen_events: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.order_id) {
            return Err(CareError::Conflict(format!("order {}", payment.order_id)));
        }
        payments.insert(payment.order_id.clone(), payment);
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(order_id).cloned())
    }

    async fn update(&self, mut payment: Payment) -> Result<Payment> {
        let mut payments = self.payments.write().await;
        let stored = payments
            .get(&payment.order_id)
            .ok_or_else(|| CareError::NotFound(format!("order {}", payment.order_id)))?;
        if stored.version != payment.version {
            return Err(CareError::Conflict(format!("order {}", payment.order_id)));
        }
        payment.version += 1;
        payments.insert(payment.order_id.clone(), payment.clone());
        Ok(payment)
    }

    async fn active_for_booking(&self, booking_id: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| p.booking_id == booking_id && !p.status.is_terminal())
            .cloned())
    }

    async fn event_seen(&self, event_id: &str) -> Result<bool> {
        let seen = self.seen_events.read().await;
        Ok(seen.contains(event_id))
    }

    async fn mark_event(&self, event_id: &str) -> Result<()> {
        let mut seen = self.seen_events.write().await;
        seen.insert(event_id.to_string());
        Ok(())
    }
}

/// A thread-safe in-memory store for incidents.
#[derive(Default, Clone)]
pub struct InMemoryIncidentStore {
    incidents: Arc<RwLock<HashMap<String, Incident>>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn insert(&self, incident: Incident) -> Result<()> {
        let mut incidents = self.incidents.write().await;
        if incidents.contains_key(&incident.id) {
            return Err(CareError::Conflict(format!("incident {}", incident.id)));
        }
        incidents.insert(incident.id.clone(), incident);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Incident>> {
        let incidents = self.incidents.read().await;
        Ok(incidents.get(id).cloned())
    }

    async fn update(&self, mut incident: Incident) -> Result<Incident> {
        let mut incidents = self.incidents.write().await;
        let stored = incidents
            .get(&incident.id)
            .ok_or_else(|| CareError::NotFound(format!("incident {}", incident.id)))?;
        if stored.version != incident.version {
            return Err(CareError::Conflict(format!("incident {}", incident.id)));
        }
        incident.version += 1;
        incidents.insert(incident.id.clone(), incident.clone());
        Ok(incident)
    }

    async fn by_booking(&self, booking_id: &str) -> Result<Vec<Incident>> {
        let incidents = self.incidents.read().await;
        Ok(incidents
            .values()
            .filter(|i| i.booking_id == booking_id)
            .cloned()
            .collect())
    }
}
