use crate::domain::booking::Booking;
use crate::domain::incident::Incident;
use crate::domain::payment::Payment;
use crate::domain::ports::{BookingStore, IncidentStore, PaymentStore};
use crate::error::{CareError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for booking aggregates.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family for payments, keyed by gateway order id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for incidents.
pub const CF_INCIDENTS: &str = "incidents";
/// Column Family recording applied webhook event ids.
pub const CF_EVENTS: &str = "webhook_events";

/// A persistent store implementation using RocksDB.
///
/// One database carries all three entity kinds in separate Column Families
/// plus the webhook dedup set, so a replay run can resume where the last
/// one stopped. Version check-and-set updates are serialized through a
/// single write lock.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_BOOKINGS, CF_PAYMENTS, CF_INCIDENTS, CF_EVENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("column family {name} not found")))
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| internal(format!("serialization error: {e}")))?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| internal(format!("deserialization error: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, bytes) = item.map_err(|e| internal(format!("iteration error: {e}")))?;
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| internal(format!("deserialization error: {e}")))?;
            values.push(value);
        }
        Ok(values)
    }
}

fn internal(message: String) -> CareError {
    CareError::Internal(Box::new(std::io::Error::other(message)))
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .get_json::<Booking>(CF_BOOKINGS, &booking.id)?
            .is_some()
        {
            return Err(CareError::Conflict(format!("booking {}", booking.id)));
        }
        self.put_json(CF_BOOKINGS, &booking.id, &booking)
    }

    async fn get(&self, id: &str) -> Result<Option<Booking>> {
        self.get_json(CF_BOOKINGS, id)
    }

    async fn update(&self, mut booking: Booking) -> Result<Booking> {
        let _guard = self.write_lock.lock().await;
        let stored: Booking = self
            .get_json(CF_BOOKINGS, &booking.id)?
            .ok_or_else(|| CareError::NotFound(format!("booking {}", booking.id)))?;
        if stored.version != booking.version {
            return Err(CareError::Conflict(format!("booking {}", booking.id)));
        }
        booking.version += 1;
        self.put_json(CF_BOOKINGS, &booking.id, &booking)?;
        Ok(booking)
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        self.scan(CF_BOOKINGS)
    }

    async fn by_customer(&self, customer_id: &str) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        bookings.retain(|b| b.customer_id == customer_id);
        Ok(bookings)
    }

    async fn by_organization(&self, organization_id: &str) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        bookings.retain(|b| b.organization_id == organization_id);
        Ok(bookings)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .get_json::<Payment>(CF_PAYMENTS, &payment.order_id)?
            .is_some()
        {
            return Err(CareError::Conflict(format!("order {}", payment.order_id)));
        }
        self.put_json(CF_PAYMENTS, &payment.order_id, &payment)
    }

    async fn get(&self, order_id: &str) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, order_id)
    }

    async fn update(&self, mut payment: Payment) -> Result<Payment> {
        let _guard = self.write_lock.lock().await;
        let stored: Payment = self
            .get_json(CF_PAYMENTS, &payment.order_id)?
            .ok_or_else(|| CareError::NotFound(format!("order {}", payment.order_id)))?;
        if stored.version != payment.version {
            return Err(CareError::Conflict(format!("order {}", payment.order_id)));
        }
        payment.version += 1;
        self.put_json(CF_PAYMENTS, &payment.order_id, &payment)?;
        Ok(payment)
    }

    async fn active_for_booking(&self, booking_id: &str) -> Result<Option<Payment>> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(payments
            .into_iter()
            .find(|p| p.booking_id == booking_id && !p.status.is_terminal()))
    }

    async fn event_seen(&self, event_id: &str) -> Result<bool> {
        let cf = self.cf(CF_EVENTS)?;
        // Key presence is all that matters here.
        Ok(self.db.get_pinned_cf(cf, event_id.as_bytes())?.is_some())
    }

    async fn mark_event(&self, event_id: &str) -> Result<()> {
        let cf = self.cf(CF_EVENTS)?;
        self.db.put_cf(cf, event_id.as_bytes(), b"")?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for RocksDBStore {
    async fn insert(&self, incident: Incident) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .get_json::<Incident>(CF_INCIDENTS, &incident.id)?
            .is_some()
        {
            return Err(CareError::Conflict(format!("incident {}", incident.id)));
        }
        self.put_json(CF_INCIDENTS, &incident.id, &incident)
    }

    async fn get(&self, id: &str) -> Result<Option<Incident>> {
        self.get_json(CF_INCIDENTS, id)
    }

    async fn update(&self, mut incident: Incident) -> Result<Incident> {
        let _guard = self.write_lock.lock().await;
        let stored: Incident = self
            .get_json(CF_INCIDENTS, &incident.id)?
            .ok_or_else(|| CareError::NotFound(format!("incident {}", incident.id)))?;
        if stored.version != incident.version {
            return Err(CareError::Conflict(format!("incident {}", incident.id)));
        }
        incident.version += 1;
        self.put_json(CF_INCIDENTS, &incident.id, &incident)?;
        Ok(incident)
    }

    async fn by_booking(&self, booking_id: &str) -> Result<Vec<Incident>> {
        let mut incidents: Vec<Incident> = self.scan(CF_INCIDENTS)?;
        incidents.retain(|i| i.booking_id == booking_id);
        Ok(incidents)
    }
}
