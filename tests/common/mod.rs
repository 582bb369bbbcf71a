#![allow(dead_code)]

use carebook::application::engine::BookingEngine;
use carebook::application::incidents::IncidentResolver;
use carebook::application::reconciliation::PaymentReconciliation;
use carebook::domain::booking::{Amount, NewBooking, Schedule};
use carebook::domain::payment::payment_signature;
use carebook::domain::ports::{
    BookingStoreRef, IncidentStoreRef, PaymentGatewayRef, PaymentStoreRef,
};
use carebook::infrastructure::gateway::SandboxGateway;
use carebook::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryIncidentStore, InMemoryPaymentStore,
};
use carebook::interfaces::csv::command_reader::JOURNAL_HEADER;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;

/// The binary's default shared secret; journal signatures are computed
/// against it.
pub const SECRET: &str = "sandbox-secret";

pub fn sig(order_id: &str, payment_ref: &str) -> String {
    payment_signature(order_id, payment_ref, SECRET)
}

/// Builds a full-width journal record from (column, value) pairs.
pub fn record(values: &[(&str, &str)]) -> Vec<String> {
    JOURNAL_HEADER
        .iter()
        .map(|col| {
            values
                .iter()
                .find(|(c, _)| c == col)
                .map(|(_, v)| v.to_string())
                .unwrap_or_default()
        })
        .collect()
}

pub fn write_journal(path: &Path, rows: &[Vec<String>]) {
    let mut wtr = csv::Writer::from_path(path).unwrap();
    wtr.write_record(JOURNAL_HEADER).unwrap();
    for row in rows {
        wtr.write_record(row).unwrap();
    }
    wtr.flush().unwrap();
}

/// A standard single-day booking: 8 hours at 250/h, total 2000 INR.
pub fn create_row(booking: &str) -> Vec<String> {
    record(&[
        ("action", "create"),
        ("role", "customer"),
        ("actor", "alice"),
        ("booking", booking),
        ("customer", "alice"),
        ("caregiver", "cg-7"),
        ("org", "org-1"),
        ("start_date", "2026-03-01"),
        ("end_date", "2026-03-01"),
        ("start_time", "09:00:00"),
        ("end_time", "17:00:00"),
        ("hours", "8"),
        ("rate", "250"),
        ("currency", "INR"),
    ])
}

/// Everything wired together over in-memory stores and the sandbox
/// gateway, for library-level integration tests.
pub struct TestServices {
    pub engine: BookingEngine,
    pub reconciliation: PaymentReconciliation,
    pub resolver: IncidentResolver,
    pub bookings: BookingStoreRef,
    pub payments: PaymentStoreRef,
}

pub fn services() -> TestServices {
    let bookings: BookingStoreRef = Arc::new(InMemoryBookingStore::new());
    let payments: PaymentStoreRef = Arc::new(InMemoryPaymentStore::new());
    let incidents: IncidentStoreRef = Arc::new(InMemoryIncidentStore::new());
    let gateway: PaymentGatewayRef = Arc::new(SandboxGateway::new());
    let reconciliation =
        PaymentReconciliation::new(bookings.clone(), payments.clone(), gateway, SECRET);
    let engine = BookingEngine::new(bookings.clone(), payments.clone(), reconciliation.clone());
    let resolver = IncidentResolver::new(incidents, bookings.clone(), reconciliation.clone());
    TestServices {
        engine,
        reconciliation,
        resolver,
        bookings,
        payments,
    }
}

pub fn booking_params(id: &str) -> NewBooking {
    let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    NewBooking {
        id: id.into(),
        customer_id: "alice".into(),
        caregiver_id: "cg-7".into(),
        organization_id: "org-1".into(),
        schedule: Schedule {
            start_date: date,
            end_date: date,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            duration_hours: 8,
        },
        hourly_rate: Amount::new(dec!(250)).unwrap(),
        currency: "INR".into(),
    }
}
