use crate::domain::ports::PaymentGateway;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// A provider stand-in with deterministic, sequential ids.
///
/// Used by the replay binary and the test suite; order ids come out as
/// `order_000001`, `order_000002`, ... so journal files can reference them.
/// An optional artificial latency makes timeout behavior testable.
#[derive(Default)]
pub struct SandboxGateway {
    counter: AtomicU64,
    latency: Option<Duration>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            counter: AtomicU64::new(0),
            latency: Some(latency),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_order(&self, amount: Decimal, currency: &str) -> Result<String> {
        self.simulate_latency().await;
        let order_id = format!("order_{:06}", self.next());
        debug!(order = %order_id, %amount, currency, "sandbox order created");
        Ok(order_id)
    }

    async fn issue_refund(&self, payment_ref: &str, amount: Decimal) -> Result<String> {
        self.simulate_latency().await;
        let refund_id = format!("rfnd_{:06}", self.next());
        debug!(refund = %refund_id, payment = payment_ref, %amount, "sandbox refund issued");
        Ok(refund_id)
    }
}
