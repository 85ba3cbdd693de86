//! Outbound payment-confirmation boundary.
//!
//! Delivery is fire-and-forget: the engine invokes the notifier on a
//! detached task after a successful commit, and a delivery failure is
//! logged, never surfaced as a failure of the ledger operation.

use async_trait::async_trait;

use crate::models::{Client, Invoice, Payment};

#[async_trait]
pub trait PaymentNotifier: Send + Sync + 'static {
    async fn send_payment_confirmation(
        &self,
        invoice: &Invoice,
        client: &Client,
        payment: &Payment,
    ) -> Result<(), anyhow::Error>;
}

/// Default notifier that delivers nothing.
pub struct NoopNotifier;

#[async_trait]
impl PaymentNotifier for NoopNotifier {
    async fn send_payment_confirmation(
        &self,
        _invoice: &Invoice,
        _client: &Client,
        _payment: &Payment,
    ) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
