//! Services: the reconciliation engine and its supporting pieces.

pub mod invoicing;
pub mod metrics;
pub mod notification;
pub mod reconciliation;
pub mod retry;
pub mod rollup;

use std::sync::Arc;

use crate::store::LedgerStore;

pub use reconciliation::{PaymentApplied, PaymentReversed};
pub use retry::RetryConfig;

use notification::{NoopNotifier, PaymentNotifier};

/// The reconciliation service: invoice/client lifecycle plus payment
/// application and reversal over a [`LedgerStore`].
pub struct ReconciliationService<S: LedgerStore> {
    store: Arc<S>,
    notifier: Arc<dyn PaymentNotifier>,
    retry: RetryConfig,
}

impl<S: LedgerStore> ReconciliationService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn PaymentNotifier>, retry: RetryConfig) -> Self {
        Self {
            store,
            notifier,
            retry,
        }
    }

    /// Construct without a notification sink.
    pub fn without_notifier(store: Arc<S>, retry: RetryConfig) -> Self {
        Self::new(store, Arc::new(NoopNotifier), retry)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn PaymentNotifier> {
        &self.notifier
    }

    pub(crate) fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

impl<S: LedgerStore> Clone for ReconciliationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            retry: self.retry.clone(),
        }
    }
}
