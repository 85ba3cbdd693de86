//! reconciliation-core: invoice/payment reconciliation and client risk
//! rollup.
//!
//! The engine applies payments against invoices, transitions their
//! financial status, reverses payments symmetrically, and maintains a
//! denormalized per-client aggregate with a payment reliability score.
//! Persistence is behind the [`store::LedgerStore`] trait; an in-memory
//! reference store ships with the crate.

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::LedgerError;
pub use services::{PaymentApplied, PaymentReversed, ReconciliationService, RetryConfig};
