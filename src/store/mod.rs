//! Ledger store contract.
//!
//! The engine is store-agnostic: it reads versioned documents, computes the
//! full post-state, and submits one atomic [`LedgerTxn`] whose version
//! preconditions make concurrent read-modify-write cycles safe. A commit
//! either applies every write or none of them.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Client, Invoice, Payment};

/// Monotonic per-document version, bumped on every write. Version 0 means
/// "document does not exist" in preconditions.
pub type DocVersion = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKey {
    Invoice(Uuid),
    Payment(Uuid),
    Client(Uuid),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A precondition version no longer matches; the caller should re-read
    /// and retry its unit of work.
    #[error("version conflict on {0:?}")]
    VersionConflict(DocKey),

    #[error("store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

/// A document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub doc: T,
    pub version: DocVersion,
}

#[derive(Debug, Clone)]
pub enum DocWrite {
    PutInvoice(Invoice),
    PutPayment(Payment),
    PutClient(Client),
    DeleteInvoice(Uuid),
    DeletePayment(Uuid),
}

/// An atomic multi-document transaction: all writes apply only if every
/// precondition still holds.
#[derive(Debug, Clone, Default)]
pub struct LedgerTxn {
    preconditions: Vec<(DocKey, DocVersion)>,
    writes: Vec<DocWrite>,
}

impl LedgerTxn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to still be at `version` at commit time. Version 0
    /// requires the document to not exist.
    pub fn expect(mut self, key: DocKey, version: DocVersion) -> Self {
        self.preconditions.push((key, version));
        self
    }

    pub fn write(mut self, write: DocWrite) -> Self {
        self.writes.push(write);
        self
    }

    pub fn preconditions(&self) -> &[(DocKey, DocVersion)] {
        &self.preconditions
    }

    pub fn writes(&self) -> &[DocWrite] {
        &self.writes
    }
}

/// Durable records for invoices, payments and clients.
///
/// Reads are unscoped by owner; ownership checks happen in the engine so it
/// can distinguish `NotFound` from `Forbidden`.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Versioned<Invoice>>, StoreError>;

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Versioned<Payment>>, StoreError>;

    async fn get_client(&self, client_id: Uuid) -> Result<Option<Versioned<Client>>, StoreError>;

    /// All invoices of one client, for aggregate rebuilds.
    async fn list_invoices_for_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Invoice>, StoreError>;

    /// All payments of one client, for reversal bookkeeping and rebuilds.
    async fn list_payments_for_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Payment>, StoreError>;

    /// Atomically apply a transaction, or fail it without any effect.
    async fn commit(&self, txn: LedgerTxn) -> Result<(), StoreError>;
}
