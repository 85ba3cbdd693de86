//! In-memory reference implementation of the ledger store.
//!
//! One `RwLock` over the whole state gives the commit path the same
//! all-or-nothing, check-then-apply semantics a transactional document store
//! provides. Suitable for tests and embedded use.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Client, Invoice, Payment};

use super::{DocKey, DocVersion, DocWrite, LedgerStore, LedgerTxn, StoreError, Versioned};

#[derive(Default)]
struct State {
    invoices: HashMap<Uuid, (Invoice, DocVersion)>,
    payments: HashMap<Uuid, (Payment, DocVersion)>,
    clients: HashMap<Uuid, (Client, DocVersion)>,
}

impl State {
    fn version_of(&self, key: DocKey) -> DocVersion {
        match key {
            DocKey::Invoice(id) => self.invoices.get(&id).map_or(0, |(_, v)| *v),
            DocKey::Payment(id) => self.payments.get(&id).map_or(0, |(_, v)| *v),
            DocKey::Client(id) => self.clients.get(&id).map_or(0, |(_, v)| *v),
        }
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Versioned<Invoice>>, StoreError> {
        let state = self.state.read().await;
        Ok(state.invoices.get(&invoice_id).map(|(doc, version)| Versioned {
            doc: doc.clone(),
            version: *version,
        }))
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Versioned<Payment>>, StoreError> {
        let state = self.state.read().await;
        Ok(state.payments.get(&payment_id).map(|(doc, version)| Versioned {
            doc: doc.clone(),
            version: *version,
        }))
    }

    async fn get_client(&self, client_id: Uuid) -> Result<Option<Versioned<Client>>, StoreError> {
        let state = self.state.read().await;
        Ok(state.clients.get(&client_id).map(|(doc, version)| Versioned {
            doc: doc.clone(),
            version: *version,
        }))
    }

    async fn list_invoices_for_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Invoice>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .invoices
            .values()
            .filter(|(inv, _)| inv.owner_id == owner_id && inv.client_id == client_id)
            .map(|(inv, _)| inv.clone())
            .collect())
    }

    async fn list_payments_for_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Payment>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|(p, _)| p.owner_id == owner_id && p.client_id == client_id)
            .map(|(p, _)| p.clone())
            .collect())
    }

    async fn commit(&self, txn: LedgerTxn) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        for &(key, expected) in txn.preconditions() {
            let current = state.version_of(key);
            if current != expected {
                return Err(StoreError::VersionConflict(key));
            }
        }

        for write in txn.writes() {
            match write {
                DocWrite::PutInvoice(invoice) => {
                    let entry = state
                        .invoices
                        .entry(invoice.invoice_id)
                        .or_insert_with(|| (invoice.clone(), 0));
                    entry.0 = invoice.clone();
                    entry.1 += 1;
                }
                DocWrite::PutPayment(payment) => {
                    let entry = state
                        .payments
                        .entry(payment.payment_id)
                        .or_insert_with(|| (payment.clone(), 0));
                    entry.0 = payment.clone();
                    entry.1 += 1;
                }
                DocWrite::PutClient(client) => {
                    let entry = state
                        .clients
                        .entry(client.client_id)
                        .or_insert_with(|| (client.clone(), 0));
                    entry.0 = client.clone();
                    entry.1 += 1;
                }
                DocWrite::DeleteInvoice(id) => {
                    state.invoices.remove(id);
                }
                DocWrite::DeletePayment(id) => {
                    state.payments.remove(id);
                }
            }
        }

        Ok(())
    }
}
