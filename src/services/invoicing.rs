//! Invoice and client lifecycle: creation, line-item edits, send/delete.
//!
//! All mutations here go through the same atomic commit path as the payment
//! engine, so the client aggregate can never drift from the invoice set on
//! a half-applied operation.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{
    Client, CreateInvoice, CreateLineItem, Invoice, InvoiceStatus, LineItem, Money, Payment,
    UpdateInvoice,
};
use crate::store::{DocKey, DocWrite, LedgerStore, LedgerTxn, Versioned};

use super::metrics::COMMIT_DURATION;
use super::reconciliation::record_error;
use super::retry::retry_on_conflict;
use super::rollup;
use super::ReconciliationService;

fn validate_line_items(items: &[CreateLineItem]) -> Result<(), LedgerError> {
    if items.is_empty() {
        return Err(LedgerError::ValidationError(
            "invoice requires at least one line item".to_string(),
        ));
    }
    for item in items {
        if item.quantity < 1 {
            return Err(LedgerError::ValidationError(format!(
                "line item '{}' must have quantity of at least 1",
                item.description
            )));
        }
        if item.rate.is_negative() {
            return Err(LedgerError::ValidationError(format!(
                "line item '{}' must have a non-negative rate",
                item.description
            )));
        }
    }
    Ok(())
}

fn to_line_items(items: &[CreateLineItem]) -> Vec<LineItem> {
    items
        .iter()
        .map(|i| LineItem {
            description: i.description.clone(),
            quantity: i.quantity,
            rate: i.rate,
            amount: i.rate * i.quantity,
        })
        .collect()
}

fn validate_billing(discount: Money, tax_rate: Decimal, subtotal: Money) -> Result<(), LedgerError> {
    if discount.is_negative() {
        return Err(LedgerError::ValidationError(
            "discount must be non-negative".to_string(),
        ));
    }
    if discount > subtotal {
        return Err(LedgerError::ValidationError(
            "discount exceeds invoice subtotal".to_string(),
        ));
    }
    if tax_rate.is_sign_negative() {
        return Err(LedgerError::ValidationError(
            "tax rate must be non-negative".to_string(),
        ));
    }
    Ok(())
}

impl<S: LedgerStore> ReconciliationService<S> {
    // -------------------------------------------------------------------------
    // Scoped reads
    // -------------------------------------------------------------------------

    pub(crate) async fn scoped_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Versioned<Invoice>, LedgerError> {
        let invoice = self
            .store()
            .get_invoice(invoice_id)
            .await?
            .ok_or(LedgerError::NotFound("invoice"))?;
        if invoice.doc.owner_id != owner_id {
            return Err(LedgerError::Forbidden("invoice"));
        }
        Ok(invoice)
    }

    pub(crate) async fn scoped_payment(
        &self,
        owner_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Versioned<Payment>, LedgerError> {
        let payment = self
            .store()
            .get_payment(payment_id)
            .await?
            .ok_or(LedgerError::NotFound("payment"))?;
        if payment.doc.owner_id != owner_id {
            return Err(LedgerError::Forbidden("payment"));
        }
        Ok(payment)
    }

    pub(crate) async fn scoped_client(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Versioned<Client>, LedgerError> {
        let client = self
            .store()
            .get_client(client_id)
            .await?
            .ok_or(LedgerError::NotFound("client"))?;
        if client.doc.owner_id != owner_id {
            return Err(LedgerError::Forbidden("client"));
        }
        Ok(client)
    }

    /// Get an invoice within the caller's scope.
    pub async fn get_invoice(&self, owner_id: Uuid, invoice_id: Uuid) -> Result<Invoice, LedgerError> {
        Ok(self.scoped_invoice(owner_id, invoice_id).await?.doc)
    }

    /// Get a payment within the caller's scope.
    pub async fn get_payment(&self, owner_id: Uuid, payment_id: Uuid) -> Result<Payment, LedgerError> {
        Ok(self.scoped_payment(owner_id, payment_id).await?.doc)
    }

    /// Get a client within the caller's scope.
    pub async fn get_client(&self, owner_id: Uuid, client_id: Uuid) -> Result<Client, LedgerError> {
        Ok(self.scoped_client(owner_id, client_id).await?.doc)
    }

    // -------------------------------------------------------------------------
    // Client lifecycle
    // -------------------------------------------------------------------------

    /// Create a client with a zeroed payment aggregate.
    #[instrument(skip(self, name), fields(owner_id = %owner_id))]
    pub async fn create_client(
        &self,
        owner_id: Uuid,
        name: impl Into<String>,
    ) -> Result<Client, LedgerError> {
        let client = Client::new(owner_id, name);

        self.store()
            .commit(
                LedgerTxn::new()
                    .expect(DocKey::Client(client.client_id), 0)
                    .write(DocWrite::PutClient(client.clone())),
            )
            .await
            .map_err(|err| record_error(err.into()))?;

        info!(client_id = %client.client_id, "Client created");

        Ok(client)
    }

    // -------------------------------------------------------------------------
    // Invoice lifecycle
    // -------------------------------------------------------------------------

    /// Create a draft invoice with server-computed amounts, and fold it into
    /// the client aggregate.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, client_id = %input.client_id))]
    pub async fn create_invoice(
        &self,
        owner_id: Uuid,
        input: CreateInvoice,
    ) -> Result<(Invoice, Client), LedgerError> {
        validate_line_items(&input.line_items).map_err(record_error)?;

        let result = retry_on_conflict(self.retry(), "create_invoice", || {
            self.try_create_invoice(owner_id, &input)
        })
        .await
        .map_err(record_error)?;

        info!(
            invoice_id = %result.0.invoice_id,
            total = %result.0.total,
            "Draft invoice created"
        );

        Ok(result)
    }

    async fn try_create_invoice(
        &self,
        owner_id: Uuid,
        input: &CreateInvoice,
    ) -> Result<(Invoice, Client), LedgerError> {
        let vclient = self.scoped_client(owner_id, input.client_id).await?;
        let mut client = vclient.doc;

        let now = Utc::now();
        let mut invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            owner_id,
            client_id: input.client_id,
            line_items: to_line_items(&input.line_items),
            discount: input.discount,
            tax_rate: input.tax_rate,
            subtotal: Money::ZERO,
            tax: Money::ZERO,
            total: Money::ZERO,
            paid_amount: Money::ZERO,
            remaining_amount: Money::ZERO,
            status: InvoiceStatus::Draft,
            has_been_sent: false,
            payment_method: None,
            payment_history: Vec::new(),
            issue_date: input.issue_date,
            due_date: input.due_date,
            paid_at: None,
            created_utc: now,
        };
        invoice.recalculate_totals();
        validate_billing(invoice.discount, invoice.tax_rate, invoice.subtotal)?;
        invoice.refresh_financials(now);

        rollup::record_invoice_created(&mut client.payment_stats, &invoice);

        let timer = COMMIT_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();
        self.store()
            .commit(
                LedgerTxn::new()
                    .expect(DocKey::Invoice(invoice.invoice_id), 0)
                    .expect(DocKey::Client(client.client_id), vclient.version)
                    .write(DocWrite::PutInvoice(invoice.clone()))
                    .write(DocWrite::PutClient(client.clone())),
            )
            .await?;
        timer.observe_duration();

        Ok((invoice, client))
    }

    /// Update an invoice's billable content. Rejected once any payment has
    /// been applied; the aggregate's amount fields follow the new total.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        input: UpdateInvoice,
    ) -> Result<(Invoice, Client), LedgerError> {
        if let Some(items) = &input.line_items {
            validate_line_items(items).map_err(record_error)?;
        }

        retry_on_conflict(self.retry(), "update_invoice", || {
            self.try_update_invoice(owner_id, invoice_id, &input)
        })
        .await
        .map_err(record_error)
    }

    async fn try_update_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<(Invoice, Client), LedgerError> {
        let vinvoice = self.scoped_invoice(owner_id, invoice_id).await?;
        let mut invoice = vinvoice.doc;

        if invoice.paid_amount.is_positive() {
            return Err(LedgerError::InvalidState(
                "cannot modify an invoice with payments applied".to_string(),
            ));
        }

        let vclient = self.scoped_client(owner_id, invoice.client_id).await?;
        let mut client = vclient.doc;

        let old_total = invoice.total;
        if let Some(items) = &input.line_items {
            invoice.line_items = to_line_items(items);
        }
        if let Some(discount) = input.discount {
            invoice.discount = discount;
        }
        if let Some(tax_rate) = input.tax_rate {
            invoice.tax_rate = tax_rate;
        }
        if let Some(due_date) = input.due_date {
            invoice.due_date = due_date;
        }
        invoice.recalculate_totals();
        validate_billing(invoice.discount, invoice.tax_rate, invoice.subtotal)?;
        invoice.refresh_financials(Utc::now());

        rollup::record_invoice_retotaled(&mut client.payment_stats, old_total, invoice.total);

        let timer = COMMIT_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();
        self.store()
            .commit(
                LedgerTxn::new()
                    .expect(DocKey::Invoice(invoice_id), vinvoice.version)
                    .expect(DocKey::Client(client.client_id), vclient.version)
                    .write(DocWrite::PutInvoice(invoice.clone()))
                    .write(DocWrite::PutClient(client.clone())),
            )
            .await?;
        timer.observe_duration();

        info!(invoice_id = %invoice_id, total = %invoice.total, "Invoice updated");

        Ok((invoice, client))
    }

    /// Mark an invoice as sent to the client. Unpaid invoices move from
    /// `draft` to `sent`; the flag is never unset.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn mark_invoice_sent(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Invoice, LedgerError> {
        retry_on_conflict(self.retry(), "mark_invoice_sent", || {
            self.try_mark_invoice_sent(owner_id, invoice_id)
        })
        .await
        .map_err(record_error)
    }

    async fn try_mark_invoice_sent(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Invoice, LedgerError> {
        let vinvoice = self.scoped_invoice(owner_id, invoice_id).await?;
        let mut invoice = vinvoice.doc;

        invoice.has_been_sent = true;
        invoice.refresh_financials(Utc::now());

        self.store()
            .commit(
                LedgerTxn::new()
                    .expect(DocKey::Invoice(invoice_id), vinvoice.version)
                    .write(DocWrite::PutInvoice(invoice.clone())),
            )
            .await?;

        info!(invoice_id = %invoice_id, "Invoice marked sent");

        Ok(invoice)
    }

    /// Delete an invoice and remove its contribution from the client
    /// aggregate. Paid invoices cannot be deleted.
    #[instrument(skip(self), fields(owner_id = %owner_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Client, LedgerError> {
        retry_on_conflict(self.retry(), "delete_invoice", || {
            self.try_delete_invoice(owner_id, invoice_id)
        })
        .await
        .map_err(record_error)
    }

    async fn try_delete_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Client, LedgerError> {
        let vinvoice = self.scoped_invoice(owner_id, invoice_id).await?;
        let invoice = vinvoice.doc;

        if invoice.status == InvoiceStatus::Paid {
            return Err(LedgerError::InvalidState(
                "cannot delete a paid invoice".to_string(),
            ));
        }

        let vclient = self.scoped_client(owner_id, invoice.client_id).await?;
        let mut client = vclient.doc;

        let remaining: Vec<Invoice> = self
            .store()
            .list_invoices_for_client(owner_id, invoice.client_id)
            .await?
            .into_iter()
            .filter(|i| i.invoice_id != invoice_id)
            .collect();

        rollup::record_invoice_deleted(&mut client.payment_stats, &invoice, &remaining);

        let timer = COMMIT_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();
        self.store()
            .commit(
                LedgerTxn::new()
                    .expect(DocKey::Invoice(invoice_id), vinvoice.version)
                    .expect(DocKey::Client(client.client_id), vclient.version)
                    .write(DocWrite::DeleteInvoice(invoice_id))
                    .write(DocWrite::PutClient(client.clone())),
            )
            .await?;
        timer.observe_duration();

        info!(invoice_id = %invoice_id, "Invoice deleted");

        Ok(client)
    }
}
