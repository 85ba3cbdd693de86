//! Payment application and reversal.
//!
//! Each operation is one optimistic unit of work: read the invoice, client
//! and payment at their current versions, compute the full post-state, and
//! commit everything in a single atomic transaction preconditioned on those
//! versions. A concurrent writer invalidates a precondition, the commit is
//! rejected as a whole, and the unit of work re-reads and retries. Partial
//! application is therefore impossible, and two racing payments against the
//! same invoice serialize instead of both passing the overpayment check.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{
    Client, Invoice, InvoiceStatus, Payment, PaymentStatus, PaymentSummary, RecordPayment,
};
use crate::store::{DocKey, DocWrite, LedgerStore, LedgerTxn};

use super::metrics::{
    AGGREGATE_REPAIRS_TOTAL, COMMIT_DURATION, ERRORS_TOTAL, PAYMENTS_APPLIED_TOTAL,
    PAYMENTS_REVERSED_TOTAL, PAYMENT_AMOUNT_TOTAL,
};
use super::retry::retry_on_conflict;
use super::rollup;
use super::ReconciliationService;

/// Result of applying a payment: the three documents the commit updated.
#[derive(Debug, Clone)]
pub struct PaymentApplied {
    pub payment: Payment,
    pub invoice: Invoice,
    pub client: Client,
}

/// Result of reversing a payment. `invoice` is `None` when the invoice had
/// already been deleted and only the aggregate was adjusted.
#[derive(Debug, Clone)]
pub struct PaymentReversed {
    pub payment: Payment,
    pub invoice: Option<Invoice>,
    pub client: Client,
}

/// Count an operation failure under its stable kind label before returning
/// it. Every public entry point of the service routes errors through here.
pub(crate) fn record_error(err: LedgerError) -> LedgerError {
    ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
    err
}

impl<S: LedgerStore> ReconciliationService<S> {
    // -------------------------------------------------------------------------
    // Payment application
    // -------------------------------------------------------------------------

    /// Apply a payment against an invoice.
    ///
    /// Validates the amount against the remaining balance, writes the
    /// payment, re-derives the invoice's financial status and updates the
    /// client aggregate, all in one atomic commit. The confirmation
    /// notification goes out on a detached task after the commit and cannot
    /// fail the operation.
    #[instrument(skip(self, input), fields(owner_id = %owner_id, invoice_id = %input.invoice_id, amount = %input.amount))]
    pub async fn apply_payment(
        &self,
        owner_id: Uuid,
        input: RecordPayment,
    ) -> Result<PaymentApplied, LedgerError> {
        if !input.amount.is_positive() {
            return Err(record_error(LedgerError::ValidationError(
                "payment amount must be positive".to_string(),
            )));
        }

        let applied = retry_on_conflict(self.retry(), "apply_payment", || {
            self.try_apply_payment(owner_id, &input)
        })
        .await
        .map_err(record_error)?;

        PAYMENTS_APPLIED_TOTAL
            .with_label_values(&[applied.payment.method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&["apply"])
            .inc_by(applied.payment.amount.minor_units() as f64);

        info!(
            payment_id = %applied.payment.payment_id,
            invoice_id = %applied.invoice.invoice_id,
            amount = %applied.payment.amount,
            status = applied.invoice.status.as_str(),
            "Payment applied"
        );

        self.notify_confirmation(&applied);

        Ok(applied)
    }

    async fn try_apply_payment(
        &self,
        owner_id: Uuid,
        input: &RecordPayment,
    ) -> Result<PaymentApplied, LedgerError> {
        let vinvoice = self.scoped_invoice(owner_id, input.invoice_id).await?;
        let mut invoice = vinvoice.doc;

        if invoice.status == InvoiceStatus::Paid {
            return Err(LedgerError::InvalidState(
                "invoice is already fully paid".to_string(),
            ));
        }
        if input.amount > invoice.remaining_amount {
            return Err(LedgerError::OverpaymentRejected {
                amount: input.amount,
                remaining: invoice.remaining_amount,
            });
        }

        let vclient = self.scoped_client(owner_id, invoice.client_id).await?;
        let mut client = vclient.doc;

        let now = Utc::now();
        let payment = Payment {
            payment_id: Uuid::new_v4(),
            owner_id,
            invoice_id: invoice.invoice_id,
            client_id: invoice.client_id,
            amount: input.amount,
            method: input.method,
            payment_date: input.payment_date,
            reference_number: input.reference_number.clone(),
            transaction_id: input.transaction_id.clone(),
            notes: input.notes.clone(),
            status: PaymentStatus::Completed,
            late: input.payment_date > invoice.due_date,
            created_utc: now,
        };

        invoice.paid_amount += payment.amount;
        invoice.payment_history.push(PaymentSummary {
            payment_id: payment.payment_id,
            amount: payment.amount,
            payment_date: payment.payment_date,
            method: payment.method,
            transaction_id: payment.transaction_id.clone(),
            reference_number: payment.reference_number.clone(),
        });
        invoice.payment_method = invoice.payment_history.last().map(|e| e.method);
        invoice.refresh_financials(now);

        rollup::record_payment_applied(&mut client.payment_stats, &payment);

        let timer = COMMIT_DURATION
            .with_label_values(&["apply_payment"])
            .start_timer();
        self.store()
            .commit(
                LedgerTxn::new()
                    .expect(DocKey::Invoice(invoice.invoice_id), vinvoice.version)
                    .expect(DocKey::Client(client.client_id), vclient.version)
                    .write(DocWrite::PutPayment(payment.clone()))
                    .write(DocWrite::PutInvoice(invoice.clone()))
                    .write(DocWrite::PutClient(client.clone())),
            )
            .await?;
        timer.observe_duration();

        Ok(PaymentApplied {
            payment,
            invoice,
            client,
        })
    }

    fn notify_confirmation(&self, applied: &PaymentApplied) {
        let notifier = Arc::clone(self.notifier());
        let invoice = applied.invoice.clone();
        let client = applied.client.clone();
        let payment = applied.payment.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier
                .send_payment_confirmation(&invoice, &client, &payment)
                .await
            {
                warn!(
                    payment_id = %payment.payment_id,
                    error = %err,
                    "Payment confirmation delivery failed"
                );
            }
        });
    }

    // -------------------------------------------------------------------------
    // Payment reversal
    // -------------------------------------------------------------------------

    /// Reverse a payment: delete it and undo its effect on the invoice and
    /// the client aggregate, leaving both as if the payment never happened.
    ///
    /// If the invoice was deleted first, the reversal still succeeds and
    /// adjusts only the aggregate.
    #[instrument(skip(self), fields(owner_id = %owner_id, payment_id = %payment_id))]
    pub async fn reverse_payment(
        &self,
        owner_id: Uuid,
        payment_id: Uuid,
    ) -> Result<PaymentReversed, LedgerError> {
        let reversed = retry_on_conflict(self.retry(), "reverse_payment", || {
            self.try_reverse_payment(owner_id, payment_id)
        })
        .await
        .map_err(record_error)?;

        PAYMENTS_REVERSED_TOTAL
            .with_label_values(&[reversed.payment.method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&["reverse"])
            .inc_by(reversed.payment.amount.minor_units() as f64);

        info!(
            payment_id = %payment_id,
            amount = %reversed.payment.amount,
            "Payment reversed"
        );

        Ok(reversed)
    }

    async fn try_reverse_payment(
        &self,
        owner_id: Uuid,
        payment_id: Uuid,
    ) -> Result<PaymentReversed, LedgerError> {
        let vpayment = self.scoped_payment(owner_id, payment_id).await?;
        let payment = vpayment.doc;

        let vclient = self.scoped_client(owner_id, payment.client_id).await?;
        let mut client = vclient.doc;

        let mut txn = LedgerTxn::new()
            .expect(DocKey::Payment(payment_id), vpayment.version)
            .expect(DocKey::Client(client.client_id), vclient.version)
            .write(DocWrite::DeletePayment(payment_id));

        let now = Utc::now();
        let invoice = match self.store().get_invoice(payment.invoice_id).await? {
            Some(vinvoice) => {
                let mut invoice = vinvoice.doc;

                invoice.paid_amount = invoice.paid_amount.sub_clamped(payment.amount);
                // Remove exactly the entry for this payment, not the first
                // entry that happens to share a transaction reference.
                if let Some(pos) = invoice
                    .payment_history
                    .iter()
                    .position(|e| e.payment_id == payment_id)
                {
                    invoice.payment_history.remove(pos);
                }
                invoice.payment_method = invoice.payment_history.last().map(|e| e.method);
                invoice.refresh_financials(now);

                txn = txn
                    .expect(DocKey::Invoice(invoice.invoice_id), vinvoice.version)
                    .write(DocWrite::PutInvoice(invoice.clone()));
                Some(invoice)
            }
            None => {
                warn!(
                    invoice_id = %payment.invoice_id,
                    "Reversing payment whose invoice no longer exists; adjusting aggregate only"
                );
                None
            }
        };

        let remaining: Vec<Payment> = self
            .store()
            .list_payments_for_client(owner_id, payment.client_id)
            .await?
            .into_iter()
            .filter(|p| p.payment_id != payment_id)
            .collect();
        rollup::record_payment_reversed(&mut client.payment_stats, &payment, &remaining);
        txn = txn.write(DocWrite::PutClient(client.clone()));

        let timer = COMMIT_DURATION
            .with_label_values(&["reverse_payment"])
            .start_timer();
        self.store().commit(txn).await?;
        timer.observe_duration();

        Ok(PaymentReversed {
            payment,
            invoice,
            client,
        })
    }

    // -------------------------------------------------------------------------
    // Aggregate repair
    // -------------------------------------------------------------------------

    /// Rebuild a client's aggregate from its invoices and payments.
    ///
    /// Idempotent; intended for a background job to heal drift left by
    /// degraded paths such as reversals against deleted invoices. The commit
    /// is preconditioned on the client version, so a concurrent incremental
    /// update can never be clobbered.
    #[instrument(skip(self), fields(owner_id = %owner_id, client_id = %client_id))]
    pub async fn recompute_aggregate_from_ledger(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Client, LedgerError> {
        retry_on_conflict(self.retry(), "recompute_aggregate", || {
            self.try_recompute_aggregate(owner_id, client_id)
        })
        .await
        .map_err(record_error)
    }

    async fn try_recompute_aggregate(
        &self,
        owner_id: Uuid,
        client_id: Uuid,
    ) -> Result<Client, LedgerError> {
        let vclient = self.scoped_client(owner_id, client_id).await?;
        let mut client = vclient.doc;

        let invoices = self
            .store()
            .list_invoices_for_client(owner_id, client_id)
            .await?;
        let payments = self
            .store()
            .list_payments_for_client(owner_id, client_id)
            .await?;

        let rebuilt = rollup::rebuild_aggregate(&invoices, &payments);
        let drifted = rebuilt != client.payment_stats;
        AGGREGATE_REPAIRS_TOTAL
            .with_label_values(&[if drifted { "drifted" } else { "clean" }])
            .inc();
        if drifted {
            warn!(client_id = %client_id, "Client aggregate drift repaired");
        }

        client.payment_stats = rebuilt;

        self.store()
            .commit(
                LedgerTxn::new()
                    .expect(DocKey::Client(client_id), vclient.version)
                    .write(DocWrite::PutClient(client.clone())),
            )
            .await?;

        Ok(client)
    }
}
