//! Data model: invoices, payments, clients, and money.

pub mod client;
pub mod invoice;
pub mod money;
pub mod payment;

pub use client::{reliability_score, Client, ClientPaymentAggregate};
pub use invoice::{
    derive_status, effective_status, CreateInvoice, CreateLineItem, Invoice, InvoiceStatus,
    LineItem, PaymentSummary, UpdateInvoice,
};
pub use money::Money;
pub use payment::{Payment, PaymentMethod, PaymentStatus, RecordPayment};
