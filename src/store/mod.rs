//! Persistence seam.
//!
//! The engine talks to storage only through [`Store::transaction`]: every
//! multi-step write (reconciliation, quote conversion, recording a payment)
//! runs inside one closure whose writes commit together on `Ok` and are
//! discarded on `Err`. Reads and writes are scoped to a company.

mod memory;
mod rows;

pub use memory::InMemoryStore;
pub use rows::*;

use thiserror::Error;

use crate::core::{
    BillingError, CompanyId, Customer, CustomerId, DocumentKind, DocumentNumberSequence, Invoice, InvoiceId,
    Payment, PaymentId, Quote, QuoteId,
};

/// Failures reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The record changed since it was read (optimistic concurrency).
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },

    /// A record with the same key already exists.
    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// A stored row could not be mapped to a valid domain value.
    #[error("corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    /// The backend itself failed (connection, lock, I/O).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Company-scoped reads and writes inside one unit of work.
pub trait Transaction {
    fn customer(&self, company: CompanyId, id: CustomerId) -> Result<Option<Customer>, StoreError>;
    fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError>;

    fn invoice(&self, company: CompanyId, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;
    fn invoices(&self, company: CompanyId) -> Result<Vec<Invoice>, StoreError>;
    fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError>;
    /// Write `invoice` if its `version` still matches the stored one.
    /// Returns the invoice with its bumped version.
    fn update_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, StoreError>;

    fn quote(&self, company: CompanyId, id: QuoteId) -> Result<Option<Quote>, StoreError>;
    /// Token lookup is the only read not scoped to a company.
    fn quote_by_token(&self, token: &str) -> Result<Option<Quote>, StoreError>;
    fn insert_quote(&mut self, quote: &Quote) -> Result<(), StoreError>;
    fn update_quote(&mut self, quote: &Quote) -> Result<(), StoreError>;

    fn payment(&self, company: CompanyId, id: PaymentId) -> Result<Option<Payment>, StoreError>;
    fn payments_for_invoice(
        &self,
        company: CompanyId,
        invoice: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError>;
    fn payments_in_batch(&self, company: CompanyId, tag: &str) -> Result<Vec<Payment>, StoreError>;
    fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
    fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;

    fn number_sequence(
        &self,
        company: CompanyId,
        kind: DocumentKind,
    ) -> Result<Option<DocumentNumberSequence>, StoreError>;
    fn save_number_sequence(
        &mut self,
        company: CompanyId,
        sequence: &DocumentNumberSequence,
    ) -> Result<(), StoreError>;
}

/// A store that can run a closure as one atomic unit of work.
pub trait Store {
    fn transaction<T, F>(&self, work: F) -> Result<T, BillingError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, BillingError>;
}
