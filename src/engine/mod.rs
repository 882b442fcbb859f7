//! Entry points that tie documents, payments and reconciliation to a [`Store`].
//!
//! Every collaborator is passed in explicitly: the store, the payment
//! reference service and the clock. Each public operation runs as one
//! transaction; batch import runs one transaction per record.
//!
//! ```
//! use belegfluss::core::*;
//! use belegfluss::engine::{Engine, EngineConfig, FixedClock};
//! use belegfluss::store::InMemoryStore;
//! use chrono::{NaiveDate, TimeZone, Utc};
//!
//! let references = |_: CompanyId, number: &str| Ok::<_, BillingError>(format!("REF-{number}"));
//! let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
//! let engine = Engine::new(InMemoryStore::new(), references, clock, EngineConfig::default()).unwrap();
//!
//! let company = CompanyId::new();
//! let invoice = engine
//!     .create_invoice(
//!         InvoiceBuilder::new(company, CustomerId::new(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
//!             .add_line(LineItemBuilder::new("Support", Quantity::units(2), "h", Money::from_minor(12_000)).build()),
//!     )
//!     .unwrap();
//!
//! assert_eq!(invoice.number, "RE-2024-001");
//! assert_eq!(invoice.payment_reference.as_deref(), Some("REF-RE-2024-001"));
//! ```

mod collaborators;
mod config;
mod payments;
mod quotes;

pub use collaborators::{Clock, FixedClock, ReferenceGenerator, SystemClock};
pub use config::EngineConfig;
pub use payments::{ImportReport, RecordFailure};
pub use quotes::AcceptedQuote;

use chrono::{Datelike, Days, NaiveDate};
use tracing::{error, info, instrument};

use crate::core::{
    BillingError, CompanyId, Customer, CustomerId, DocumentKind, DocumentNumberSequence, Invoice,
    InvoiceBuilder, InvoiceId, LineItemInput, Money, Quote, QuoteBuilder, QuoteId,
    new_acceptance_token,
};
use crate::store::{Store, Transaction};

/// The billing engine.
pub struct Engine<S, R, C = SystemClock> {
    store: S,
    references: R,
    clock: C,
    config: EngineConfig,
}

impl<S, R, C> Engine<S, R, C>
where
    S: Store,
    R: ReferenceGenerator,
    C: Clock,
{
    pub fn new(store: S, references: R, clock: C, config: EngineConfig) -> Result<Self, BillingError> {
        config.validate()?;
        Ok(Self {
            store,
            references,
            clock,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(company_id = %customer.company_id, customer_id = %customer.id))]
    pub fn add_customer(&self, customer: &Customer) -> Result<(), BillingError> {
        logged(
            "add_customer",
            self.store.transaction(|tx| Ok(tx.insert_customer(customer)?)),
        )
    }

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    /// Persist a new DRAFT invoice.
    ///
    /// Missing pieces are filled in: the next invoice number, a due date from
    /// the customer's payment terms and a payment reference from the
    /// reference service.
    #[instrument(skip_all, fields(company_id = %builder.company_id()))]
    pub fn create_invoice(&self, builder: InvoiceBuilder) -> Result<Invoice, BillingError> {
        let result = self.store.transaction(|tx| {
            let company = builder.company_id();
            let date = builder.date();
            let mut builder = builder;
            if !builder.has_number() {
                builder = builder.number(self.next_number(tx, company, DocumentKind::Invoice, date)?);
            }
            if !builder.has_due_date() {
                let terms = self.payment_terms(tx, company, builder.customer_id())?;
                builder = builder.due_date(add_days(date, terms)?);
            }
            let mut invoice = builder.build()?;
            if invoice.payment_reference.is_none() {
                invoice.payment_reference =
                    Some(self.references.payment_reference(company, &invoice.number)?);
            }
            tx.insert_invoice(&invoice)?;
            Ok(invoice)
        });
        let invoice = logged("create_invoice", result)?;
        info!(invoice_id = %invoice.id, number = %invoice.number, total = %invoice.total, "invoice created");
        Ok(invoice)
    }

    #[instrument(skip(self))]
    pub fn issue_invoice(&self, company: CompanyId, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.modify_invoice("issue_invoice", company, id, Invoice::issue)
    }

    #[instrument(skip(self))]
    pub fn cancel_invoice(&self, company: CompanyId, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.modify_invoice("cancel_invoice", company, id, Invoice::cancel)
    }

    #[instrument(skip(self))]
    pub fn mark_invoice_overdue(
        &self,
        company: CompanyId,
        id: InvoiceId,
    ) -> Result<Invoice, BillingError> {
        self.modify_invoice("mark_invoice_overdue", company, id, Invoice::mark_overdue)
    }

    /// Replace the lines and discount of a DRAFT invoice.
    #[instrument(skip(self, lines, discount_code))]
    pub fn update_invoice(
        &self,
        company: CompanyId,
        id: InvoiceId,
        lines: Vec<LineItemInput>,
        discount_code: Option<String>,
        discount_amount: Money,
    ) -> Result<Invoice, BillingError> {
        self.modify_invoice("update_invoice", company, id, |invoice| {
            invoice.replace_items(lines, discount_code, discount_amount)
        })
    }

    fn modify_invoice(
        &self,
        operation: &'static str,
        company: CompanyId,
        id: InvoiceId,
        change: impl FnOnce(&mut Invoice) -> Result<(), BillingError>,
    ) -> Result<Invoice, BillingError> {
        let result = self.store.transaction(|tx| {
            let mut invoice = tx
                .invoice(company, id)?
                .ok_or_else(|| BillingError::not_found("invoice", id))?;
            change(&mut invoice)?;
            Ok(tx.update_invoice(&invoice)?)
        });
        let invoice = logged(operation, result)?;
        info!(invoice_id = %id, status = invoice.status.as_str(), operation, "invoice updated");
        Ok(invoice)
    }

    // ------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------

    /// Persist a new DRAFT quote, numbering it and defaulting its expiry date.
    #[instrument(skip_all, fields(company_id = %builder.company_id()))]
    pub fn create_quote(&self, builder: QuoteBuilder) -> Result<Quote, BillingError> {
        let result = self.store.transaction(|tx| {
            let company = builder.company_id();
            let date = builder.date();
            let mut builder = builder;
            if !builder.has_number() {
                builder = builder.number(self.next_number(tx, company, DocumentKind::Quote, date)?);
            }
            if !builder.has_expiry_date() {
                builder = builder.expiry_date(add_days(date, self.config.quote_validity_days)?);
            }
            if !builder.has_acceptance_token() {
                builder = builder.acceptance_token(new_acceptance_token(company, self.clock.now()));
            }
            let quote = builder.build()?;
            tx.insert_quote(&quote)?;
            Ok(quote)
        });
        let quote = logged("create_quote", result)?;
        info!(quote_id = %quote.id, number = %quote.number, total = %quote.total, "quote created");
        Ok(quote)
    }

    #[instrument(skip(self))]
    pub fn send_quote(&self, company: CompanyId, id: QuoteId) -> Result<Quote, BillingError> {
        self.modify_quote("send_quote", company, id, Quote::send)
    }

    #[instrument(skip(self))]
    pub fn decline_quote(&self, company: CompanyId, id: QuoteId) -> Result<Quote, BillingError> {
        self.modify_quote("decline_quote", company, id, Quote::decline)
    }

    #[instrument(skip(self))]
    pub fn cancel_quote(&self, company: CompanyId, id: QuoteId) -> Result<Quote, BillingError> {
        self.modify_quote("cancel_quote", company, id, Quote::cancel)
    }

    /// Replace the lines and discount of a DRAFT quote. Any other status is a
    /// state conflict.
    #[instrument(skip(self, lines, discount_code))]
    pub fn update_quote(
        &self,
        company: CompanyId,
        id: QuoteId,
        lines: Vec<LineItemInput>,
        discount_code: Option<String>,
        discount_amount: Money,
    ) -> Result<Quote, BillingError> {
        self.modify_quote("update_quote", company, id, |quote| {
            quote.replace_items(lines, discount_code, discount_amount)
        })
    }

    fn modify_quote(
        &self,
        operation: &'static str,
        company: CompanyId,
        id: QuoteId,
        change: impl FnOnce(&mut Quote) -> Result<(), BillingError>,
    ) -> Result<Quote, BillingError> {
        let result = self.store.transaction(|tx| {
            let mut quote = tx
                .quote(company, id)?
                .ok_or_else(|| BillingError::not_found("quote", id))?;
            change(&mut quote)?;
            tx.update_quote(&quote)?;
            Ok(quote)
        });
        let quote = logged(operation, result)?;
        info!(quote_id = %id, status = quote.status.as_str(), operation, "quote updated");
        Ok(quote)
    }

    // ------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------

    /// Take the next number of the company's sequence for `kind`.
    fn next_number(
        &self,
        tx: &mut dyn Transaction,
        company: CompanyId,
        kind: DocumentKind,
        date: NaiveDate,
    ) -> Result<String, BillingError> {
        let mut sequence = match tx.number_sequence(company, kind)? {
            Some(sequence) => sequence,
            None => {
                let prefix = match kind {
                    DocumentKind::Invoice => &self.config.invoice_prefix,
                    DocumentKind::Quote => &self.config.quote_prefix,
                };
                DocumentNumberSequence::new(kind, prefix.as_str(), date.year())
                    .with_padding(self.config.number_padding)
            }
        };
        let number = sequence.next_for(date)?;
        tx.save_number_sequence(company, &sequence)?;
        Ok(number)
    }

    /// Payment terms of the customer, or the configured default when the
    /// customer is not on record.
    fn payment_terms(
        &self,
        tx: &mut dyn Transaction,
        company: CompanyId,
        customer: CustomerId,
    ) -> Result<u32, BillingError> {
        Ok(tx
            .customer(company, customer)?
            .map_or(self.config.default_payment_terms_days, |c| c.payment_terms_days))
    }
}

fn add_days(date: NaiveDate, days: u32) -> Result<NaiveDate, BillingError> {
    date.checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| BillingError::Validation(format!("{date} plus {days} days overflows the calendar")))
}

/// Log storage failures before they leave the engine as the generic error.
fn logged<T>(operation: &'static str, result: Result<T, BillingError>) -> Result<T, BillingError> {
    if let Err(BillingError::Storage(source)) = &result {
        error!(operation, error = %source, "storage failure");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ErrorKind, InvoiceStatus, LineItemBuilder, Quantity, QuoteStatus, Rate,
    };
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    type ReferenceFn = fn(CompanyId, &str) -> Result<String, BillingError>;
    type TestEngine = Engine<InMemoryStore, ReferenceFn, FixedClock>;

    fn reference(_: CompanyId, number: &str) -> Result<String, BillingError> {
        Ok(format!("REF{number}"))
    }

    fn engine() -> TestEngine {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        Engine::new(InMemoryStore::new(), reference as ReferenceFn, clock, EngineConfig::default())
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn line(price: i64) -> LineItemInput {
        LineItemBuilder::new("Consulting", Quantity::units(1), "h", Money::from_minor(price))
            .vat(Rate::from_scaled(810))
            .build()
    }

    #[test]
    fn invoices_are_numbered_per_company() {
        let engine = engine();
        let (a, b) = (CompanyId::new(), CompanyId::new());
        let first = engine
            .create_invoice(InvoiceBuilder::new(a, CustomerId::new(), date(2024, 3, 1)).add_line(line(100)))
            .unwrap();
        let second = engine
            .create_invoice(InvoiceBuilder::new(a, CustomerId::new(), date(2024, 3, 2)).add_line(line(100)))
            .unwrap();
        let other = engine
            .create_invoice(InvoiceBuilder::new(b, CustomerId::new(), date(2024, 3, 2)).add_line(line(100)))
            .unwrap();
        assert_eq!(first.number, "RE-2024-001");
        assert_eq!(second.number, "RE-2024-002");
        assert_eq!(other.number, "RE-2024-001");
    }

    #[test]
    fn due_date_follows_customer_terms() {
        let engine = engine();
        let company = CompanyId::new();
        let customer = Customer {
            id: CustomerId::new(),
            company_id: company,
            name: "Muster AG".into(),
            payment_terms_days: 10,
        };
        engine.add_customer(&customer).unwrap();

        let known = engine
            .create_invoice(InvoiceBuilder::new(company, customer.id, date(2024, 3, 1)).add_line(line(100)))
            .unwrap();
        let unknown = engine
            .create_invoice(InvoiceBuilder::new(company, CustomerId::new(), date(2024, 3, 1)).add_line(line(100)))
            .unwrap();
        assert_eq!(known.due_date, date(2024, 3, 11));
        assert_eq!(unknown.due_date, date(2024, 3, 31));
    }

    #[test]
    fn invoice_edits_stop_after_issue() {
        let engine = engine();
        let company = CompanyId::new();
        let invoice = engine
            .create_invoice(InvoiceBuilder::new(company, CustomerId::new(), date(2024, 3, 1)).add_line(line(100)))
            .unwrap();

        let edited = engine
            .update_invoice(company, invoice.id, vec![line(200)], None, Money::ZERO)
            .unwrap();
        assert_eq!(edited.subtotal, Money::from_minor(200));

        let issued = engine.issue_invoice(company, invoice.id).unwrap();
        assert_eq!(issued.status, InvoiceStatus::Open);

        let err = engine
            .update_invoice(company, invoice.id, vec![line(300)], None, Money::ZERO)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn foreign_company_sees_nothing() {
        let engine = engine();
        let company = CompanyId::new();
        let invoice = engine
            .create_invoice(InvoiceBuilder::new(company, CustomerId::new(), date(2024, 3, 1)).add_line(line(100)))
            .unwrap();
        let err = engine.issue_invoice(CompanyId::new(), invoice.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn quote_defaults_expiry_and_token() {
        let engine = engine();
        let company = CompanyId::new();
        let quote = engine
            .create_quote(QuoteBuilder::new(company, CustomerId::new(), date(2024, 3, 1)).add_line(line(100)))
            .unwrap();
        assert_eq!(quote.number, "OF-2024-001");
        assert_eq!(quote.expiry_date, date(2024, 3, 31));
        assert!(!quote.acceptance_token.is_empty());

        let sent = engine.send_quote(company, quote.id).unwrap();
        assert_eq!(sent.status, QuoteStatus::Sent);
        let declined = engine.decline_quote(company, quote.id).unwrap();
        assert_eq!(declined.status, QuoteStatus::Declined);
        assert!(engine.cancel_quote(company, quote.id).is_err());
    }

    #[test]
    fn rejected_build_consumes_no_number() {
        let engine = engine();
        let company = CompanyId::new();
        let err = engine
            .create_invoice(InvoiceBuilder::new(company, CustomerId::new(), date(2024, 3, 1)))
            .unwrap_err();
        assert!(matches!(err, BillingError::EmptyDocument));

        let invoice = engine
            .create_invoice(InvoiceBuilder::new(company, CustomerId::new(), date(2024, 3, 1)).add_line(line(100)))
            .unwrap();
        assert_eq!(invoice.number, "RE-2024-001");
    }
}
