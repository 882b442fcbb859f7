use chrono::NaiveDate;

use super::document::compute_document;
use super::error::BillingError;
use super::line_item::LineItemInput;
use super::money::Money;
use super::types::*;

/// Builder for draft invoices. Computes line items and totals on `build()`.
///
/// ```
/// use belegfluss::core::*;
/// use chrono::NaiveDate;
///
/// let invoice = InvoiceBuilder::new(CompanyId::new(), CustomerId::new(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
///     .number("RE-2024-001")
///     .due_date(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())
///     .add_line(LineItemBuilder::new("Hosting", Quantity::units(1), "month", Money::from_minor(4990))
///         .vat(Rate::from_scaled(810))
///         .build())
///     .build()
///     .unwrap();
///
/// assert_eq!(invoice.status, InvoiceStatus::Draft);
/// assert_eq!(invoice.total, Money::from_minor(5394));
/// ```
pub struct InvoiceBuilder {
    company_id: CompanyId,
    customer_id: CustomerId,
    number: Option<String>,
    date: NaiveDate,
    due_date: Option<NaiveDate>,
    lines: Vec<LineItemInput>,
    payment_reference: Option<String>,
    discount_code: Option<String>,
    discount_amount: Money,
}

impl InvoiceBuilder {
    pub fn new(company_id: CompanyId, customer_id: CustomerId, date: NaiveDate) -> Self {
        Self {
            company_id,
            customer_id,
            number: None,
            date,
            due_date: None,
            lines: Vec::new(),
            payment_reference: None,
            discount_code: None,
            discount_amount: Money::ZERO,
        }
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn add_line(mut self, line: LineItemInput) -> Self {
        self.lines.push(line);
        self
    }

    pub fn payment_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    pub fn discount(mut self, code: impl Into<String>, amount: Money) -> Self {
        self.discount_code = Some(code.into());
        self.discount_amount = amount;
        self
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn has_number(&self) -> bool {
        self.number.is_some()
    }

    pub fn has_due_date(&self) -> bool {
        self.due_date.is_some()
    }

    /// Build the draft invoice, computing all lines and totals.
    pub fn build(self) -> Result<Invoice, BillingError> {
        let number = required_number(self.number, "invoice")?;
        let due_date = self
            .due_date
            .ok_or_else(|| BillingError::Builder("invoice due date is required".into()))?;
        if due_date < self.date {
            return Err(BillingError::Builder(format!(
                "due date {due_date} lies before invoice date {}",
                self.date
            )));
        }

        let (items, totals) = compute_document(self.lines, self.discount_amount)?;

        let mut invoice = Invoice {
            id: InvoiceId::new(),
            company_id: self.company_id,
            customer_id: self.customer_id,
            number,
            date: self.date,
            due_date,
            status: InvoiceStatus::Draft,
            items,
            subtotal: Money::ZERO,
            vat_amount: Money::ZERO,
            total: Money::ZERO,
            paid_amount: Money::ZERO,
            payment_reference: self.payment_reference,
            reminder_level: 0,
            discount_code: self.discount_code,
            discount_amount: Money::ZERO,
            quote_id: None,
            version: 0,
        };
        invoice.set_totals(totals);
        Ok(invoice)
    }
}

/// Builder for draft quotes.
pub struct QuoteBuilder {
    company_id: CompanyId,
    customer_id: CustomerId,
    number: Option<String>,
    date: NaiveDate,
    expiry_date: Option<NaiveDate>,
    lines: Vec<LineItemInput>,
    discount_code: Option<String>,
    discount_amount: Money,
    acceptance_token: Option<String>,
}

impl QuoteBuilder {
    pub fn new(company_id: CompanyId, customer_id: CustomerId, date: NaiveDate) -> Self {
        Self {
            company_id,
            customer_id,
            number: None,
            date,
            expiry_date: None,
            lines: Vec::new(),
            discount_code: None,
            discount_amount: Money::ZERO,
            acceptance_token: None,
        }
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn expiry_date(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }

    pub fn add_line(mut self, line: LineItemInput) -> Self {
        self.lines.push(line);
        self
    }

    pub fn discount(mut self, code: impl Into<String>, amount: Money) -> Self {
        self.discount_code = Some(code.into());
        self.discount_amount = amount;
        self
    }

    pub fn acceptance_token(mut self, token: impl Into<String>) -> Self {
        self.acceptance_token = Some(token.into());
        self
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn has_number(&self) -> bool {
        self.number.is_some()
    }

    pub fn has_expiry_date(&self) -> bool {
        self.expiry_date.is_some()
    }

    pub fn has_acceptance_token(&self) -> bool {
        self.acceptance_token.is_some()
    }

    /// Build the draft quote. Number, expiry date and acceptance token are required.
    pub fn build(self) -> Result<Quote, BillingError> {
        let number = required_number(self.number, "quote")?;
        let expiry_date = self
            .expiry_date
            .ok_or_else(|| BillingError::Builder("quote expiry date is required".into()))?;
        if expiry_date < self.date {
            return Err(BillingError::Builder(format!(
                "expiry date {expiry_date} lies before quote date {}",
                self.date
            )));
        }

        let acceptance_token = self
            .acceptance_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| BillingError::Builder("quote acceptance token is required".into()))?;

        let (items, totals) = compute_document(self.lines, self.discount_amount)?;

        let mut quote = Quote {
            id: QuoteId::new(),
            company_id: self.company_id,
            customer_id: self.customer_id,
            number,
            date: self.date,
            expiry_date,
            status: QuoteStatus::Draft,
            items,
            subtotal: Money::ZERO,
            vat_amount: Money::ZERO,
            total: Money::ZERO,
            discount_code: self.discount_code,
            discount_amount: Money::ZERO,
            acceptance_token,
            accepted_at: None,
            accepted_by: None,
            invoice_id: None,
        };
        quote.set_totals(totals);
        Ok(quote)
    }
}

fn required_number(number: Option<String>, entity: &str) -> Result<String, BillingError> {
    let number = number.ok_or_else(|| BillingError::Builder(format!("{entity} number is required")))?;
    if number.trim().is_empty() {
        return Err(BillingError::Builder(format!("{entity} number must not be empty")));
    }
    if number.len() > 200 {
        return Err(BillingError::Builder(format!(
            "{entity} number cannot exceed 200 characters"
        )));
    }
    Ok(number)
}
