//! Invoice and quote status transitions.
//!
//! Caller actions live here. Moving an invoice into `PARTIAL_PAID` or `PAID`
//! is reserved for reconciliation and is not exposed as a transition.

use chrono::{DateTime, Days, NaiveDate, Utc};
use uuid::Uuid;

use super::document::compute_document;
use super::error::BillingError;
use super::line_item::LineItemInput;
use super::money::Money;
use super::types::*;

impl Invoice {
    /// DRAFT → OPEN.
    pub fn issue(&mut self) -> Result<(), BillingError> {
        self.transition(&[InvoiceStatus::Draft], InvoiceStatus::Open)
    }

    /// OPEN | PARTIAL_PAID → OVERDUE. Driven by elapsed time, decided by the caller.
    pub fn mark_overdue(&mut self) -> Result<(), BillingError> {
        self.transition(
            &[InvoiceStatus::Open, InvoiceStatus::PartialPaid],
            InvoiceStatus::Overdue,
        )
    }

    /// Any non-terminal status → CANCELLED.
    pub fn cancel(&mut self) -> Result<(), BillingError> {
        if self.status.is_terminal() {
            return Err(invoice_transition(self.status, InvoiceStatus::Cancelled));
        }
        self.status = InvoiceStatus::Cancelled;
        Ok(())
    }

    pub fn is_editable(&self) -> bool {
        self.status == InvoiceStatus::Draft
    }

    /// Replace all lines and the discount of a draft, recomputing totals.
    pub fn replace_items(
        &mut self,
        lines: Vec<LineItemInput>,
        discount_code: Option<String>,
        discount_amount: Money,
    ) -> Result<(), BillingError> {
        if !self.is_editable() {
            return Err(BillingError::NotEditable {
                entity: "invoice",
                status: self.status.as_str(),
            });
        }
        let (items, totals) = compute_document(lines, discount_amount)?;
        self.items = items;
        self.discount_code = discount_code;
        self.set_totals(totals);
        Ok(())
    }

    /// Build the invoice a quote converts into.
    ///
    /// Lines and totals are copied as computed on the quote; nothing is recalculated.
    pub fn from_quote(
        quote: &Quote,
        number: String,
        date: NaiveDate,
        due_date: NaiveDate,
        payment_reference: Option<String>,
    ) -> Self {
        Self {
            id: InvoiceId::new(),
            company_id: quote.company_id,
            customer_id: quote.customer_id,
            number,
            date,
            due_date,
            status: InvoiceStatus::Open,
            items: quote.items.clone(),
            subtotal: quote.subtotal,
            vat_amount: quote.vat_amount,
            total: quote.total,
            paid_amount: Money::ZERO,
            payment_reference,
            reminder_level: 0,
            discount_code: quote.discount_code.clone(),
            discount_amount: quote.discount_amount,
            quote_id: Some(quote.id),
            version: 0,
        }
    }

    fn transition(
        &mut self,
        allowed_from: &[InvoiceStatus],
        to: InvoiceStatus,
    ) -> Result<(), BillingError> {
        if !allowed_from.contains(&self.status) {
            return Err(invoice_transition(self.status, to));
        }
        self.status = to;
        Ok(())
    }
}

fn invoice_transition(from: InvoiceStatus, to: InvoiceStatus) -> BillingError {
    BillingError::InvalidTransition {
        entity: "invoice",
        from: from.as_str(),
        to: to.as_str(),
    }
}

fn quote_transition(from: QuoteStatus, to: QuoteStatus) -> BillingError {
    BillingError::InvalidTransition {
        entity: "quote",
        from: from.as_str(),
        to: to.as_str(),
    }
}

impl Quote {
    /// DRAFT → SENT.
    pub fn send(&mut self) -> Result<(), BillingError> {
        self.transition(&[QuoteStatus::Draft], QuoteStatus::Sent)
    }

    /// SENT → DECLINED.
    pub fn decline(&mut self) -> Result<(), BillingError> {
        self.transition(&[QuoteStatus::Sent], QuoteStatus::Declined)
    }

    /// DRAFT | SENT → CANCELLED.
    pub fn cancel(&mut self) -> Result<(), BillingError> {
        self.transition(&[QuoteStatus::Draft, QuoteStatus::Sent], QuoteStatus::Cancelled)
    }

    /// DRAFT | SENT → EXPIRED.
    pub fn expire(&mut self) -> Result<(), BillingError> {
        self.transition(&[QuoteStatus::Draft, QuoteStatus::Sent], QuoteStatus::Expired)
    }

    pub fn is_editable(&self) -> bool {
        self.status == QuoteStatus::Draft
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() > self.expiry_date
    }

    /// Replace all lines and the discount of a draft, recomputing totals.
    pub fn replace_items(
        &mut self,
        lines: Vec<LineItemInput>,
        discount_code: Option<String>,
        discount_amount: Money,
    ) -> Result<(), BillingError> {
        if !self.is_editable() {
            return Err(BillingError::NotEditable {
                entity: "quote",
                status: self.status.as_str(),
            });
        }
        let (items, totals) = compute_document(lines, discount_amount)?;
        self.items = items;
        self.discount_code = discount_code;
        self.set_totals(totals);
        Ok(())
    }

    /// Decide whether the quote may be accepted at `now`.
    ///
    /// Returns [`Acceptance::Expired`] instead of an error when the expiry date has
    /// passed, so the caller can persist the EXPIRED status before failing.
    pub fn check_acceptance(&self, now: DateTime<Utc>) -> Result<Acceptance, BillingError> {
        match self.status {
            QuoteStatus::Accepted | QuoteStatus::Converted => Err(BillingError::AlreadyAccepted),
            QuoteStatus::Expired => Err(BillingError::Expired(self.expiry_date)),
            QuoteStatus::Declined | QuoteStatus::Cancelled => {
                Err(quote_transition(self.status, QuoteStatus::Converted))
            }
            QuoteStatus::Draft | QuoteStatus::Sent if self.is_expired_at(now) => {
                Ok(Acceptance::Expired)
            }
            QuoteStatus::Draft | QuoteStatus::Sent => Ok(Acceptance::Convert),
        }
    }

    /// Record the conversion. ACCEPTED is skipped; the quote goes straight to CONVERTED.
    pub fn mark_converted(
        &mut self,
        invoice_id: InvoiceId,
        accepted_at: DateTime<Utc>,
        accepted_by: Option<String>,
    ) -> Result<(), BillingError> {
        self.transition(&[QuoteStatus::Draft, QuoteStatus::Sent], QuoteStatus::Converted)?;
        self.invoice_id = Some(invoice_id);
        self.accepted_at = Some(accepted_at);
        self.accepted_by = accepted_by;
        Ok(())
    }

    /// Payment due date for the converted invoice: quote date plus payment terms.
    pub fn invoice_due_date(&self, payment_terms_days: u32) -> Result<NaiveDate, BillingError> {
        self.date
            .checked_add_days(Days::new(u64::from(payment_terms_days)))
            .ok_or_else(|| {
                BillingError::Validation(format!(
                    "payment terms of {payment_terms_days} days overflow the calendar"
                ))
            })
    }

    fn transition(
        &mut self,
        allowed_from: &[QuoteStatus],
        to: QuoteStatus,
    ) -> Result<(), BillingError> {
        if !allowed_from.contains(&self.status) {
            return Err(quote_transition(self.status, to));
        }
        self.status = to;
        Ok(())
    }
}

/// Outcome of [`Quote::check_acceptance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Proceed with conversion.
    Convert,
    /// Expiry date has passed; mark EXPIRED and reject.
    Expired,
}

/// Opaque acceptance token derived from the company and the current time.
///
/// Not cryptographically strong; the random suffix only avoids collisions.
pub fn new_acceptance_token(company_id: CompanyId, now: DateTime<Utc>) -> String {
    let company = company_id.0.simple().to_string();
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}{:x}{}",
        &company[..8],
        now.timestamp_millis(),
        &nonce[..8]
    )
}
