use serde::{Deserialize, Serialize};
use tracing::debug;

use super::reference::normalize_reference;
use crate::core::{CompanyId, Confidence, Invoice, InvoiceId, PaymentRecord};

/// Proposed match for one payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub invoice_id: Option<InvoiceId>,
    pub confidence: Confidence,
}

impl MatchResult {
    pub fn manual() -> Self {
        Self {
            invoice_id: None,
            confidence: Confidence::Manual,
        }
    }

    fn matched(invoice: &Invoice, confidence: Confidence) -> Self {
        Self {
            invoice_id: Some(invoice.id),
            confidence,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.invoice_id.is_some()
    }
}

/// Proposes an invoice for a payment using the unique-candidate-or-nothing tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentMatcher {
    date_window_days: i64,
}

impl Default for PaymentMatcher {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PaymentMatcher {
    /// `date_window_days` bounds the MEDIUM tier: |due date − value date| ≤ window.
    pub fn new(date_window_days: u32) -> Self {
        Self {
            date_window_days: i64::from(date_window_days),
        }
    }

    /// Match `record` against a read-only view of the company's invoices.
    ///
    /// Invoices of other companies in `invoices` are ignored.
    pub fn match_payment(
        &self,
        company: CompanyId,
        record: &PaymentRecord,
        invoices: &[Invoice],
    ) -> MatchResult {
        let scoped = || invoices.iter().filter(move |inv| inv.company_id == company);

        if let Some(reference) = record.reference.as_deref().and_then(normalize_reference) {
            let by_reference = scoped().filter(|inv| {
                inv.payment_reference
                    .as_deref()
                    .and_then(normalize_reference)
                    .is_some_and(|r| r == reference)
            });
            if let Some(invoice) = unique(by_reference) {
                debug!(invoice_id = %invoice.id, "payment matched by reference");
                return MatchResult::matched(invoice, Confidence::High);
            }
        }

        let same_amount =
            || scoped().filter(move |inv| inv.status.is_open() && inv.total == record.amount);

        let in_window = same_amount().filter(move |inv| {
            (inv.due_date - record.value_date).num_days().abs() <= self.date_window_days
        });
        if let Some(invoice) = unique(in_window) {
            debug!(invoice_id = %invoice.id, "payment matched by amount and due date");
            return MatchResult::matched(invoice, Confidence::Medium);
        }

        if let Some(invoice) = unique(same_amount()) {
            debug!(invoice_id = %invoice.id, "payment matched by amount");
            return MatchResult::matched(invoice, Confidence::Low);
        }

        debug!(amount = %record.amount, "no unique match, payment needs review");
        MatchResult::manual()
    }
}

/// The single element of `candidates`, or `None` for zero or several.
fn unique<'a>(mut candidates: impl Iterator<Item = &'a Invoice>) -> Option<&'a Invoice> {
    let first = candidates.next()?;
    match candidates.next() {
        Some(_) => None,
        None => Some(first),
    }
}
