//! Derives an invoice's paid amount and status from its matched payments.
//!
//! The paid amount is always recomputed from the full set of currently
//! matched payments, never incremented, so running reconciliation twice or
//! in any order gives the same result.

use tracing::info;

use crate::core::{BillingError, CompanyId, Invoice, InvoiceId, InvoiceStatus, Money, Payment};
use crate::store::Transaction;

/// Status implied by `paid` against `total`.
///
/// DRAFT and CANCELLED invoices keep their status; only the paid amount moves.
pub fn settlement_status(current: InvoiceStatus, paid: Money, total: Money) -> InvoiceStatus {
    if matches!(current, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
        return current;
    }
    if paid >= total {
        InvoiceStatus::Paid
    } else if paid > Money::ZERO {
        InvoiceStatus::PartialPaid
    } else {
        InvoiceStatus::Open
    }
}

/// Sum of the payments that currently count towards `invoice`.
pub fn matched_total(invoice: InvoiceId, payments: &[Payment]) -> Result<Money, BillingError> {
    payments
        .iter()
        .filter(|p| p.counts_towards(invoice))
        .try_fold(Money::ZERO, |acc, p| {
            acc.checked_add(p.amount)
                .ok_or_else(|| BillingError::Arithmetic(format!("paid amount of {invoice} overflows")))
        })
}

/// Recompute and store the paid amount and status of one invoice.
pub fn reconcile_invoice(
    tx: &mut dyn Transaction,
    company: CompanyId,
    invoice_id: InvoiceId,
) -> Result<Invoice, BillingError> {
    let mut invoice = tx
        .invoice(company, invoice_id)?
        .ok_or_else(|| BillingError::not_found("invoice", invoice_id))?;
    let payments = tx.payments_for_invoice(company, invoice_id)?;

    let paid = matched_total(invoice_id, &payments)?;
    let status = settlement_status(invoice.status, paid, invoice.total);
    if paid == invoice.paid_amount && status == invoice.status {
        return Ok(invoice);
    }

    info!(
        invoice_id = %invoice_id,
        from = invoice.status.as_str(),
        to = status.as_str(),
        paid = %paid,
        total = %invoice.total,
        "invoice reconciled"
    );
    invoice.paid_amount = paid;
    invoice.status = status;
    Ok(tx.update_invoice(&invoice)?)
}
