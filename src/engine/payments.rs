use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{Clock, Engine, ReferenceGenerator, logged};
use crate::core::{
    BillingError, CompanyId, Confidence, ErrorKind, InvoiceId, Money, Payment, PaymentId,
    PaymentRecord,
};
use crate::matching::MatchResult;
use crate::reconcile::reconcile_invoice;
use crate::store::{Store, Transaction};

/// Outcome of [`Engine::import_payments`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Records submitted, including failed ones.
    pub total: usize,
    pub auto_matched: usize,
    /// Persisted but unmatched; waiting for manual assignment.
    pub needs_review: usize,
    pub batch_tag: String,
    pub failures: Vec<RecordFailure>,
}

impl ImportReport {
    pub fn persisted(&self) -> usize {
        self.auto_matched + self.needs_review
    }
}

/// A record the import skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Position of the record in the submitted list.
    pub index: usize,
    pub kind: ErrorKind,
    pub reason: String,
}

impl<S, R, C> Engine<S, R, C>
where
    S: Store,
    R: ReferenceGenerator,
    C: Clock,
{
    /// Propose an invoice for `record` without persisting anything.
    #[instrument(skip(self, record), fields(amount = %record.amount))]
    pub fn match_payment(
        &self,
        company: CompanyId,
        record: &PaymentRecord,
    ) -> Result<MatchResult, BillingError> {
        let result = self.store.transaction(|tx| {
            let invoices = tx.invoices(company)?;
            Ok(self.config.matcher().match_payment(company, record, &invoices))
        });
        logged("match_payment", result)
    }

    /// Persist a payment, match it and reconcile the matched invoice.
    #[instrument(skip(self, record), fields(amount = %record.amount))]
    pub fn record_payment(
        &self,
        company: CompanyId,
        record: PaymentRecord,
    ) -> Result<Payment, BillingError> {
        let result = self
            .store
            .transaction(|tx| self.record_in(tx, company, record, None));
        logged("record_payment", result)
    }

    /// Assign a payment to an invoice by hand (MANUAL confidence).
    ///
    /// Both the newly assigned invoice and any previously assigned one are
    /// reconciled.
    #[instrument(skip(self))]
    pub fn assign_payment(
        &self,
        company: CompanyId,
        payment: PaymentId,
        invoice: InvoiceId,
    ) -> Result<Payment, BillingError> {
        let result = self.store.transaction(|tx| {
            let mut stored = load_payment(tx, company, payment)?;
            if tx.invoice(company, invoice)?.is_none() {
                return Err(BillingError::not_found("invoice", invoice));
            }
            let previous = stored.invoice_id.filter(|&id| id != invoice);

            stored.invoice_id = Some(invoice);
            stored.is_matched = true;
            stored.confidence = Confidence::Manual;
            tx.update_payment(&stored)?;

            reconcile_invoice(tx, company, invoice)?;
            if let Some(previous) = previous {
                reconcile_invoice(tx, company, previous)?;
            }
            Ok(stored)
        });
        let stored = logged("assign_payment", result)?;
        info!(payment_id = %payment, invoice_id = %invoice, "payment assigned");
        Ok(stored)
    }

    /// Detach a payment from its invoice and reconcile that invoice.
    #[instrument(skip(self))]
    pub fn unassign_payment(
        &self,
        company: CompanyId,
        payment: PaymentId,
    ) -> Result<Payment, BillingError> {
        let result = self.store.transaction(|tx| {
            let mut stored = load_payment(tx, company, payment)?;
            let previous = stored.invoice_id.take();
            stored.is_matched = false;
            stored.confidence = Confidence::Manual;
            tx.update_payment(&stored)?;

            if let Some(previous) = previous {
                reconcile_invoice(tx, company, previous)?;
            }
            Ok(stored)
        });
        let stored = logged("unassign_payment", result)?;
        info!(payment_id = %payment, "payment unassigned");
        Ok(stored)
    }

    /// Payments imported under `batch_tag`, in import order.
    #[instrument(skip(self))]
    pub fn payments_in_batch(
        &self,
        company: CompanyId,
        batch_tag: &str,
    ) -> Result<Vec<Payment>, BillingError> {
        let result = self
            .store
            .transaction(|tx| Ok(tx.payments_in_batch(company, batch_tag)?));
        logged("payments_in_batch", result)
    }

    /// Import a list of bank records one by one.
    ///
    /// Each record is persisted, matched and reconciled in its own
    /// transaction. A failing record is reported and skipped; the batch never
    /// stops early. Without a tag, one is generated from the clock.
    #[instrument(skip(self, records, batch_tag), fields(records = records.len()))]
    pub fn import_payments(
        &self,
        company: CompanyId,
        records: Vec<PaymentRecord>,
        batch_tag: Option<String>,
    ) -> ImportReport {
        let batch_tag = batch_tag
            .filter(|tag| !tag.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{}{}",
                    self.config.batch_tag_prefix,
                    self.clock.now().format("%Y%m%dT%H%M%S%3fZ")
                )
            });

        let mut report = ImportReport {
            total: records.len(),
            auto_matched: 0,
            needs_review: 0,
            batch_tag,
            failures: Vec::new(),
        };

        for (index, record) in records.into_iter().enumerate() {
            let tag = Some(report.batch_tag.as_str());
            let result = self
                .store
                .transaction(|tx| self.record_in(tx, company, record, tag));
            match logged("import_payments", result) {
                Ok(payment) if payment.is_matched => report.auto_matched += 1,
                Ok(_) => report.needs_review += 1,
                Err(err) => {
                    warn!(index, error = %err, "payment record skipped");
                    report.failures.push(RecordFailure {
                        index,
                        kind: err.kind(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            batch_tag = %report.batch_tag,
            total = report.total,
            auto_matched = report.auto_matched,
            needs_review = report.needs_review,
            failed = report.failures.len(),
            "payment import finished"
        );
        report
    }

    fn record_in(
        &self,
        tx: &mut dyn Transaction,
        company: CompanyId,
        record: PaymentRecord,
        batch_tag: Option<&str>,
    ) -> Result<Payment, BillingError> {
        if record.amount <= Money::ZERO {
            return Err(BillingError::Validation(format!(
                "payment amount must be positive, got {}",
                record.amount
            )));
        }

        let invoices = tx.invoices(company)?;
        let matched = self.config.matcher().match_payment(company, &record, &invoices);

        let mut payment = Payment::from_record(company, record);
        payment.import_batch = batch_tag.map(str::to_owned);
        tx.insert_payment(&payment)?;

        if let Some(invoice) = matched.invoice_id {
            payment.invoice_id = Some(invoice);
            payment.is_matched = true;
            payment.confidence = matched.confidence;
            tx.update_payment(&payment)?;
            reconcile_invoice(tx, company, invoice)?;
        }
        debug!(
            payment_id = %payment.id,
            confidence = payment.confidence.as_str(),
            "payment recorded"
        );
        Ok(payment)
    }
}

fn load_payment(
    tx: &mut dyn Transaction,
    company: CompanyId,
    id: PaymentId,
) -> Result<Payment, BillingError> {
    tx.payment(company, id)?
        .ok_or_else(|| BillingError::not_found("payment", id))
}
