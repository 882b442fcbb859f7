use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::rows::*;
use super::{Store, StoreError, Transaction};
use crate::core::{
    BillingError, CompanyId, Customer, CustomerId, DocumentKind, DocumentNumberSequence, Invoice,
    InvoiceId, Payment, PaymentId, Quote, QuoteId,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: HashMap<Uuid, CustomerRow>,
    invoices: HashMap<Uuid, InvoiceRow>,
    quotes: HashMap<Uuid, QuoteRow>,
    line_items: HashMap<Uuid, Vec<LineItemRow>>,
    /// Insertion order is kept so batch lookups return records in import order.
    payments: Vec<PaymentRow>,
    sequences: HashMap<(Uuid, DocumentKind), DocumentNumberSequence>,
}

/// Store backed by in-process maps.
///
/// A transaction works on a snapshot of all tables while holding the lock and
/// swaps it in on success, so units of work are serialized and all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    fn transaction<T, F>(&self, work: F) -> Result<T, BillingError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, BillingError>,
    {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))?;
        let mut tx = MemoryTx {
            tables: guard.clone(),
        };
        let out = work(&mut tx)?;
        *guard = tx.tables;
        Ok(out)
    }
}

struct MemoryTx {
    tables: Tables,
}

impl MemoryTx {
    fn items_of(&self, document: Uuid) -> Vec<LineItemRow> {
        self.tables
            .line_items
            .get(&document)
            .cloned()
            .unwrap_or_default()
    }

    fn load_invoice(&self, row: &InvoiceRow) -> Result<Invoice, StoreError> {
        invoice_from_rows(row.clone(), self.items_of(row.id))
    }
}

impl Transaction for MemoryTx {
    fn customer(&self, company: CompanyId, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        self.tables
            .customers
            .get(&id.0)
            .filter(|row| row.company_id == company.0)
            .cloned()
            .map(customer_from_row)
            .transpose()
    }

    fn insert_customer(&mut self, customer: &Customer) -> Result<(), StoreError> {
        if self.tables.customers.contains_key(&customer.id.0) {
            return Err(StoreError::Duplicate {
                entity: "customer",
                key: customer.id.to_string(),
            });
        }
        self.tables
            .customers
            .insert(customer.id.0, customer_to_row(customer));
        Ok(())
    }

    fn invoice(&self, company: CompanyId, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        self.tables
            .invoices
            .get(&id.0)
            .filter(|row| row.company_id == company.0)
            .map(|row| self.load_invoice(row))
            .transpose()
    }

    fn invoices(&self, company: CompanyId) -> Result<Vec<Invoice>, StoreError> {
        let mut invoices = self
            .tables
            .invoices
            .values()
            .filter(|row| row.company_id == company.0)
            .map(|row| self.load_invoice(row))
            .collect::<Result<Vec<_>, _>>()?;
        invoices.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(invoices)
    }

    fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        let duplicate = self.tables.invoices.values().any(|row| {
            row.id == invoice.id.0
                || (row.company_id == invoice.company_id.0 && row.number == invoice.number)
        });
        if duplicate {
            return Err(StoreError::Duplicate {
                entity: "invoice",
                key: invoice.number.clone(),
            });
        }
        let (row, items) = invoice_to_rows(invoice)?;
        self.tables.line_items.insert(row.id, items);
        self.tables.invoices.insert(row.id, row);
        Ok(())
    }

    fn update_invoice(&mut self, invoice: &Invoice) -> Result<Invoice, StoreError> {
        let conflict = || StoreError::Conflict {
            entity: "invoice",
            id: invoice.id.to_string(),
        };
        let stored = self
            .tables
            .invoices
            .get(&invoice.id.0)
            .filter(|row| row.company_id == invoice.company_id.0)
            .ok_or_else(conflict)?;
        if u64::try_from(stored.version).ok() != Some(invoice.version) {
            return Err(conflict());
        }

        let mut updated = invoice.clone();
        updated.version += 1;
        let (row, items) = invoice_to_rows(&updated)?;
        self.tables.line_items.insert(row.id, items);
        self.tables.invoices.insert(row.id, row);
        Ok(updated)
    }

    fn quote(&self, company: CompanyId, id: QuoteId) -> Result<Option<Quote>, StoreError> {
        self.tables
            .quotes
            .get(&id.0)
            .filter(|row| row.company_id == company.0)
            .map(|row| quote_from_rows(row.clone(), self.items_of(row.id)))
            .transpose()
    }

    fn quote_by_token(&self, token: &str) -> Result<Option<Quote>, StoreError> {
        self.tables
            .quotes
            .values()
            .find(|row| row.acceptance_token == token)
            .map(|row| quote_from_rows(row.clone(), self.items_of(row.id)))
            .transpose()
    }

    fn insert_quote(&mut self, quote: &Quote) -> Result<(), StoreError> {
        let duplicate = self.tables.quotes.values().any(|row| {
            row.id == quote.id.0
                || row.acceptance_token == quote.acceptance_token
                || (row.company_id == quote.company_id.0 && row.number == quote.number)
        });
        if duplicate {
            return Err(StoreError::Duplicate {
                entity: "quote",
                key: quote.number.clone(),
            });
        }
        let (row, items) = quote_to_rows(quote);
        self.tables.line_items.insert(row.id, items);
        self.tables.quotes.insert(row.id, row);
        Ok(())
    }

    fn update_quote(&mut self, quote: &Quote) -> Result<(), StoreError> {
        let exists = self
            .tables
            .quotes
            .get(&quote.id.0)
            .is_some_and(|row| row.company_id == quote.company_id.0);
        if !exists {
            return Err(StoreError::Conflict {
                entity: "quote",
                id: quote.id.to_string(),
            });
        }
        let (row, items) = quote_to_rows(quote);
        self.tables.line_items.insert(row.id, items);
        self.tables.quotes.insert(row.id, row);
        Ok(())
    }

    fn payment(&self, company: CompanyId, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        self.tables
            .payments
            .iter()
            .find(|row| row.id == id.0 && row.company_id == company.0)
            .cloned()
            .map(payment_from_row)
            .transpose()
    }

    fn payments_for_invoice(
        &self,
        company: CompanyId,
        invoice: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError> {
        self.tables
            .payments
            .iter()
            .filter(|row| row.company_id == company.0 && row.invoice_id == Some(invoice.0))
            .cloned()
            .map(payment_from_row)
            .collect()
    }

    fn payments_in_batch(&self, company: CompanyId, tag: &str) -> Result<Vec<Payment>, StoreError> {
        self.tables
            .payments
            .iter()
            .filter(|row| row.company_id == company.0 && row.import_batch.as_deref() == Some(tag))
            .cloned()
            .map(payment_from_row)
            .collect()
    }

    fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if self.tables.payments.iter().any(|row| row.id == payment.id.0) {
            return Err(StoreError::Duplicate {
                entity: "payment",
                key: payment.id.to_string(),
            });
        }
        self.tables.payments.push(payment_to_row(payment));
        Ok(())
    }

    fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        let slot = self
            .tables
            .payments
            .iter_mut()
            .find(|row| row.id == payment.id.0 && row.company_id == payment.company_id.0)
            .ok_or_else(|| StoreError::Conflict {
                entity: "payment",
                id: payment.id.to_string(),
            })?;
        *slot = payment_to_row(payment);
        Ok(())
    }

    fn number_sequence(
        &self,
        company: CompanyId,
        kind: DocumentKind,
    ) -> Result<Option<DocumentNumberSequence>, StoreError> {
        Ok(self.tables.sequences.get(&(company.0, kind)).cloned())
    }

    fn save_number_sequence(
        &mut self,
        company: CompanyId,
        sequence: &DocumentNumberSequence,
    ) -> Result<(), StoreError> {
        self.tables
            .sequences
            .insert((company.0, sequence.kind()), sequence.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InvoiceBuilder, LineItemBuilder, Money, PaymentRecord, Quantity};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(company: CompanyId, number: &str) -> Invoice {
        InvoiceBuilder::new(company, CustomerId::new(), date(2024, 1, 10))
            .number(number)
            .due_date(date(2024, 2, 10))
            .add_line(
                LineItemBuilder::new("Item", Quantity::units(1), "pcs", Money::from_minor(1000))
                    .build(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        let company = CompanyId::new();
        let inv = invoice(company, "RE-2024-001");

        let result: Result<(), BillingError> = store.transaction(|tx| {
            tx.insert_invoice(&inv)?;
            Err(BillingError::Validation("abort".into()))
        });
        assert!(result.is_err());

        let found = store.transaction(|tx| Ok(tx.invoice(company, inv.id)?)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn reads_are_company_scoped() {
        let store = InMemoryStore::new();
        let company = CompanyId::new();
        let inv = invoice(company, "RE-2024-001");
        store.transaction(|tx| Ok(tx.insert_invoice(&inv)?)).unwrap();

        let other = store
            .transaction(|tx| Ok(tx.invoice(CompanyId::new(), inv.id)?))
            .unwrap();
        assert!(other.is_none());
    }

    #[test]
    fn invoice_numbers_are_unique_per_company() {
        let store = InMemoryStore::new();
        let company = CompanyId::new();
        store
            .transaction(|tx| Ok(tx.insert_invoice(&invoice(company, "RE-2024-001"))?))
            .unwrap();
        let err = store
            .transaction(|tx| Ok(tx.insert_invoice(&invoice(company, "RE-2024-001"))?))
            .unwrap_err();
        assert!(matches!(err, BillingError::Storage(StoreError::Duplicate { .. })));

        store
            .transaction(|tx| Ok(tx.insert_invoice(&invoice(CompanyId::new(), "RE-2024-001"))?))
            .unwrap();
    }

    #[test]
    fn stale_invoice_version_conflicts() {
        let store = InMemoryStore::new();
        let company = CompanyId::new();
        let inv = invoice(company, "RE-2024-001");
        store.transaction(|tx| Ok(tx.insert_invoice(&inv)?)).unwrap();

        let updated = store.transaction(|tx| Ok(tx.update_invoice(&inv)?)).unwrap();
        assert_eq!(updated.version, 1);

        let err = store.transaction(|tx| Ok(tx.update_invoice(&inv)?)).unwrap_err();
        assert!(matches!(err, BillingError::Storage(StoreError::Conflict { .. })));
    }

    #[test]
    fn batch_lookup_keeps_import_order() {
        let store = InMemoryStore::new();
        let company = CompanyId::new();
        let payments: Vec<Payment> = (1..=3)
            .map(|i| {
                let mut p = Payment::from_record(
                    company,
                    PaymentRecord::new(Money::from_minor(i * 100), date(2024, 1, 1)),
                );
                p.import_batch = Some("batch-1".into());
                p
            })
            .collect();
        store
            .transaction(|tx| {
                for p in &payments {
                    tx.insert_payment(p)?;
                }
                Ok(())
            })
            .unwrap();

        let found = store
            .transaction(|tx| Ok(tx.payments_in_batch(company, "batch-1")?))
            .unwrap();
        let amounts: Vec<i64> = found.iter().map(|p| p.amount.minor()).collect();
        assert_eq!(amounts, vec![100, 200, 300]);
    }
}
