//! Storage rows and the mapping between them and domain types.
//!
//! Rows mirror a relational layout: snake_case columns, plain integers for
//! money and rates, status enums as text, line items in their own table keyed
//! by the owning document. Mapping a row back into the domain re-checks the
//! money invariants so a bad row never reaches the engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;
use crate::core::{
    CompanyId, Confidence, Customer, CustomerId, DocumentTotals, Invoice, InvoiceId,
    InvoiceStatus, LineItem, Money, Payment, PaymentId, Quantity, Quote, QuoteId, QuoteStatus,
    Rate, validate_totals,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub payment_terms_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRow {
    pub document_id: Uuid,
    pub description: String,
    pub quantity: i64,
    pub unit: String,
    pub unit_price: i64,
    pub discount: i64,
    pub vat_rate: i64,
    pub line_total: i64,
    pub vat_amount: i64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub number: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub subtotal: i64,
    pub vat_amount: i64,
    pub total: i64,
    pub paid_amount: i64,
    pub payment_reference: Option<String>,
    pub reminder_level: i16,
    pub discount_code: Option<String>,
    pub discount_amount: i64,
    pub quote_id: Option<Uuid>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub number: String,
    pub date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: String,
    pub subtotal: i64,
    pub vat_amount: i64,
    pub total: i64,
    pub discount_code: Option<String>,
    pub discount_amount: i64,
    pub acceptance_token: String,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<String>,
    pub invoice_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount: i64,
    pub value_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub confidence: String,
    pub is_matched: bool,
    pub import_batch: Option<String>,
    pub raw_data: Option<String>,
}

fn corrupt(entity: &'static str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        entity,
        reason: reason.into(),
    }
}

fn non_negative(entity: &'static str, column: &str, value: i64) -> Result<Money, StoreError> {
    if value < 0 {
        return Err(corrupt(entity, format!("{column} is negative ({value})")));
    }
    Ok(Money::from_minor(value))
}

pub fn customer_to_row(customer: &Customer) -> CustomerRow {
    CustomerRow {
        id: customer.id.0,
        company_id: customer.company_id.0,
        name: customer.name.clone(),
        payment_terms_days: i64::from(customer.payment_terms_days),
    }
}

pub fn customer_from_row(row: CustomerRow) -> Result<Customer, StoreError> {
    let payment_terms_days = u32::try_from(row.payment_terms_days)
        .map_err(|_| corrupt("customer", "payment_terms_days out of range"))?;
    Ok(Customer {
        id: CustomerId(row.id),
        company_id: CompanyId(row.company_id),
        name: row.name,
        payment_terms_days,
    })
}

pub fn line_items_to_rows(document_id: Uuid, items: &[LineItem]) -> Vec<LineItemRow> {
    items
        .iter()
        .map(|item| LineItemRow {
            document_id,
            description: item.description.clone(),
            quantity: item.quantity.thousandths(),
            unit: item.unit.clone(),
            unit_price: item.unit_price.minor(),
            discount: item.discount.scaled(),
            vat_rate: item.vat_rate.scaled(),
            line_total: item.line_total.minor(),
            vat_amount: item.vat_amount.minor(),
            sort_order: i64::from(item.sort_order),
        })
        .collect()
}

/// Map line rows back, ordered by `sort_order`.
pub fn line_items_from_rows(mut rows: Vec<LineItemRow>) -> Result<Vec<LineItem>, StoreError> {
    rows.sort_by_key(|r| r.sort_order);
    rows.into_iter()
        .map(|row| {
            let discount = Rate::from_scaled(row.discount);
            let vat_rate = Rate::from_scaled(row.vat_rate);
            if !discount.is_valid() || !vat_rate.is_valid() {
                return Err(corrupt("line_item", "rate outside 0–10000"));
            }
            if row.quantity <= 0 {
                return Err(corrupt("line_item", "quantity is not positive"));
            }
            let sort_order = u32::try_from(row.sort_order)
                .map_err(|_| corrupt("line_item", "sort_order out of range"))?;
            Ok(LineItem {
                description: row.description,
                quantity: Quantity::from_thousandths(row.quantity),
                unit: row.unit,
                unit_price: non_negative("line_item", "unit_price", row.unit_price)?,
                discount,
                vat_rate,
                line_total: non_negative("line_item", "line_total", row.line_total)?,
                vat_amount: non_negative("line_item", "vat_amount", row.vat_amount)?,
                sort_order,
            })
        })
        .collect()
}

fn check_totals(
    entity: &'static str,
    items: &[LineItem],
    totals: &DocumentTotals,
) -> Result<(), StoreError> {
    let errors = validate_totals(items, totals);
    if errors.is_empty() {
        Ok(())
    } else {
        let reason = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(corrupt(entity, reason))
    }
}

/// Fails when the version counter no longer fits the column.
pub fn invoice_to_rows(invoice: &Invoice) -> Result<(InvoiceRow, Vec<LineItemRow>), StoreError> {
    let version = i64::try_from(invoice.version)
        .map_err(|_| corrupt("invoice", format!("version {} exceeds column range", invoice.version)))?;
    let row = InvoiceRow {
        id: invoice.id.0,
        company_id: invoice.company_id.0,
        customer_id: invoice.customer_id.0,
        number: invoice.number.clone(),
        date: invoice.date,
        due_date: invoice.due_date,
        status: invoice.status.as_str().to_string(),
        subtotal: invoice.subtotal.minor(),
        vat_amount: invoice.vat_amount.minor(),
        total: invoice.total.minor(),
        paid_amount: invoice.paid_amount.minor(),
        payment_reference: invoice.payment_reference.clone(),
        reminder_level: i16::from(invoice.reminder_level),
        discount_code: invoice.discount_code.clone(),
        discount_amount: invoice.discount_amount.minor(),
        quote_id: invoice.quote_id.map(|q| q.0),
        version,
    };
    Ok((row, line_items_to_rows(invoice.id.0, &invoice.items)))
}

pub fn invoice_from_rows(row: InvoiceRow, items: Vec<LineItemRow>) -> Result<Invoice, StoreError> {
    let status = InvoiceStatus::parse(&row.status)
        .ok_or_else(|| corrupt("invoice", format!("unknown status {:?}", row.status)))?;
    let invoice = Invoice {
        id: InvoiceId(row.id),
        company_id: CompanyId(row.company_id),
        customer_id: CustomerId(row.customer_id),
        number: row.number,
        date: row.date,
        due_date: row.due_date,
        status,
        items: line_items_from_rows(items)?,
        subtotal: non_negative("invoice", "subtotal", row.subtotal)?,
        vat_amount: non_negative("invoice", "vat_amount", row.vat_amount)?,
        total: non_negative("invoice", "total", row.total)?,
        paid_amount: non_negative("invoice", "paid_amount", row.paid_amount)?,
        payment_reference: row.payment_reference,
        reminder_level: u8::try_from(row.reminder_level)
            .map_err(|_| corrupt("invoice", "reminder_level out of range"))?,
        discount_code: row.discount_code,
        discount_amount: non_negative("invoice", "discount_amount", row.discount_amount)?,
        quote_id: row.quote_id.map(QuoteId),
        version: u64::try_from(row.version)
            .map_err(|_| corrupt("invoice", "version is negative"))?,
    };
    check_totals("invoice", &invoice.items, &invoice.totals())?;
    Ok(invoice)
}

pub fn quote_to_rows(quote: &Quote) -> (QuoteRow, Vec<LineItemRow>) {
    let row = QuoteRow {
        id: quote.id.0,
        company_id: quote.company_id.0,
        customer_id: quote.customer_id.0,
        number: quote.number.clone(),
        date: quote.date,
        expiry_date: quote.expiry_date,
        status: quote.status.as_str().to_string(),
        subtotal: quote.subtotal.minor(),
        vat_amount: quote.vat_amount.minor(),
        total: quote.total.minor(),
        discount_code: quote.discount_code.clone(),
        discount_amount: quote.discount_amount.minor(),
        acceptance_token: quote.acceptance_token.clone(),
        accepted_at: quote.accepted_at,
        accepted_by: quote.accepted_by.clone(),
        invoice_id: quote.invoice_id.map(|i| i.0),
    };
    (row, line_items_to_rows(quote.id.0, &quote.items))
}

pub fn quote_from_rows(row: QuoteRow, items: Vec<LineItemRow>) -> Result<Quote, StoreError> {
    let status = QuoteStatus::parse(&row.status)
        .ok_or_else(|| corrupt("quote", format!("unknown status {:?}", row.status)))?;
    if status == QuoteStatus::Converted && row.invoice_id.is_none() {
        return Err(corrupt("quote", "converted quote without invoice link"));
    }
    let quote = Quote {
        id: QuoteId(row.id),
        company_id: CompanyId(row.company_id),
        customer_id: CustomerId(row.customer_id),
        number: row.number,
        date: row.date,
        expiry_date: row.expiry_date,
        status,
        items: line_items_from_rows(items)?,
        subtotal: non_negative("quote", "subtotal", row.subtotal)?,
        vat_amount: non_negative("quote", "vat_amount", row.vat_amount)?,
        total: non_negative("quote", "total", row.total)?,
        discount_code: row.discount_code,
        discount_amount: non_negative("quote", "discount_amount", row.discount_amount)?,
        acceptance_token: row.acceptance_token,
        accepted_at: row.accepted_at,
        accepted_by: row.accepted_by,
        invoice_id: row.invoice_id.map(InvoiceId),
    };
    check_totals("quote", &quote.items, &quote.totals())?;
    Ok(quote)
}

pub fn payment_to_row(payment: &Payment) -> PaymentRow {
    PaymentRow {
        id: payment.id.0,
        company_id: payment.company_id.0,
        invoice_id: payment.invoice_id.map(|i| i.0),
        amount: payment.amount.minor(),
        value_date: payment.value_date,
        reference: payment.reference.clone(),
        description: payment.description.clone(),
        confidence: payment.confidence.as_str().to_string(),
        is_matched: payment.is_matched,
        import_batch: payment.import_batch.clone(),
        raw_data: payment.raw.clone(),
    }
}

pub fn payment_from_row(row: PaymentRow) -> Result<Payment, StoreError> {
    let confidence = Confidence::parse(&row.confidence)
        .ok_or_else(|| corrupt("payment", format!("unknown confidence {:?}", row.confidence)))?;
    if row.is_matched && row.invoice_id.is_none() {
        return Err(corrupt("payment", "matched payment without invoice"));
    }
    Ok(Payment {
        id: PaymentId(row.id),
        company_id: CompanyId(row.company_id),
        invoice_id: row.invoice_id.map(InvoiceId),
        amount: non_negative("payment", "amount", row.amount)?,
        value_date: row.value_date,
        reference: row.reference,
        description: row.description,
        confidence,
        is_matched: row.is_matched,
        import_batch: row.import_batch,
        raw: row.raw_data,
    })
}
