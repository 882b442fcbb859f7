#![cfg(feature = "engine")]

use belegfluss::core::*;
use belegfluss::matching::{MatchResult, PaymentMatcher, normalize_reference};
use chrono::{Days, NaiveDate};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open_invoice(company: CompanyId, number: &str, total: i64, due: NaiveDate) -> Invoice {
    let mut invoice = InvoiceBuilder::new(company, CustomerId::new(), date(2024, 1, 15))
        .number(number)
        .due_date(due)
        .add_line(
            LineItemBuilder::new("Service", Quantity::units(1), "pcs", Money::from_minor(total))
                .build(),
        )
        .build()
        .unwrap();
    invoice.issue().unwrap();
    invoice
}

fn payment(amount: i64, value_date: NaiveDate) -> PaymentRecord {
    PaymentRecord::new(Money::from_minor(amount), value_date)
}

// --- Reference tier ---

#[test]
fn exact_reference_is_high() {
    let company = CompanyId::new();
    let mut invoice = open_invoice(company, "RE-2024-001", 1000, date(2024, 2, 15));
    invoice.payment_reference = Some("210000000003139471430009017".into());

    let record = payment(1000, date(2024, 2, 1)).reference("210000000003139471430009017");
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice.clone()]);
    assert_eq!(
        result,
        MatchResult {
            invoice_id: Some(invoice.id),
            confidence: Confidence::High,
        }
    );
}

#[test]
fn reference_match_ignores_amount_and_status() {
    let company = CompanyId::new();
    let mut invoice = open_invoice(company, "RE-2024-001", 1000, date(2024, 2, 15));
    invoice.payment_reference = Some("RF18539007547034".into());
    invoice.status = InvoiceStatus::Paid;

    let record = payment(250, date(2024, 6, 1)).reference("RF18 5390 0754 7034");
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice.clone()]);
    assert_eq!(result.confidence, Confidence::High);
    assert_eq!(result.invoice_id, Some(invoice.id));
}

#[test]
fn blank_reference_is_no_reference() {
    assert_eq!(normalize_reference(" \t "), None);

    let company = CompanyId::new();
    let mut invoice = open_invoice(company, "RE-2024-001", 1000, date(2024, 2, 15));
    invoice.payment_reference = Some("   ".into());
    let record = payment(999, date(2024, 2, 15)).reference("  ");
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice]);
    assert_eq!(result, MatchResult::manual());
}

// --- Amount tiers ---

#[test]
fn ambiguous_amount_is_manual() {
    let company = CompanyId::new();
    // Both are due inside the window, so the date tier and the amount tier tie.
    let a = open_invoice(company, "RE-2024-001", 2500, date(2024, 2, 15));
    let b = open_invoice(company, "RE-2024-002", 2500, date(2024, 2, 16));

    let result = PaymentMatcher::default().match_payment(company, &payment(2500, date(2024, 2, 15)), &[a, b]);
    assert_eq!(result.confidence, Confidence::Manual);
    assert_eq!(result.invoice_id, None);
}

#[test]
fn amount_near_due_date_is_medium() {
    let company = CompanyId::new();
    let due = date(2024, 2, 15);
    let invoice = open_invoice(company, "RE-2024-001", 5000, due);

    let record = payment(5000, due - Days::new(1));
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice.clone()]);
    assert_eq!(result.confidence, Confidence::Medium);
    assert_eq!(result.invoice_id, Some(invoice.id));
}

#[test]
fn late_unique_amount_is_low() {
    let company = CompanyId::new();
    let due = date(2024, 2, 15);
    let invoice = open_invoice(company, "RE-2024-001", 5000, due);

    let record = payment(5000, due + Days::new(10));
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice.clone()]);
    assert_eq!(result.confidence, Confidence::Low);
    assert_eq!(result.invoice_id, Some(invoice.id));
}

#[test]
fn late_ambiguous_amount_is_manual() {
    let company = CompanyId::new();
    let due = date(2024, 2, 15);
    let invoice = open_invoice(company, "RE-2024-001", 5000, due);
    let other = open_invoice(company, "RE-2024-002", 5000, date(2024, 4, 30));

    let record = payment(5000, due + Days::new(10));
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice, other]);
    assert_eq!(result, MatchResult::manual());
}

#[test]
fn medium_wins_over_wider_tie() {
    // Two invoices share the amount, only one is due near the value date.
    let company = CompanyId::new();
    let near = open_invoice(company, "RE-2024-001", 5000, date(2024, 2, 15));
    let far = open_invoice(company, "RE-2024-002", 5000, date(2024, 5, 15));

    let record = payment(5000, date(2024, 2, 16));
    let result = PaymentMatcher::default().match_payment(company, &record, &[near.clone(), far]);
    assert_eq!(result.confidence, Confidence::Medium);
    assert_eq!(result.invoice_id, Some(near.id));
}

#[test]
fn wider_window_is_configurable() {
    let company = CompanyId::new();
    let due = date(2024, 2, 15);
    let invoice = open_invoice(company, "RE-2024-001", 5000, due);

    let record = payment(5000, due + Days::new(5));
    let result = PaymentMatcher::new(5).match_payment(company, &record, &[invoice]);
    assert_eq!(result.confidence, Confidence::Medium);
}

#[test]
fn partially_paid_invoice_is_still_a_candidate() {
    let company = CompanyId::new();
    let mut invoice = open_invoice(company, "RE-2024-001", 5000, date(2024, 2, 15));
    invoice.status = InvoiceStatus::PartialPaid;

    let record = payment(5000, date(2024, 2, 15));
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice]);
    assert_eq!(result.confidence, Confidence::Medium);
}
