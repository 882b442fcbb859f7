#![no_main]

use belegfluss::core::*;
use belegfluss::matching::{PaymentMatcher, normalize_reference};
use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (String, String, i64)| {
    let (invoice_reference, payment_reference, amount) = input;
    let Some(date) = NaiveDate::from_ymd_opt(2024, 1, 1) else {
        return;
    };
    let company = CompanyId::new();
    let Ok(mut invoice) = InvoiceBuilder::new(company, CustomerId::new(), date)
        .number("RE-2024-001")
        .due_date(date)
        .add_line(LineItemBuilder::new("fuzz", Quantity::units(1), "pcs", Money::from_minor(100)).build())
        .payment_reference(invoice_reference.clone())
        .build()
    else {
        return;
    };
    invoice.status = InvoiceStatus::Open;

    let record = PaymentRecord::new(Money::from_minor(amount), date).reference(payment_reference.clone());
    let result = PaymentMatcher::default().match_payment(company, &record, &[invoice]);

    let same = normalize_reference(&invoice_reference).is_some()
        && normalize_reference(&invoice_reference) == normalize_reference(&payment_reference);
    if same {
        assert_eq!(result.confidence, Confidence::High);
    }
});
