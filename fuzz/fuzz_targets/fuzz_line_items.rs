#![no_main]

use belegfluss::core::*;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Vec<(i64, i64, i64, i64)>, i64)| {
    let (lines, discount) = input;
    let lines: Vec<LineItemInput> = lines
        .into_iter()
        .take(64)
        .map(|(qty, price, discount, vat)| {
            LineItemBuilder::new("fuzz", Quantity::from_thousandths(qty), "pcs", Money::from_minor(price))
                .discount(Rate::from_scaled(discount))
                .vat(Rate::from_scaled(vat))
                .build()
        })
        .collect();

    // Errors are fine, panics are bugs. Accepted documents must be consistent.
    if let Ok((items, totals)) = compute_document(lines, Money::from_minor(discount)) {
        assert!(validate_totals(&items, &totals).is_empty());
        assert!(!totals.total.is_negative());
    }
});
