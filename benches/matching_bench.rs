use chrono::{Days, NaiveDate, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use belegfluss::core::*;
use belegfluss::engine::{Engine, EngineConfig, FixedClock};
use belegfluss::matching::PaymentMatcher;
use belegfluss::store::InMemoryStore;

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn build_10_line_invoice() -> Invoice {
    let mut builder = InvoiceBuilder::new(CompanyId::new(), CustomerId::new(), test_date())
        .number("BENCH-001")
        .due_date(test_date() + Days::new(30));

    for i in 1..=10 {
        builder = builder.add_line(
            LineItemBuilder::new(format!("Service item {i}"), Quantity::units(5), "h", Money::from_minor(12_000))
                .discount(Rate::from_scaled(500))
                .vat(Rate::from_scaled(810))
                .build(),
        );
    }

    builder.build().unwrap()
}

/// 1000 open invoices of one company, each with a distinct amount, due date
/// and reference.
fn build_open_invoices(company: CompanyId) -> Vec<Invoice> {
    (1..=1000u64)
        .map(|n| {
            let mut invoice = InvoiceBuilder::new(company, CustomerId::new(), test_date())
                .number(format!("RE-2024-{n:04}"))
                .due_date(test_date() + Days::new(n % 90))
                .payment_reference(format!("21 00000 00003 13947 14300 {n:05}"))
                .add_line(
                    LineItemBuilder::new("Consulting", Quantity::units(1), "h", Money::from_minor(10_000 + n as i64))
                        .build(),
                )
                .build()
                .unwrap();
            invoice.issue().unwrap();
            invoice
        })
        .collect()
}

fn bench_build_invoice(c: &mut Criterion) {
    c.bench_function("build_invoice_10_lines", |b| {
        b.iter(|| black_box(build_10_line_invoice()));
    });
}

fn bench_match_by_reference(c: &mut Criterion) {
    let company = CompanyId::new();
    let invoices = build_open_invoices(company);
    let record = PaymentRecord::new(Money::from_minor(1), test_date()).reference("210000000003139471430000777");
    let matcher = PaymentMatcher::default();

    c.bench_function("match_reference_1000_invoices", |b| {
        b.iter(|| black_box(matcher.match_payment(company, black_box(&record), black_box(&invoices))));
    });
}

fn bench_match_by_amount(c: &mut Criterion) {
    let company = CompanyId::new();
    let invoices = build_open_invoices(company);
    let record = PaymentRecord::new(Money::from_minor(10_500), test_date() + Days::new(500 % 90));
    let matcher = PaymentMatcher::default();

    c.bench_function("match_amount_1000_invoices", |b| {
        b.iter(|| black_box(matcher.match_payment(company, black_box(&record), black_box(&invoices))));
    });
}

fn bench_import_batch(c: &mut Criterion) {
    let references = |_: CompanyId, number: &str| Ok::<_, BillingError>(format!("REF{number}"));
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap());
    let engine = Engine::new(InMemoryStore::new(), references, clock, EngineConfig::default()).unwrap();
    let company = CompanyId::new();
    for n in 1..=100i64 {
        let draft = engine
            .create_invoice(
                InvoiceBuilder::new(company, CustomerId::new(), test_date()).add_line(
                    LineItemBuilder::new("Abo", Quantity::units(1), "month", Money::from_minor(1_000 + n)).build(),
                ),
            )
            .unwrap();
        engine.issue_invoice(company, draft.id).unwrap();
    }
    let records: Vec<PaymentRecord> = (1..=100i64)
        .map(|n| PaymentRecord::new(Money::from_minor(50_000 + n), test_date()))
        .collect();

    c.bench_function("import_100_unmatched_payments", |b| {
        b.iter(|| black_box(engine.import_payments(company, black_box(records.clone()), None)));
    });
}

criterion_group!(
    benches,
    bench_build_invoice,
    bench_match_by_reference,
    bench_match_by_amount,
    bench_import_batch,
);
criterion_main!(benches);
