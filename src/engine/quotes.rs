use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{Clock, Engine, ReferenceGenerator, logged};
use crate::core::{Acceptance, BillingError, DocumentKind, Invoice, Quote};
use crate::store::Store;

/// A converted quote together with the invoice created from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedQuote {
    pub quote: Quote,
    pub invoice: Invoice,
}

enum Outcome {
    Converted(AcceptedQuote),
    Expired(NaiveDate),
}

impl<S, R, C> Engine<S, R, C>
where
    S: Store,
    R: ReferenceGenerator,
    C: Clock,
{
    /// Accept a quote by its public token and convert it into an OPEN invoice.
    ///
    /// The invoice copies the quote's computed lines and totals unchanged, is
    /// dated today and falls due after the customer's payment terms counted
    /// from the quote date. Conversion and the CONVERTED mark commit together.
    ///
    /// A quote whose expiry date has passed is stored as EXPIRED and the call
    /// fails with [`BillingError::Expired`].
    #[instrument(skip_all)]
    pub fn accept_quote(
        &self,
        token: &str,
        accepted_by: Option<&str>,
    ) -> Result<AcceptedQuote, BillingError> {
        let now = self.clock.now();
        let today = now.date_naive();

        let result = self.store.transaction(|tx| {
            let mut quote = tx
                .quote_by_token(token)?
                .ok_or_else(|| BillingError::not_found("quote", "acceptance token"))?;

            if quote.check_acceptance(now)? == Acceptance::Expired {
                quote.expire()?;
                tx.update_quote(&quote)?;
                return Ok(Outcome::Expired(quote.expiry_date));
            }

            let company = quote.company_id;
            let terms = self.payment_terms(tx, company, quote.customer_id)?;
            let due_date = quote.invoice_due_date(terms)?;
            let number = self.next_number(tx, company, DocumentKind::Invoice, today)?;
            let reference = self.references.payment_reference(company, &number)?;

            let invoice = Invoice::from_quote(&quote, number, today, due_date, Some(reference));
            tx.insert_invoice(&invoice)?;
            quote.mark_converted(invoice.id, now, accepted_by.map(str::to_owned))?;
            tx.update_quote(&quote)?;
            Ok(Outcome::Converted(AcceptedQuote { quote, invoice }))
        });

        match logged("accept_quote", result)? {
            Outcome::Converted(accepted) => {
                info!(
                    quote_id = %accepted.quote.id,
                    invoice_id = %accepted.invoice.id,
                    number = %accepted.invoice.number,
                    "quote converted to invoice"
                );
                Ok(accepted)
            }
            Outcome::Expired(expiry_date) => {
                warn!(%expiry_date, "acceptance of expired quote rejected");
                Err(BillingError::Expired(expiry_date))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CompanyId, Customer, CustomerId, ErrorKind, InvoiceStatus, LineItemBuilder, Money,
        Quantity, QuoteBuilder, QuoteStatus, Rate,
    };
    use crate::engine::{EngineConfig, FixedClock};
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};

    type ReferenceFn = fn(CompanyId, &str) -> Result<String, BillingError>;

    fn reference(_: CompanyId, number: &str) -> Result<String, BillingError> {
        Ok(format!("REF{number}"))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Engine<InMemoryStore, ReferenceFn, FixedClock>, Quote) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap());
        let engine =
            Engine::new(InMemoryStore::new(), reference as ReferenceFn, clock, EngineConfig::default())
                .unwrap();
        let company = CompanyId::new();
        let customer = Customer {
            id: CustomerId::new(),
            company_id: company,
            name: "Beispiel GmbH".into(),
            payment_terms_days: 14,
        };
        engine.add_customer(&customer).unwrap();
        let quote = engine
            .create_quote(
                QuoteBuilder::new(company, customer.id, date(2024, 3, 1))
                    .expiry_date(date(2024, 3, 10))
                    .add_line(
                        LineItemBuilder::new("Workshop", Quantity::units(2), "d", Money::from_minor(90_000))
                            .vat(Rate::from_scaled(810))
                            .build(),
                    ),
            )
            .unwrap();
        (engine, quote)
    }

    #[test]
    fn acceptance_converts_in_one_step() {
        let (engine, quote) = setup();
        let accepted = engine.accept_quote(&quote.acceptance_token, Some("Anna")).unwrap();

        assert_eq!(accepted.quote.status, QuoteStatus::Converted);
        assert_eq!(accepted.quote.invoice_id, Some(accepted.invoice.id));
        assert_eq!(accepted.quote.accepted_by.as_deref(), Some("Anna"));
        assert_eq!(accepted.invoice.status, InvoiceStatus::Open);
        assert_eq!(accepted.invoice.date, date(2024, 3, 5));
        assert_eq!(accepted.invoice.due_date, date(2024, 3, 15));
        assert_eq!(accepted.invoice.total, quote.total);
        assert_eq!(accepted.invoice.quote_id, Some(quote.id));
    }

    #[test]
    fn second_acceptance_is_rejected() {
        let (engine, quote) = setup();
        engine.accept_quote(&quote.acceptance_token, None).unwrap();
        let err = engine.accept_quote(&quote.acceptance_token, None).unwrap_err();
        assert!(matches!(err, BillingError::AlreadyAccepted));
    }

    #[test]
    fn unknown_token_is_not_found() {
        let (engine, _) = setup();
        let err = engine.accept_quote("nope", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn expired_quote_is_marked_and_rejected() {
        let (engine, quote) = setup();
        engine.clock().set(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());

        let err = engine.accept_quote(&quote.acceptance_token, None).unwrap_err();
        assert!(matches!(err, BillingError::Expired(d) if d == date(2024, 3, 10)));

        let stored = engine
            .store()
            .transaction(|tx| Ok(tx.quote(quote.company_id, quote.id)?))
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, QuoteStatus::Expired);

        let again = engine.accept_quote(&quote.acceptance_token, None).unwrap_err();
        assert!(matches!(again, BillingError::Expired(_)));
    }
}
