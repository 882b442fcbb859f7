use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::core::{BillingError, CompanyId};

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// External service issuing the structured payment reference for an invoice.
///
/// Checksums and formats are the service's business; the engine treats the
/// result as an opaque string. Closures of the right shape implement it.
pub trait ReferenceGenerator {
    fn payment_reference(
        &self,
        company: CompanyId,
        invoice_number: &str,
    ) -> Result<String, BillingError>;
}

impl<F> ReferenceGenerator for F
where
    F: Fn(CompanyId, &str) -> Result<String, BillingError>,
{
    fn payment_reference(
        &self,
        company: CompanyId,
        invoice_number: &str,
    ) -> Result<String, BillingError> {
        self(company, invoice_number)
    }
}
