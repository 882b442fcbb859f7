use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::BillingError;
use super::types::DocumentKind;

/// Gapless document number sequence for one company and document kind.
///
/// Generates numbers in the format `{prefix}{year}-{sequential}`,
/// e.g. "RE-2024-001" for invoices or "OF-2024-014" for quotes.
/// The counter restarts at 1 when the first document of a new year is numbered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNumberSequence {
    kind: DocumentKind,
    prefix: String,
    year: i32,
    next_number: u64,
    zero_pad: usize,
}

impl DocumentNumberSequence {
    /// Create a new sequence starting at 1.
    pub fn new(kind: DocumentKind, prefix: impl Into<String>, year: i32) -> Self {
        Self::starting_at(kind, prefix, year, 1)
    }

    /// Create a sequence continuing from a stored counter.
    pub fn starting_at(
        kind: DocumentKind,
        prefix: impl Into<String>,
        year: i32,
        next_number: u64,
    ) -> Self {
        Self {
            kind,
            prefix: prefix.into(),
            year,
            next_number,
            zero_pad: 3,
        }
    }

    /// Set zero-padding width (default: 3, so "001").
    pub fn with_padding(mut self, width: usize) -> Self {
        self.zero_pad = width;
        self
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// The counter value the next call to [`Self::next_for`] will use.
    pub fn next_raw(&self) -> u64 {
        self.next_number
    }

    /// Number a document dated `date`, moving to a new year when needed.
    ///
    /// Dates in an earlier year than the sequence are rejected; numbering
    /// never goes back.
    pub fn next_for(&mut self, date: NaiveDate) -> Result<String, BillingError> {
        let date_year = date.year();
        if date_year < self.year {
            return Err(BillingError::Numbering(format!(
                "document dated {date} lies before the current sequence year {}",
                self.year
            )));
        }
        if date_year > self.year {
            self.year = date_year;
            self.next_number = 1;
        }
        let number = self.format(self.next_number);
        self.next_number += 1;
        Ok(number)
    }

    /// Preview the next number without consuming it.
    pub fn peek(&self) -> String {
        self.format(self.next_number)
    }

    fn format(&self, number: u64) -> String {
        format!(
            "{}{}-{:0>width$}",
            self.prefix,
            self.year,
            number,
            width = self.zero_pad
        )
    }
}
