use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "engine")]
use crate::store::StoreError;

/// Errors that can occur while computing, transitioning or reconciling documents.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BillingError {
    /// A line item has a non-positive quantity, a negative price or a rate outside 0–100 %.
    #[error("invalid line item: {0}")]
    InvalidLineItem(String),

    /// A document was built without any line items.
    #[error("document must contain at least one line item")]
    EmptyDocument,

    /// Malformed or out-of-range input other than line items.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Builder encountered invalid or missing configuration.
    #[error("builder error: {0}")]
    Builder(String),

    /// Amount arithmetic left the representable range.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// Document number sequencing error.
    #[error("numbering error: {0}")]
    Numbering(String),

    /// Unknown id or token, or a record outside the caller's company.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The document can no longer be edited in its current status.
    #[error("{entity} is not editable in status {status}")]
    NotEditable {
        entity: &'static str,
        status: &'static str,
    },

    /// The quote was already accepted or converted.
    #[error("quote has already been accepted")]
    AlreadyAccepted,

    /// The quote's expiry date has passed.
    #[error("quote expired on {0}")]
    Expired(NaiveDate),

    /// The requested status change is not allowed from the current status.
    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    /// The persistence layer failed. Details stay in the source chain and the logs.
    #[cfg(feature = "engine")]
    #[error("storage failure")]
    Storage(#[source] StoreError),
}

/// Coarse classification used by callers to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input; surfaced verbatim, never retried.
    Validation,
    /// Unknown id/token or wrong company scope.
    NotFound,
    /// Operation conflicts with the document's current state.
    StateConflict,
    /// Persistence failure; surfaced without details.
    Storage,
}

impl BillingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLineItem(_)
            | Self::EmptyDocument
            | Self::Validation(_)
            | Self::Builder(_)
            | Self::Arithmetic(_)
            | Self::Numbering(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotEditable { .. }
            | Self::AlreadyAccepted
            | Self::Expired(_)
            | Self::InvalidTransition { .. } => ErrorKind::StateConflict,
            #[cfg(feature = "engine")]
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(feature = "engine")]
impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err)
    }
}

/// A single consistency violation with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the offending field (e.g. "items.2.vat_amount").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// Invariant identifier if applicable (e.g. "TOTAL").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(BillingError::EmptyDocument.kind(), ErrorKind::Validation);
        assert_eq!(
            BillingError::not_found("quote", "abc").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(BillingError::AlreadyAccepted.kind(), ErrorKind::StateConflict);
    }

    #[cfg(feature = "engine")]
    #[test]
    fn storage_error_does_not_leak_details() {
        let err = BillingError::from(StoreError::Backend("connection refused to 10.0.0.3".into()));
        assert_eq!(err.to_string(), "storage failure");
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn validation_error_display() {
        let e = ValidationError::with_rule("total", "does not add up", "TOTAL");
        assert_eq!(e.to_string(), "[TOTAL] total: does not add up");
    }
}
