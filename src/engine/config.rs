use serde::{Deserialize, Serialize};

use crate::core::BillingError;
use crate::matching::PaymentMatcher;

/// Tunables for the engine. Every field has a default, so a partial JSON
/// document only overrides what it names.
///
/// ```
/// use belegfluss::engine::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "invoice_prefix": "INV-" }"#).unwrap();
/// assert_eq!(config.invoice_prefix, "INV-");
/// assert_eq!(config.match_date_window_days, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Half-width of the due-date window for MEDIUM matches, in days.
    pub match_date_window_days: u32,
    pub invoice_prefix: String,
    pub quote_prefix: String,
    /// Zero-padding width of the running number.
    pub number_padding: usize,
    /// Prefix of generated import batch tags.
    pub batch_tag_prefix: String,
    /// Validity of a new quote when no expiry date is given.
    pub quote_validity_days: u32,
    /// Payment terms used when the customer record is missing.
    pub default_payment_terms_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_date_window_days: 1,
            invoice_prefix: "RE-".to_string(),
            quote_prefix: "OF-".to_string(),
            number_padding: 3,
            batch_tag_prefix: "import-".to_string(),
            quote_validity_days: 30,
            default_payment_terms_days: 30,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, BillingError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BillingError::Validation(format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        if !(1..=12).contains(&self.number_padding) {
            return Err(BillingError::Validation(format!(
                "number_padding must be between 1 and 12, got {}",
                self.number_padding
            )));
        }
        if self.invoice_prefix == self.quote_prefix {
            return Err(BillingError::Validation(
                "invoice and quote prefixes must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn matcher(&self) -> PaymentMatcher {
        PaymentMatcher::new(self.match_date_window_days)
    }
}
