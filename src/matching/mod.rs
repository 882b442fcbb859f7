//! Tiered payment-to-invoice matching.
//!
//! Tiers are tried in order and the first unique hit wins:
//!
//! | Tier | Rule |
//! |------|------|
//! | HIGH | payment reference equals exactly one invoice's reference |
//! | MEDIUM | exactly one open invoice with the same total, due within ± window of the value date |
//! | LOW | exactly one open invoice with the same total |
//! | MANUAL | nothing matched; left for triage |
//!
//! Ties are never broken: two candidates at a tier count as no match there.

mod matcher;
mod reference;

pub use matcher::{MatchResult, PaymentMatcher};
pub use reference::normalize_reference;
