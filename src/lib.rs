//! # belegfluss
//!
//! Quote and invoice lifecycle for small businesses: VAT-exact document
//! totals, quote acceptance and conversion, and tiered matching of incoming
//! bank payments against open invoices.
//!
//! All amounts are integers in minor currency units ([`Money`]), never
//! floating point. Rates are stored as percent × 100, so 7.7 % is `770`.
//!
//! ## Quick Start
//!
//! ```rust
//! use belegfluss::core::*;
//!
//! let lines = vec![
//!     LineItemBuilder::new("Beratung", Quantity::units(3), "h", Money::from_minor(15_000))
//!         .discount(Rate::from_scaled(1000))
//!         .vat(Rate::from_scaled(810))
//!         .build(),
//! ];
//!
//! let totals = compute_document_totals(&lines, Money::ZERO).unwrap();
//! assert_eq!(totals.subtotal, Money::from_minor(40_500));
//! assert_eq!(totals.vat_amount, Money::from_minor(3_281));
//! assert_eq!(totals.total, Money::from_minor(43_781));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Money, line items, totals, lifecycle rules, numbering |
//! | `engine` (default) | Storage seam, payment matching, reconciliation, engine entry points |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "engine")]
pub mod engine;

#[cfg(feature = "engine")]
pub mod matching;

#[cfg(feature = "engine")]
pub mod reconcile;

#[cfg(feature = "engine")]
pub mod store;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
