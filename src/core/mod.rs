//! Money model, line items, document totals and lifecycle rules.
//!
//! Everything in this module is pure: no storage, no clock, no logging.
//! Amounts are integers in minor currency units throughout.

mod builder;
mod document;
mod error;
mod lifecycle;
mod line_item;
pub mod money;
mod numbering;
mod types;

pub use builder::*;
pub use document::*;
pub use error::*;
pub use lifecycle::*;
pub use line_item::*;
pub use money::{Money, Quantity, Rate, line_amount, vat_on_amount};
pub use numbering::*;
pub use types::*;
