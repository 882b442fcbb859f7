use serde::{Deserialize, Serialize};

use super::error::BillingError;
use super::money::{Money, Quantity, Rate, line_amount, vat_on_amount};

/// Caller-supplied data for one document line, before computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Quantity,
    /// Free-form unit label (e.g. "h", "pcs").
    pub unit: String,
    pub unit_price: Money,
    pub discount: Rate,
    pub vat_rate: Rate,
}

/// A computed document line. Owned by its quote or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Quantity,
    pub unit: String,
    pub unit_price: Money,
    pub discount: Rate,
    pub vat_rate: Rate,
    /// Discounted net amount plus VAT.
    pub line_total: Money,
    pub vat_amount: Money,
    /// 1-based position within the document.
    pub sort_order: u32,
}

impl LineItem {
    /// Net amount after discount, before VAT.
    pub fn discounted_amount(&self) -> Money {
        self.line_total - self.vat_amount
    }
}

/// Result of the per-line calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCalculation {
    pub discounted_amount: Money,
    pub vat_amount: Money,
    pub line_total: Money,
}

/// Compute discount, VAT and total for a single line.
pub fn calculate_line(
    quantity: Quantity,
    unit_price: Money,
    discount: Rate,
    vat_rate: Rate,
) -> Result<LineCalculation, BillingError> {
    if quantity.thousandths() <= 0 {
        return Err(BillingError::InvalidLineItem(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if unit_price.is_negative() {
        return Err(BillingError::InvalidLineItem(format!(
            "unit price must not be negative, got {unit_price}"
        )));
    }
    if !discount.is_valid() {
        return Err(BillingError::InvalidLineItem(format!(
            "discount {discount} is outside 0–100%"
        )));
    }
    if !vat_rate.is_valid() {
        return Err(BillingError::InvalidLineItem(format!(
            "VAT rate {vat_rate} is outside 0–100%"
        )));
    }

    let discounted_amount = line_amount(quantity, unit_price, discount)?;
    let vat_amount = vat_on_amount(discounted_amount, vat_rate)?;
    let line_total = discounted_amount
        .checked_add(vat_amount)
        .ok_or_else(|| BillingError::Arithmetic("line total overflows".into()))?;

    Ok(LineCalculation {
        discounted_amount,
        vat_amount,
        line_total,
    })
}

impl LineItemInput {
    pub fn calculate(&self) -> Result<LineCalculation, BillingError> {
        calculate_line(self.quantity, self.unit_price, self.discount, self.vat_rate)
    }

    /// Compute this line and place it at `sort_order`.
    pub fn compute(self, sort_order: u32) -> Result<LineItem, BillingError> {
        let calc = self.calculate()?;
        Ok(LineItem {
            description: self.description,
            quantity: self.quantity,
            unit: self.unit,
            unit_price: self.unit_price,
            discount: self.discount,
            vat_rate: self.vat_rate,
            line_total: calc.line_total,
            vat_amount: calc.vat_amount,
            sort_order,
        })
    }
}

/// Compute every line in order, numbering them 1, 2, 3, …
///
/// The first failing line aborts the whole build; its position is part of the message.
pub fn build_line_items(inputs: Vec<LineItemInput>) -> Result<Vec<LineItem>, BillingError> {
    if inputs.is_empty() {
        return Err(BillingError::EmptyDocument);
    }

    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let position = u32::try_from(i + 1)
                .map_err(|_| BillingError::Validation("too many line items".into()))?;
            input.compute(position).map_err(|err| match err {
                BillingError::InvalidLineItem(msg) => {
                    BillingError::InvalidLineItem(format!("line {position}: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}

/// Builder for [`LineItemInput`].
///
/// ```
/// use belegfluss::core::*;
///
/// let line = LineItemBuilder::new("Consulting", Quantity::units(4), "h", Money::from_minor(15_000))
///     .vat(Rate::from_scaled(810))
///     .build();
/// let calc = line.calculate().unwrap();
/// assert_eq!(calc.line_total, Money::from_minor(64_860));
/// ```
pub struct LineItemBuilder {
    description: String,
    quantity: Quantity,
    unit: String,
    unit_price: Money,
    discount: Rate,
    vat_rate: Rate,
}

impl LineItemBuilder {
    pub fn new(
        description: impl Into<String>,
        quantity: Quantity,
        unit: impl Into<String>,
        unit_price: Money,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit: unit.into(),
            unit_price,
            discount: Rate::ZERO,
            vat_rate: Rate::ZERO,
        }
    }

    pub fn discount(mut self, rate: Rate) -> Self {
        self.discount = rate;
        self
    }

    pub fn vat(mut self, rate: Rate) -> Self {
        self.vat_rate = rate;
        self
    }

    pub fn build(self) -> LineItemInput {
        LineItemInput {
            description: self.description,
            quantity: self.quantity,
            unit: self.unit,
            unit_price: self.unit_price,
            discount: self.discount,
            vat_rate: self.vat_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: i64) -> LineItemBuilder {
        LineItemBuilder::new("Item", Quantity::from_thousandths(qty), "pcs", Money::from_minor(price))
    }

    #[test]
    fn total_is_discounted_plus_vat() {
        let calc = line(3000, 1999)
            .discount(Rate::from_scaled(500))
            .vat(Rate::from_scaled(770))
            .build()
            .calculate()
            .unwrap();
        // 3 × 19.99 = 59.97, −5 % = 56.9715 → 56.97
        assert_eq!(calc.discounted_amount, Money::from_minor(5697));
        // 56.97 × 7.7 % = 4.38669 → 4.39
        assert_eq!(calc.vat_amount, Money::from_minor(439));
        assert_eq!(calc.line_total, Money::from_minor(6136));
    }

    #[test]
    fn rejects_zero_quantity() {
        let err = line(0, 100).build().calculate().unwrap_err();
        assert!(matches!(err, BillingError::InvalidLineItem(_)));
    }

    #[test]
    fn rejects_negative_price() {
        let err = line(1000, -1).build().calculate().unwrap_err();
        assert!(matches!(err, BillingError::InvalidLineItem(_)));
    }

    #[test]
    fn rejects_rates_outside_bounds() {
        assert!(line(1000, 100).discount(Rate::from_scaled(10_001)).build().calculate().is_err());
        assert!(line(1000, 100).vat(Rate::from_scaled(-5)).build().calculate().is_err());
    }

    #[test]
    fn free_line_is_allowed() {
        let calc = line(1000, 0).vat(Rate::from_scaled(810)).build().calculate().unwrap();
        assert!(calc.line_total.is_zero());
    }

    #[test]
    fn sort_order_follows_input_order() {
        let items = build_line_items(vec![
            line(1000, 100).build(),
            line(2000, 200).build(),
            line(3000, 300).build(),
        ])
        .unwrap();
        let orders: Vec<u32> = items.iter().map(|i| i.sort_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(items[2].line_total, Money::from_minor(900));
    }

    #[test]
    fn failing_line_position_is_reported() {
        let err = build_line_items(vec![line(1000, 100).build(), line(-1, 100).build()])
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            build_line_items(Vec::new()),
            Err(BillingError::EmptyDocument)
        ));
    }
}
