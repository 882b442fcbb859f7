use serde::{Deserialize, Serialize};

use super::error::{BillingError, ValidationError};
use super::line_item::{LineItem, LineItemInput, build_line_items};
use super::money::Money;

/// Aggregate amounts of a quote or invoice.
///
/// `total == subtotal + vat_amount − discount_amount`, where subtotal and VAT are
/// sums of the independently rounded line amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub vat_amount: Money,
    /// Flat document discount, applied after VAT.
    pub discount_amount: Money,
    pub total: Money,
}

impl DocumentTotals {
    /// Sum already-computed lines. No line is re-rounded.
    pub fn from_lines(items: &[LineItem], discount_amount: Money) -> Result<Self, BillingError> {
        if items.is_empty() {
            return Err(BillingError::EmptyDocument);
        }
        if discount_amount.is_negative() {
            return Err(BillingError::Validation(format!(
                "discount amount must not be negative, got {discount_amount}"
            )));
        }

        let subtotal = checked_sum(items.iter().map(LineItem::discounted_amount), "subtotal")?;
        let vat_amount = checked_sum(items.iter().map(|i| i.vat_amount), "VAT amount")?;
        let gross = subtotal
            .checked_add(vat_amount)
            .ok_or_else(|| BillingError::Arithmetic("document amount overflows".into()))?;
        if discount_amount > gross {
            return Err(BillingError::Validation(format!(
                "discount {discount_amount} exceeds document amount {gross}"
            )));
        }

        Ok(Self {
            subtotal,
            vat_amount,
            discount_amount,
            total: gross - discount_amount,
        })
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Money>, what: &str) -> Result<Money, BillingError> {
    amounts.try_fold(Money::ZERO, |acc, amount| {
        acc.checked_add(amount)
            .ok_or_else(|| BillingError::Arithmetic(format!("{what} overflows")))
    })
}

/// Compute lines and totals for a document in one step.
pub fn compute_document(
    inputs: Vec<LineItemInput>,
    discount_amount: Money,
) -> Result<(Vec<LineItem>, DocumentTotals), BillingError> {
    let items = build_line_items(inputs)?;
    let totals = DocumentTotals::from_lines(&items, discount_amount)?;
    Ok((items, totals))
}

/// Totals for a prospective document without keeping the computed lines.
pub fn compute_document_totals(
    inputs: &[LineItemInput],
    discount_amount: Money,
) -> Result<DocumentTotals, BillingError> {
    compute_document(inputs.to_vec(), discount_amount).map(|(_, totals)| totals)
}

/// Check stored lines and totals against each other.
/// Returns every violation found (not just the first).
pub fn validate_totals(items: &[LineItem], totals: &DocumentTotals) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if items.is_empty() {
        errors.push(ValidationError::with_rule(
            "items",
            "document must have at least one line item",
            "ITEMS",
        ));
    }

    for (i, item) in items.iter().enumerate() {
        let expected_order = i as u32 + 1;
        if item.sort_order != expected_order {
            errors.push(ValidationError::with_rule(
                format!("items.{i}.sort_order"),
                format!(
                    "sort order {} breaks the contiguous sequence (expected {expected_order})",
                    item.sort_order
                ),
                "ORDER",
            ));
        }
        if item.vat_amount.is_negative() || item.discounted_amount().is_negative() {
            errors.push(ValidationError::with_rule(
                format!("items.{i}"),
                "line amounts must not be negative",
                "LINE",
            ));
        }
    }

    let Ok(expected_subtotal) = checked_sum(items.iter().map(LineItem::discounted_amount), "subtotal")
    else {
        errors.push(ValidationError::with_rule("items", "line amounts overflow", "LINE"));
        return errors;
    };
    if totals.subtotal != expected_subtotal {
        errors.push(ValidationError::with_rule(
            "subtotal",
            format!(
                "subtotal {} does not match sum of line amounts {}",
                totals.subtotal, expected_subtotal
            ),
            "SUBTOTAL",
        ));
    }

    let Ok(expected_vat) = checked_sum(items.iter().map(|i| i.vat_amount), "VAT amount") else {
        errors.push(ValidationError::with_rule("items", "line VAT amounts overflow", "LINE"));
        return errors;
    };
    if totals.vat_amount != expected_vat {
        errors.push(ValidationError::with_rule(
            "vat_amount",
            format!(
                "VAT {} does not match sum of line VAT {}",
                totals.vat_amount, expected_vat
            ),
            "VAT",
        ));
    }

    let expected_total = totals
        .subtotal
        .checked_add(totals.vat_amount)
        .and_then(|gross| gross.checked_sub(totals.discount_amount));
    if expected_total != Some(totals.total) {
        errors.push(ValidationError::with_rule(
            "total",
            format!(
                "total {} does not match subtotal {} + VAT {} − discount {}",
                totals.total, totals.subtotal, totals.vat_amount, totals.discount_amount
            ),
            "TOTAL",
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::line_item::LineItemBuilder;
    use crate::core::money::{Quantity, Rate};

    fn input(price: i64, vat: i64) -> LineItemInput {
        LineItemBuilder::new("Item", Quantity::units(1), "pcs", Money::from_minor(price))
            .vat(Rate::from_scaled(vat))
            .build()
    }

    #[test]
    fn per_line_rounding_is_summed_not_reapplied() {
        // 0.07 × 7.7 % = 0.00539 → 0.01 per line; rounding 0.21 × 7.7 % once would give 0.02.
        let totals =
            compute_document_totals(&[input(7, 770), input(7, 770), input(7, 770)], Money::ZERO)
                .unwrap();
        assert_eq!(totals.subtotal, Money::from_minor(21));
        assert_eq!(totals.vat_amount, Money::from_minor(3));
        assert_eq!(totals.total, Money::from_minor(24));
    }

    #[test]
    fn discount_is_applied_after_vat() {
        let totals = compute_document_totals(&[input(10_000, 810)], Money::from_minor(500)).unwrap();
        assert_eq!(totals.subtotal, Money::from_minor(10_000));
        assert_eq!(totals.vat_amount, Money::from_minor(810));
        assert_eq!(totals.total, Money::from_minor(10_310));
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(
            compute_document_totals(&[], Money::ZERO),
            Err(BillingError::EmptyDocument)
        ));
    }

    #[test]
    fn oversized_discount_is_rejected() {
        let err = compute_document_totals(&[input(100, 0)], Money::from_minor(101)).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[test]
    fn negative_discount_is_rejected() {
        let err = compute_document_totals(&[input(100, 0)], Money::from_minor(-1)).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[test]
    fn computed_documents_validate_cleanly() {
        let (items, totals) =
            compute_document(vec![input(1999, 770), input(4550, 250)], Money::from_minor(99))
                .unwrap();
        assert!(validate_totals(&items, &totals).is_empty());
    }

    #[test]
    fn tampered_totals_are_detected() {
        let (items, mut totals) = compute_document(vec![input(1000, 770)], Money::ZERO).unwrap();
        totals.total += Money::from_minor(1);
        let errors = validate_totals(&items, &totals);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule.as_deref(), Some("TOTAL"));
    }

    #[test]
    fn overflowing_line_sum_is_an_error() {
        let half = i64::MAX / 2 + 1;
        let err = compute_document_totals(&[input(half, 0), input(half, 0)], Money::ZERO).unwrap_err();
        assert!(matches!(err, BillingError::Arithmetic(_)));

        let (items, totals) = compute_document(vec![input(half, 0)], Money::ZERO).unwrap();
        let mut second = items[0].clone();
        second.sort_order = 2;
        let doubled = [items[0].clone(), second];
        let errors = validate_totals(&doubled, &totals);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule.as_deref(), Some("LINE"));
    }
}
