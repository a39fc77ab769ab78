//! Line item aggregation.
//!
//! All monetary math is fixed-point (`rust_decimal`). Rounding policy:
//! every monetary field is rounded per line item to 2 decimal places,
//! midpoint away from zero, so the totals a recipient can verify line by
//! line add up exactly. Recomputation over unchanged inputs is idempotent.

use rust_decimal::{Decimal, RoundingStrategy};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Derived amounts for one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Compute the derived fields of a line item.
///
/// `subtotal = quantity x unit_price`, the discount applies to the
/// subtotal, tax applies to the discounted base.
pub fn line_amounts(
    quantity: Decimal,
    unit_price: Decimal,
    tax_rate: Decimal,
    discount_percent: Decimal,
) -> LineAmounts {
    let subtotal = round_money(quantity * unit_price);
    let discount_amount = round_money(subtotal * discount_percent / HUNDRED);
    let discounted = subtotal - discount_amount;
    let tax_amount = round_money(discounted * tax_rate / HUNDRED);

    LineAmounts {
        subtotal,
        discount_amount,
        tax_amount,
        total: discounted + tax_amount,
    }
}

/// Optional document-level discount applied after item aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentDiscount {
    Percent(Decimal),
    Fixed(Decimal),
}

impl DocumentDiscount {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentDiscount::Percent(_) => "percent",
            DocumentDiscount::Fixed(_) => "fixed",
        }
    }

    pub fn value(&self) -> Decimal {
        match self {
            DocumentDiscount::Percent(v) | DocumentDiscount::Fixed(v) => *v,
        }
    }

    pub fn from_columns(kind: Option<&str>, value: Option<Decimal>) -> Option<Self> {
        match (kind, value) {
            (Some("percent"), Some(v)) => Some(DocumentDiscount::Percent(v)),
            (Some("fixed"), Some(v)) => Some(DocumentDiscount::Fixed(v)),
            _ => None,
        }
    }
}

/// Document-level totals. Invariant:
/// `total = subtotal - discount_total + tax_total`, exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

impl DocumentTotals {
    pub fn zero() -> Self {
        DocumentTotals {
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}

/// Aggregate line amounts into document totals.
///
/// A percent document discount applies to the item-discounted subtotal; a
/// fixed one is clamped so the discounted base never goes negative. Tax is
/// per item and not recomputed for the document discount.
pub fn aggregate(items: &[LineAmounts], document_discount: Option<DocumentDiscount>) -> DocumentTotals {
    let mut subtotal = Decimal::ZERO;
    let mut item_discounts = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;

    for item in items {
        subtotal += item.subtotal;
        item_discounts += item.discount_amount;
        tax_total += item.tax_amount;
    }

    let base = subtotal - item_discounts;
    let document_portion = match document_discount {
        Some(DocumentDiscount::Percent(percent)) => round_money(base * percent / HUNDRED),
        Some(DocumentDiscount::Fixed(amount)) => round_money(amount).min(base),
        None => Decimal::ZERO,
    };

    let discount_total = item_discounts + document_portion;

    DocumentTotals {
        subtotal,
        discount_total,
        tax_total,
        total: subtotal - discount_total + tax_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn line_amounts_without_discount() {
        let amounts = line_amounts(dec("2"), dec("100"), dec("21"), dec("0"));
        assert_eq!(amounts.subtotal, dec("200.00"));
        assert_eq!(amounts.discount_amount, dec("0.00"));
        assert_eq!(amounts.tax_amount, dec("42.00"));
        assert_eq!(amounts.total, dec("242.00"));
    }

    #[test]
    fn discount_applies_before_tax() {
        let amounts = line_amounts(dec("1"), dec("50"), dec("21"), dec("10"));
        assert_eq!(amounts.subtotal, dec("50.00"));
        assert_eq!(amounts.discount_amount, dec("5.00"));
        assert_eq!(amounts.tax_amount, dec("9.45"));
        assert_eq!(amounts.total, dec("54.45"));
    }

    #[test]
    fn two_item_document_scenario() {
        // qty 2 @ 100, 21% tax, 0% discount; qty 1 @ 50, 21% tax, 10% discount.
        let items = [
            line_amounts(dec("2"), dec("100"), dec("21"), dec("0")),
            line_amounts(dec("1"), dec("50"), dec("21"), dec("10")),
        ];
        let totals = aggregate(&items, None);

        assert_eq!(totals.subtotal, dec("250.00"));
        assert_eq!(totals.discount_total, dec("5.00"));
        assert_eq!(totals.tax_total, dec("51.45"));
        assert_eq!(totals.total, dec("296.45"));
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount_total + totals.tax_total
        );
    }

    #[test]
    fn aggregation_is_idempotent() {
        let items = [
            line_amounts(dec("3"), dec("19.99"), dec("9"), dec("2.5")),
            line_amounts(dec("0.5"), dec("120"), dec("21"), dec("0")),
        ];
        let first = aggregate(&items, Some(DocumentDiscount::Percent(dec("5"))));
        let second = aggregate(&items, Some(DocumentDiscount::Percent(dec("5"))));
        assert_eq!(first, second);
    }

    #[test]
    fn fractional_quantities_round_per_item() {
        // 1.5 x 33.33 = 49.995, rounds away from zero to 50.00.
        let amounts = line_amounts(dec("1.5"), dec("33.33"), dec("0"), dec("0"));
        assert_eq!(amounts.subtotal, dec("50.00"));
        assert_eq!(amounts.total, dec("50.00"));
    }

    #[test]
    fn document_percent_discount_applies_to_discounted_base() {
        let items = [line_amounts(dec("1"), dec("100"), dec("0"), dec("10"))];
        // Base after item discount is 90; 10% of that is 9.
        let totals = aggregate(&items, Some(DocumentDiscount::Percent(dec("10"))));
        assert_eq!(totals.discount_total, dec("19.00"));
        assert_eq!(totals.total, dec("81.00"));
    }

    #[test]
    fn fixed_discount_is_clamped_to_base() {
        let items = [line_amounts(dec("1"), dec("40"), dec("0"), dec("0"))];
        let totals = aggregate(&items, Some(DocumentDiscount::Fixed(dec("100"))));
        assert_eq!(totals.discount_total, dec("40.00"));
        assert_eq!(totals.total, dec("0.00"));
    }

    #[test]
    fn invariant_holds_with_document_discount_and_tax() {
        let items = [
            line_amounts(dec("2"), dec("100"), dec("21"), dec("0")),
            line_amounts(dec("1"), dec("50"), dec("21"), dec("10")),
        ];
        let totals = aggregate(&items, Some(DocumentDiscount::Fixed(dec("20"))));
        assert_eq!(totals.discount_total, dec("25.00"));
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount_total + totals.tax_total
        );
    }

    #[test]
    fn empty_document_aggregates_to_zero() {
        let totals = aggregate(&[], None);
        assert_eq!(totals, DocumentTotals::zero());
    }
}
