//! Aggregation behavior tests for salesdocs-service.
//! Totals must satisfy `total = subtotal - discount_total + tax_total`
//! exactly, for every discount shape.

use rust_decimal::Decimal;
use salesdocs_service::services::totals::{
    aggregate, line_amounts, DocumentDiscount, DocumentTotals, LineAmounts,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn invariant_holds(totals: &DocumentTotals) -> bool {
    totals.total == totals.subtotal - totals.discount_total + totals.tax_total
}

#[test]
fn realistic_invoice_adds_up_to_the_cent() {
    // Consulting (8h x 95.00, 21%), licence (12 x 24.99, 21%, 15% off),
    // travel (1 x 180.50, 0%).
    let items = [
        line_amounts(dec("8"), dec("95.00"), dec("21"), dec("0")),
        line_amounts(dec("12"), dec("24.99"), dec("21"), dec("15")),
        line_amounts(dec("1"), dec("180.50"), dec("0"), dec("0")),
    ];

    assert_eq!(items[0].total, dec("919.60"));
    // 299.88 gross, 44.98 discount, 254.90 base, 53.53 tax.
    assert_eq!(items[1].discount_amount, dec("44.98"));
    assert_eq!(items[1].tax_amount, dec("53.53"));

    let totals = aggregate(&items, None);
    assert_eq!(totals.subtotal, dec("1240.38"));
    assert_eq!(totals.discount_total, dec("44.98"));
    assert_eq!(totals.tax_total, dec("213.13"));
    assert_eq!(totals.total, dec("1408.53"));
    assert!(invariant_holds(&totals));
}

#[test]
fn document_discounts_keep_the_invariant() {
    let items = [
        line_amounts(dec("2"), dec("100"), dec("21"), dec("0")),
        line_amounts(dec("1"), dec("50"), dec("21"), dec("10")),
    ];

    for discount in [
        None,
        Some(DocumentDiscount::Percent(dec("0"))),
        Some(DocumentDiscount::Percent(dec("2.5"))),
        Some(DocumentDiscount::Percent(dec("100"))),
        Some(DocumentDiscount::Fixed(dec("0.01"))),
        Some(DocumentDiscount::Fixed(dec("245"))),
        Some(DocumentDiscount::Fixed(dec("10000"))),
    ] {
        let totals = aggregate(&items, discount);
        assert!(
            invariant_holds(&totals),
            "invariant broken for {:?}",
            discount
        );
    }
}

#[test]
fn recomputation_over_stored_amounts_is_stable() {
    // Recomputing from already-rounded stored amounts must not drift.
    let items = [
        line_amounts(dec("3"), dec("33.33"), dec("9"), dec("7.5")),
        line_amounts(dec("0.25"), dec("1999.99"), dec("21"), dec("0")),
    ];
    let first = aggregate(&items, Some(DocumentDiscount::Percent(dec("3"))));

    let stored: Vec<LineAmounts> = items.to_vec();
    let second = aggregate(&stored, Some(DocumentDiscount::Percent(dec("3"))));

    assert_eq!(first, second);
}

#[test]
fn tax_is_computed_on_the_discounted_base() {
    let with_discount = line_amounts(dec("1"), dec("200"), dec("21"), dec("50"));
    let without_discount = line_amounts(dec("1"), dec("100"), dec("21"), dec("0"));

    // 50% off 200 taxes like a 100 item.
    assert_eq!(with_discount.tax_amount, without_discount.tax_amount);
    assert_eq!(with_discount.total, dec("121.00"));
}

#[test]
fn zero_quantity_document_has_zero_totals() {
    let totals = aggregate(&[], Some(DocumentDiscount::Percent(dec("10"))));
    assert_eq!(totals, DocumentTotals::zero());
}
