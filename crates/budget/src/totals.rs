use serde::{Deserialize, Serialize};

use quoteforge_core::Money;

use crate::line_item::LineItem;

/// Document-level aggregates derived from the row sequence.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of quantities across all rows.
    pub total_pieces: u64,
    /// Sum of valid row totals. A row whose price failed to parse
    /// contributes 0 so one bad row cannot corrupt the displayed grand
    /// total; that row's own total still surfaces as invalid.
    pub grand_price: Money,
}

impl Totals {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// The aggregation engine: a pure function of the current row sequence.
///
/// O(n) in the number of rows; runs inside the same `apply` step as the
/// triggering edit, so no caller ever observes stale aggregates.
pub fn totals(items: &[LineItem]) -> Totals {
    let total_pieces = items.iter().map(|item| u64::from(item.quantity)).sum();
    let grand_price = items.iter().filter_map(|item| item.total_price).sum();
    Totals {
        total_pieces,
        grand_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(quantity: u32, price: &str) -> LineItem {
        let mut item = LineItem {
            quantity,
            price: Money::parse(price).ok(),
            ..LineItem::empty()
        };
        item.recompute_total();
        item
    }

    #[test]
    fn sums_quantities_and_row_totals() {
        let items = vec![row(3, "2,50"), row(2, "1.00")];
        let totals = totals(&items);
        assert_eq!(totals.total_pieces, 5);
        assert_eq!(totals.grand_price.amount(), dec!(9.50));
    }

    #[test]
    fn invalid_rows_contribute_zero_to_the_grand_total() {
        let items = vec![row(3, "2,50"), row(10, "abc")];
        let totals = totals(&items);
        assert_eq!(totals.total_pieces, 13);
        assert_eq!(totals.grand_price.amount(), dec!(7.50));
    }

    #[test]
    fn empty_rows_yield_zero_aggregates() {
        let items = vec![LineItem::empty()];
        assert_eq!(totals(&items), Totals::zero());
    }
}
