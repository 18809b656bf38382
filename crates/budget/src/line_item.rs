use serde::{Deserialize, Serialize};

use quoteforge_catalog::BrandTag;
use quoteforge_core::Money;

/// A single quotable row: quantity, description, brand, unit price, and the
/// derived total.
///
/// `price` is `None` when the last price edit did not parse; the row is then
/// visibly invalid (its `total_price` is also `None`) but never poisons
/// document-level arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: u32,
    pub description: String,
    pub brand: Option<BrandTag>,
    pub price: Option<Money>,
    /// Derived: `quantity × price`, rounded to cents. Never user-editable;
    /// always overwritten by [`LineItem::recompute_total`].
    pub total_price: Option<Money>,
}

impl LineItem {
    /// The default row a fresh document (or an append) starts with.
    pub fn empty() -> Self {
        Self {
            quantity: 0,
            description: String::new(),
            brand: None,
            price: Some(Money::zero()),
            total_price: Some(Money::zero()),
        }
    }

    /// Reconcile the derived total with the current quantity and price.
    pub fn recompute_total(&mut self) {
        self.total_price = self.price.map(|price| price.times(self.quantity));
    }

    pub fn has_valid_price(&self) -> bool {
        self.price.is_some()
    }
}

impl Default for LineItem {
    fn default() -> Self {
        Self::empty()
    }
}

/// Coerce raw quantity input to a count.
///
/// Invalid, empty, fractional, or negative input coerces to 0 with no error
/// surfaced; quantity is a count of physical units and the operator sees the
/// coerced value immediately.
pub fn parse_quantity(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(0)
}
