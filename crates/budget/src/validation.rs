//! Submission-time validation and the normalized transport payload.
//!
//! Validation runs on explicit submit, not on every keystroke. Errors are
//! field-scoped and recoverable: they block submission and leave the
//! document untouched.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quoteforge_catalog::BrandTag;
use quoteforge_core::Money;

use crate::document::BudgetDocument;

/// Localized field messages, as the operator sees them.
pub const MSG_CLIENT_REQUIRED: &str = "Cliente obrigatório";
pub const MSG_DATE_REQUIRED: &str = "Data obrigatória";
pub const MSG_PRICE_MINIMUM: &str = "O valor deve ser no mínimo R$ 1,00";

/// A field a validation message attaches to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldRef {
    ClientId,
    BudgetDate,
    LinePrice(usize),
    LineTotal(usize),
}

impl FieldRef {
    /// Stable path form for the presentation layer's message map.
    pub fn path(&self) -> String {
        match self {
            FieldRef::ClientId => "client_id".to_string(),
            FieldRef::BudgetDate => "budget_date".to_string(),
            FieldRef::LinePrice(index) => format!("line_items[{index}].price"),
            FieldRef::LineTotal(index) => format!("line_items[{index}].total_price"),
        }
    }
}

impl core::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Why a field blocked submission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A required header field is empty.
    Required,
    /// A monetary value is below the minimum unit. An unparsable price
    /// surfaces here too: its row total is invalid and fails the same check.
    BelowMinimum,
}

/// One field-scoped validation failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: FieldRef,
    pub kind: ViolationKind,
}

impl FieldError {
    pub fn required(field: FieldRef) -> Self {
        Self {
            field,
            kind: ViolationKind::Required,
        }
    }

    pub fn below_minimum(field: FieldRef) -> Self {
        Self {
            field,
            kind: ViolationKind::BelowMinimum,
        }
    }

    /// The localized message attached to the field.
    pub fn message(&self) -> &'static str {
        match (self.kind, self.field) {
            (ViolationKind::Required, FieldRef::ClientId) => MSG_CLIENT_REQUIRED,
            (ViolationKind::Required, FieldRef::BudgetDate) => MSG_DATE_REQUIRED,
            _ => MSG_PRICE_MINIMUM,
        }
    }
}

/// The full set of failures blocking a submission. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("budget failed validation with {} field error(s)", .errors.len())]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains(&self, field: FieldRef) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Field path → localized message, the shape the presentation layer
    /// renders directly.
    pub fn message_map(&self) -> BTreeMap<String, &'static str> {
        self.errors
            .iter()
            .map(|e| (e.field.path(), e.message()))
            .collect()
    }
}

/// A validated row in the transport payload: all options resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedLine {
    pub quantity: u32,
    pub description: String,
    pub brand: Option<BrandTag>,
    pub price: Money,
    pub total_price: Money,
}

/// The clean, normalized document handed to the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedBudget {
    pub budget_number: u64,
    pub client_id: String,
    pub budget_date: NaiveDate,
    pub line_items: Vec<SubmittedLine>,
    pub total_pieces: u64,
    pub grand_price: Money,
}

/// Validate the document against the submission schema.
///
/// Either yields the normalized payload (the document itself is untouched;
/// the reset only happens on transport acknowledgment) or the full set of
/// field errors.
pub fn validate_for_submission(
    document: &BudgetDocument,
) -> Result<SubmittedBudget, ValidationErrors> {
    let mut errors = Vec::new();

    let client_id = document.client_id().trim();
    if client_id.is_empty() {
        errors.push(FieldError::required(FieldRef::ClientId));
    }

    let budget_date = document.budget_date();
    if budget_date.is_none() {
        errors.push(FieldError::required(FieldRef::BudgetDate));
    }

    let mut line_items = Vec::with_capacity(document.line_items().len());
    for (index, row) in document.line_items().iter().enumerate() {
        let price = match row.price {
            Some(price) if price.meets_minimum() => Some(price),
            _ => {
                errors.push(FieldError::below_minimum(FieldRef::LinePrice(index)));
                None
            }
        };
        let total_price = match row.total_price {
            Some(total) if total.meets_minimum() => Some(total),
            _ => {
                errors.push(FieldError::below_minimum(FieldRef::LineTotal(index)));
                None
            }
        };
        if let (Some(price), Some(total_price)) = (price, total_price) {
            line_items.push(SubmittedLine {
                quantity: row.quantity,
                description: row.description.clone(),
                brand: row.brand.clone(),
                price,
                total_price,
            });
        }
    }

    match (errors.is_empty(), budget_date) {
        (true, Some(budget_date)) => Ok(SubmittedBudget {
            budget_number: document.budget_number(),
            client_id: client_id.to_string(),
            budget_date,
            line_items,
            total_pieces: document.total_pieces(),
            grand_price: document.grand_price(),
        }),
        _ => Err(ValidationErrors::new(errors)),
    }
}
