//! The editing boundary driven by the presentation layer.
//!
//! [`BudgetEditor`] owns one open [`BudgetDocument`] and translates raw field
//! edits into commands, funneling every state change through the aggregate's
//! handle/apply cycle. Each edit is handled to completion before the next is
//! accepted; the snapshot the caller reads back is always reconciled.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

use quoteforge_catalog::BrandCatalog;
use quoteforge_core::{Aggregate, AggregateId, DomainResult, Event};

use crate::document::{
    AppendLine, AssignClient, BudgetCommand, BudgetDocument, BudgetId, ChangeLineBrand,
    ChangeLineDescription, ChangeLinePrice, ChangeLineQuantity, OpenBudget, RemoveLine,
    ResetBudget, SetBudgetDate,
};
use crate::validation::{validate_for_submission, SubmittedBudget, ValidationErrors};

/// Single-operator editing session over one budget document.
pub struct BudgetEditor {
    document: BudgetDocument,
    catalog: BrandCatalog,
}

impl BudgetEditor {
    /// Open a fresh document with the default brand catalog.
    pub fn open(budget_number: u64) -> Self {
        Self::with_catalog(budget_number, BrandCatalog::default())
    }

    /// Open a fresh document against a configured catalog.
    pub fn with_catalog(budget_number: u64, catalog: BrandCatalog) -> Self {
        let budget_id = BudgetId::new(AggregateId::new());
        let mut document = BudgetDocument::empty(budget_id);
        match document.handle(&BudgetCommand::OpenBudget(OpenBudget {
            budget_id,
            budget_number,
            occurred_at: Utc::now(),
        })) {
            Ok(events) => {
                for event in &events {
                    document.apply(event);
                }
                debug!(budget_id = %budget_id, budget_number, "budget document opened");
            }
            // Unreachable on a fresh document; surfaced rather than swallowed.
            Err(err) => warn!(%err, "opening a fresh budget document was refused"),
        }
        Self { document, catalog }
    }

    fn execute(&mut self, command: BudgetCommand) -> DomainResult<()> {
        let events = self.document.handle(&command)?;
        for event in &events {
            debug!(event_type = event.event_type(), "budget edit applied");
            self.document.apply(event);
        }
        Ok(())
    }

    fn budget_id(&self) -> BudgetId {
        self.document.id_typed()
    }

    /// Append a zeroed row at the end of the sequence. Always succeeds.
    pub fn append_line(&mut self) -> DomainResult<()> {
        self.execute(BudgetCommand::AppendLine(AppendLine {
            budget_id: self.budget_id(),
            occurred_at: Utc::now(),
        }))
    }

    /// Remove the row at `index`.
    ///
    /// Removing the last remaining row is a no-op at this boundary (the
    /// action a UI would render disabled); the aggregate's own guard still
    /// refuses it for any caller that bypasses the editor.
    pub fn remove_line(&mut self, index: usize) -> DomainResult<()> {
        if !self.document.can_remove_line() {
            warn!(index, "removal of the last remaining row ignored");
            return Ok(());
        }
        self.execute(BudgetCommand::RemoveLine(RemoveLine {
            budget_id: self.budget_id(),
            index,
            occurred_at: Utc::now(),
        }))
    }

    /// Apply raw quantity input to the row at `index`.
    pub fn update_quantity(&mut self, index: usize, raw: &str) -> DomainResult<()> {
        self.execute(BudgetCommand::ChangeLineQuantity(ChangeLineQuantity {
            budget_id: self.budget_id(),
            index,
            raw: raw.to_string(),
            occurred_at: Utc::now(),
        }))
    }

    /// Apply raw price input to the row at `index`.
    pub fn update_price(&mut self, index: usize, raw: &str) -> DomainResult<()> {
        self.execute(BudgetCommand::ChangeLinePrice(ChangeLinePrice {
            budget_id: self.budget_id(),
            index,
            raw: raw.to_string(),
            occurred_at: Utc::now(),
        }))?;
        if self
            .document
            .line_items()
            .get(index)
            .is_some_and(|row| !row.has_valid_price())
        {
            warn!(index, raw, "unparsable price input; row marked invalid");
        }
        Ok(())
    }

    pub fn update_description(&mut self, index: usize, raw: &str) -> DomainResult<()> {
        self.execute(BudgetCommand::ChangeLineDescription(ChangeLineDescription {
            budget_id: self.budget_id(),
            index,
            description: raw.to_string(),
            occurred_at: Utc::now(),
        }))
    }

    /// Apply a brand selection; the slug must resolve against the catalog.
    pub fn update_brand(&mut self, index: usize, raw: &str) -> DomainResult<()> {
        let brand = self.catalog.resolve(raw)?;
        self.execute(BudgetCommand::ChangeLineBrand(ChangeLineBrand {
            budget_id: self.budget_id(),
            index,
            brand,
            occurred_at: Utc::now(),
        }))
    }

    pub fn set_client(&mut self, raw: &str) -> DomainResult<()> {
        self.execute(BudgetCommand::AssignClient(AssignClient {
            budget_id: self.budget_id(),
            client_id: raw.to_string(),
            occurred_at: Utc::now(),
        }))
    }

    pub fn set_budget_date(&mut self, date: NaiveDate) -> DomainResult<()> {
        self.execute(BudgetCommand::SetBudgetDate(SetBudgetDate {
            budget_id: self.budget_id(),
            date,
            occurred_at: Utc::now(),
        }))
    }

    /// Whether the removal action should be offered at all.
    pub fn can_remove_line(&self) -> bool {
        self.document.can_remove_line()
    }

    /// The current reconciled snapshot.
    pub fn document(&self) -> &BudgetDocument {
        &self.document
    }

    pub fn catalog(&self) -> &BrandCatalog {
        &self.catalog
    }

    /// Field path → localized message for the current state; empty when the
    /// document would pass submission.
    pub fn validation_messages(&self) -> BTreeMap<String, &'static str> {
        match validate_for_submission(&self.document) {
            Ok(_) => BTreeMap::new(),
            Err(errors) => errors.message_map(),
        }
    }

    /// Validate and yield the transport payload. The document is left
    /// untouched either way; reset only happens on acknowledgment.
    pub fn submit(&self) -> Result<SubmittedBudget, ValidationErrors> {
        match validate_for_submission(&self.document) {
            Ok(payload) => {
                debug!(
                    total_pieces = payload.total_pieces,
                    grand_price = %payload.grand_price,
                    "budget passed submission validation"
                );
                Ok(payload)
            }
            Err(errors) => {
                warn!(field_errors = errors.len(), "budget submission blocked");
                Err(errors)
            }
        }
    }

    /// The transport collaborator confirmed the submission: reset to the
    /// initial lifecycle state (single empty row, cleared header).
    pub fn acknowledge_submission(&mut self) -> DomainResult<()> {
        self.execute(BudgetCommand::ResetBudget(ResetBudget {
            budget_id: self.budget_id(),
            occurred_at: Utc::now(),
        }))
    }
}
