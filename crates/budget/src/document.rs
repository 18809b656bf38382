use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use quoteforge_catalog::BrandTag;
use quoteforge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Event, Money};

use crate::line_item::{parse_quantity, LineItem};
use crate::totals::totals;

/// Budget document identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetId(pub AggregateId);

impl BudgetId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BudgetId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: the quotation being composed.
///
/// Holds the ordered row sequence and the derived document aggregates.
/// Derived fields are reconciled inside `apply`, synchronously with the
/// triggering edit; they are never user-editable and never stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetDocument {
    id: BudgetId,
    budget_number: u64,
    client_id: String,
    budget_date: Option<NaiveDate>,
    line_items: Vec<LineItem>,
    total_pieces: u64,
    grand_price: Money,
    version: u64,
    opened: bool,
}

impl BudgetDocument {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: BudgetId) -> Self {
        Self {
            id,
            budget_number: 0,
            client_id: String::new(),
            budget_date: None,
            line_items: Vec::new(),
            total_pieces: 0,
            grand_price: Money::zero(),
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> BudgetId {
        self.id
    }

    pub fn budget_number(&self) -> u64 {
        self.budget_number
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn budget_date(&self) -> Option<NaiveDate> {
        self.budget_date
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn total_pieces(&self) -> u64 {
        self.total_pieces
    }

    pub fn grand_price(&self) -> Money {
        self.grand_price
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Invariant: the document never goes below one row.
    pub fn can_remove_line(&self) -> bool {
        self.line_items.len() > 1
    }

    fn reconcile_aggregates(&mut self) {
        let totals = totals(&self.line_items);
        self.total_pieces = totals.total_pieces;
        self.grand_price = totals.grand_price;
    }
}

impl AggregateRoot for BudgetDocument {
    type Id = BudgetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenBudget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBudget {
    pub budget_id: BudgetId,
    /// Sequential quotation number, allocated by the collaborator.
    pub budget_number: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignClient {
    pub budget_id: BudgetId,
    pub client_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetBudgetDate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBudgetDate {
    pub budget_id: BudgetId,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AppendLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendLine {
    pub budget_id: BudgetId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub budget_id: BudgetId,
    pub index: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeLineQuantity. Carries the raw operator input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLineQuantity {
    pub budget_id: BudgetId,
    pub index: usize,
    pub raw: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeLinePrice. Carries the raw operator input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLinePrice {
    pub budget_id: BudgetId,
    pub index: usize,
    pub raw: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeLineDescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLineDescription {
    pub budget_id: BudgetId,
    pub index: usize,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeLineBrand. The tag has already been resolved against the
/// catalog at the editing boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLineBrand {
    pub budget_id: BudgetId,
    pub index: usize,
    pub brand: BrandTag,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResetBudget. Issued after the transport collaborator
/// acknowledges a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetBudget {
    pub budget_id: BudgetId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetCommand {
    OpenBudget(OpenBudget),
    AssignClient(AssignClient),
    SetBudgetDate(SetBudgetDate),
    AppendLine(AppendLine),
    RemoveLine(RemoveLine),
    ChangeLineQuantity(ChangeLineQuantity),
    ChangeLinePrice(ChangeLinePrice),
    ChangeLineDescription(ChangeLineDescription),
    ChangeLineBrand(ChangeLineBrand),
    ResetBudget(ResetBudget),
}

/// Event: BudgetOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetOpened {
    pub budget_id: BudgetId,
    pub budget_number: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAssigned {
    pub budget_id: BudgetId,
    pub client_id: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetDateSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetDateSet {
    pub budget_id: BudgetId,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAppended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAppended {
    pub budget_id: BudgetId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub budget_id: BudgetId,
    pub index: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineQuantityChanged. Carries the coerced count, never raw input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantityChanged {
    pub budget_id: BudgetId,
    pub index: usize,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinePriceChanged. `price` is `None` when the input did not parse;
/// the row degrades to invalid rather than rejecting the edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePriceChanged {
    pub budget_id: BudgetId,
    pub index: usize,
    pub price: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineDescriptionChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDescriptionChanged {
    pub budget_id: BudgetId,
    pub index: usize,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineBrandChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBrandChanged {
    pub budget_id: BudgetId,
    pub index: usize,
    pub brand: BrandTag,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetReset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetReset {
    pub budget_id: BudgetId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetEvent {
    BudgetOpened(BudgetOpened),
    ClientAssigned(ClientAssigned),
    BudgetDateSet(BudgetDateSet),
    LineAppended(LineAppended),
    LineRemoved(LineRemoved),
    LineQuantityChanged(LineQuantityChanged),
    LinePriceChanged(LinePriceChanged),
    LineDescriptionChanged(LineDescriptionChanged),
    LineBrandChanged(LineBrandChanged),
    BudgetReset(BudgetReset),
}

impl Event for BudgetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BudgetEvent::BudgetOpened(_) => "budget.document.opened",
            BudgetEvent::ClientAssigned(_) => "budget.document.client_assigned",
            BudgetEvent::BudgetDateSet(_) => "budget.document.date_set",
            BudgetEvent::LineAppended(_) => "budget.document.line_appended",
            BudgetEvent::LineRemoved(_) => "budget.document.line_removed",
            BudgetEvent::LineQuantityChanged(_) => "budget.document.quantity_changed",
            BudgetEvent::LinePriceChanged(_) => "budget.document.price_changed",
            BudgetEvent::LineDescriptionChanged(_) => "budget.document.description_changed",
            BudgetEvent::LineBrandChanged(_) => "budget.document.brand_changed",
            BudgetEvent::BudgetReset(_) => "budget.document.reset",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BudgetEvent::BudgetOpened(e) => e.occurred_at,
            BudgetEvent::ClientAssigned(e) => e.occurred_at,
            BudgetEvent::BudgetDateSet(e) => e.occurred_at,
            BudgetEvent::LineAppended(e) => e.occurred_at,
            BudgetEvent::LineRemoved(e) => e.occurred_at,
            BudgetEvent::LineQuantityChanged(e) => e.occurred_at,
            BudgetEvent::LinePriceChanged(e) => e.occurred_at,
            BudgetEvent::LineDescriptionChanged(e) => e.occurred_at,
            BudgetEvent::LineBrandChanged(e) => e.occurred_at,
            BudgetEvent::BudgetReset(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BudgetDocument {
    type Command = BudgetCommand;
    type Event = BudgetEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BudgetEvent::BudgetOpened(e) => {
                self.id = e.budget_id;
                self.budget_number = e.budget_number;
                self.client_id.clear();
                self.budget_date = None;
                self.line_items = vec![LineItem::empty()];
                self.opened = true;
                self.reconcile_aggregates();
            }
            BudgetEvent::ClientAssigned(e) => {
                self.client_id = e.client_id.clone();
            }
            BudgetEvent::BudgetDateSet(e) => {
                self.budget_date = Some(e.date);
            }
            BudgetEvent::LineAppended(_) => {
                self.line_items.push(LineItem::empty());
                self.reconcile_aggregates();
            }
            BudgetEvent::LineRemoved(e) => {
                if self.line_items.len() > 1 && e.index < self.line_items.len() {
                    self.line_items.remove(e.index);
                }
                self.reconcile_aggregates();
            }
            BudgetEvent::LineQuantityChanged(e) => {
                if let Some(item) = self.line_items.get_mut(e.index) {
                    item.quantity = e.quantity;
                    item.recompute_total();
                }
                self.reconcile_aggregates();
            }
            BudgetEvent::LinePriceChanged(e) => {
                if let Some(item) = self.line_items.get_mut(e.index) {
                    item.price = e.price;
                    item.recompute_total();
                }
                self.reconcile_aggregates();
            }
            BudgetEvent::LineDescriptionChanged(e) => {
                if let Some(item) = self.line_items.get_mut(e.index) {
                    item.description = e.description.clone();
                }
            }
            BudgetEvent::LineBrandChanged(e) => {
                if let Some(item) = self.line_items.get_mut(e.index) {
                    item.brand = Some(e.brand.clone());
                }
            }
            BudgetEvent::BudgetReset(_) => {
                self.client_id.clear();
                self.budget_date = None;
                self.line_items = vec![LineItem::empty()];
                self.reconcile_aggregates();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BudgetCommand::OpenBudget(cmd) => self.handle_open(cmd),
            BudgetCommand::AssignClient(cmd) => self.handle_assign_client(cmd),
            BudgetCommand::SetBudgetDate(cmd) => self.handle_set_date(cmd),
            BudgetCommand::AppendLine(cmd) => self.handle_append_line(cmd),
            BudgetCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            BudgetCommand::ChangeLineQuantity(cmd) => self.handle_change_quantity(cmd),
            BudgetCommand::ChangeLinePrice(cmd) => self.handle_change_price(cmd),
            BudgetCommand::ChangeLineDescription(cmd) => self.handle_change_description(cmd),
            BudgetCommand::ChangeLineBrand(cmd) => self.handle_change_brand(cmd),
            BudgetCommand::ResetBudget(cmd) => self.handle_reset(cmd),
        }
    }
}

impl BudgetDocument {
    fn ensure_open(&self) -> Result<(), DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_budget_id(&self, budget_id: BudgetId) -> Result<(), DomainError> {
        if self.id != budget_id {
            return Err(DomainError::invariant("budget_id mismatch"));
        }
        Ok(())
    }

    /// Index out of range is a caller bug, not operator-facing input.
    fn ensure_line_index(&self, index: usize) -> Result<(), DomainError> {
        if index >= self.line_items.len() {
            return Err(DomainError::invariant(format!(
                "line index {index} out of range (document has {} rows)",
                self.line_items.len()
            )));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenBudget) -> Result<Vec<BudgetEvent>, DomainError> {
        if self.opened {
            return Err(DomainError::conflict("budget document already open"));
        }

        Ok(vec![BudgetEvent::BudgetOpened(BudgetOpened {
            budget_id: cmd.budget_id,
            budget_number: cmd.budget_number,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_client(&self, cmd: &AssignClient) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;

        Ok(vec![BudgetEvent::ClientAssigned(ClientAssigned {
            budget_id: cmd.budget_id,
            client_id: cmd.client_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_date(&self, cmd: &SetBudgetDate) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;

        Ok(vec![BudgetEvent::BudgetDateSet(BudgetDateSet {
            budget_id: cmd.budget_id,
            date: cmd.date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_append_line(&self, cmd: &AppendLine) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;

        Ok(vec![BudgetEvent::LineAppended(LineAppended {
            budget_id: cmd.budget_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;
        self.ensure_line_index(cmd.index)?;

        // Explicit guard: the invariant holds regardless of which caller
        // invokes the removal, not just because a UI control is disabled.
        if !self.can_remove_line() {
            return Err(DomainError::invariant(
                "cannot remove the last remaining line item",
            ));
        }

        Ok(vec![BudgetEvent::LineRemoved(LineRemoved {
            budget_id: cmd.budget_id,
            index: cmd.index,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_quantity(
        &self,
        cmd: &ChangeLineQuantity,
    ) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;
        self.ensure_line_index(cmd.index)?;

        Ok(vec![BudgetEvent::LineQuantityChanged(LineQuantityChanged {
            budget_id: cmd.budget_id,
            index: cmd.index,
            quantity: parse_quantity(&cmd.raw),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(&self, cmd: &ChangeLinePrice) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;
        self.ensure_line_index(cmd.index)?;

        // Unparsable input degrades the row to invalid instead of rejecting
        // the edit; submission validation catches it on that row.
        Ok(vec![BudgetEvent::LinePriceChanged(LinePriceChanged {
            budget_id: cmd.budget_id,
            index: cmd.index,
            price: Money::parse(&cmd.raw).ok(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_description(
        &self,
        cmd: &ChangeLineDescription,
    ) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;
        self.ensure_line_index(cmd.index)?;

        Ok(vec![BudgetEvent::LineDescriptionChanged(
            LineDescriptionChanged {
                budget_id: cmd.budget_id,
                index: cmd.index,
                description: cmd.description.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_change_brand(&self, cmd: &ChangeLineBrand) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;
        self.ensure_line_index(cmd.index)?;

        Ok(vec![BudgetEvent::LineBrandChanged(LineBrandChanged {
            budget_id: cmd.budget_id,
            index: cmd.index,
            brand: cmd.brand.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reset(&self, cmd: &ResetBudget) -> Result<Vec<BudgetEvent>, DomainError> {
        self.ensure_open()?;
        self.ensure_budget_id(cmd.budget_id)?;

        Ok(vec![BudgetEvent::BudgetReset(BudgetReset {
            budget_id: cmd.budget_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoteforge_catalog::BrandCatalog;
    use rust_decimal_macros::dec;

    fn test_budget_id() -> BudgetId {
        BudgetId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn open_document() -> BudgetDocument {
        let budget_id = test_budget_id();
        let mut document = BudgetDocument::empty(budget_id);
        let events = document
            .handle(&BudgetCommand::OpenBudget(OpenBudget {
                budget_id,
                budget_number: 42,
                occurred_at: test_time(),
            }))
            .unwrap();
        document.apply(&events[0]);
        document
    }

    fn execute(document: &mut BudgetDocument, command: BudgetCommand) {
        let events = document.handle(&command).unwrap();
        for event in &events {
            document.apply(event);
        }
    }

    fn set_quantity(document: &mut BudgetDocument, index: usize, raw: &str) {
        let command = BudgetCommand::ChangeLineQuantity(ChangeLineQuantity {
            budget_id: document.id_typed(),
            index,
            raw: raw.to_string(),
            occurred_at: test_time(),
        });
        execute(document, command);
    }

    fn set_price(document: &mut BudgetDocument, index: usize, raw: &str) {
        let command = BudgetCommand::ChangeLinePrice(ChangeLinePrice {
            budget_id: document.id_typed(),
            index,
            raw: raw.to_string(),
            occurred_at: test_time(),
        });
        execute(document, command);
    }

    #[test]
    fn open_budget_emits_budget_opened_event() {
        let budget_id = test_budget_id();
        let document = BudgetDocument::empty(budget_id);
        let events = document
            .handle(&BudgetCommand::OpenBudget(OpenBudget {
                budget_id,
                budget_number: 7,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            BudgetEvent::BudgetOpened(e) => {
                assert_eq!(e.budget_id, budget_id);
                assert_eq!(e.budget_number, 7);
            }
            _ => panic!("Expected BudgetOpened event"),
        }
    }

    #[test]
    fn opening_creates_a_single_zeroed_row() {
        let document = open_document();
        assert!(document.is_open());
        assert_eq!(document.budget_number(), 42);
        assert_eq!(document.line_items().len(), 1);
        assert_eq!(document.line_items()[0], LineItem::empty());
        assert_eq!(document.total_pieces(), 0);
        assert_eq!(document.grand_price(), Money::zero());
    }

    #[test]
    fn cannot_open_twice() {
        let document = open_document();
        let err = document
            .handle(&BudgetCommand::OpenBudget(OpenBudget {
                budget_id: document.id_typed(),
                budget_number: 43,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn edits_before_open_are_not_found() {
        let budget_id = test_budget_id();
        let document = BudgetDocument::empty(budget_id);
        let err = document
            .handle(&BudgetCommand::AppendLine(AppendLine {
                budget_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn quantity_and_price_edit_reconciles_row_total_and_aggregates() {
        let mut document = open_document();

        set_quantity(&mut document, 0, "3");
        set_price(&mut document, 0, "2,50");

        let row = &document.line_items()[0];
        assert_eq!(row.quantity, 3);
        assert_eq!(row.price.unwrap().amount(), dec!(2.50));
        assert_eq!(row.total_price.unwrap().amount(), dec!(7.50));
        assert_eq!(document.total_pieces(), 3);
        assert_eq!(document.grand_price().amount(), dec!(7.50));
    }

    #[test]
    fn appending_a_row_preserves_existing_totals() {
        let mut document = open_document();
        set_quantity(&mut document, 0, "3");
        set_price(&mut document, 0, "2,50");

        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::AppendLine(AppendLine {
                budget_id: __bid,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(document.line_items().len(), 2);
        assert_eq!(document.line_items()[1], LineItem::empty());
        assert_eq!(document.total_pieces(), 3);
        assert_eq!(document.grand_price().amount(), dec!(7.50));

        set_quantity(&mut document, 1, "2");
        set_price(&mut document, 1, "1.00");
        assert_eq!(document.total_pieces(), 5);
        assert_eq!(document.grand_price().amount(), dec!(9.50));
    }

    #[test]
    fn unparsable_price_invalidates_the_row_but_not_the_grand_total() {
        let mut document = open_document();
        set_quantity(&mut document, 0, "3");
        set_price(&mut document, 0, "2,50");

        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::AppendLine(AppendLine {
                budget_id: __bid,
                occurred_at: test_time(),
            }),
        );
        set_quantity(&mut document, 1, "5");
        set_price(&mut document, 1, "abc");

        let bad_row = &document.line_items()[1];
        assert_eq!(bad_row.price, None);
        assert_eq!(bad_row.total_price, None);

        // The invalid row contributes 0; the prior valid sum stands.
        assert_eq!(document.total_pieces(), 8);
        assert_eq!(document.grand_price().amount(), dec!(7.50));
    }

    #[test]
    fn garbage_quantity_coerces_to_zero() {
        let mut document = open_document();
        set_price(&mut document, 0, "4,00");
        set_quantity(&mut document, 0, "oops");

        let row = &document.line_items()[0];
        assert_eq!(row.quantity, 0);
        assert_eq!(row.total_price.unwrap(), Money::zero());
        assert_eq!(document.total_pieces(), 0);
    }

    #[test]
    fn removing_a_middle_row_recomputes_aggregates() {
        let mut document = open_document();
        set_quantity(&mut document, 0, "3");
        set_price(&mut document, 0, "2,50");
        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::AppendLine(AppendLine {
                budget_id: __bid,
                occurred_at: test_time(),
            }),
        );
        set_quantity(&mut document, 1, "2");
        set_price(&mut document, 1, "1.00");

        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::RemoveLine(RemoveLine {
                budget_id: __bid,
                index: 0,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(document.line_items().len(), 1);
        assert_eq!(document.total_pieces(), 2);
        assert_eq!(document.grand_price().amount(), dec!(1.00));
    }

    #[test]
    fn removing_the_last_remaining_row_is_refused() {
        let mut document = open_document();
        set_quantity(&mut document, 0, "3");

        let before = document.clone();
        let err = document
            .handle(&BudgetCommand::RemoveLine(RemoveLine {
                budget_id: document.id_typed(),
                index: 0,
                occurred_at: test_time(),
            }))
            .unwrap_err();

        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(document, before);
        assert_eq!(document.line_items().len(), 1);
    }

    #[test]
    fn row_index_out_of_range_is_an_invariant_violation() {
        let document = open_document();
        let err = document
            .handle(&BudgetCommand::ChangeLinePrice(ChangeLinePrice {
                budget_id: document.id_typed(),
                index: 5,
                raw: "1,00".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn description_and_brand_edits_do_not_touch_totals() {
        let mut document = open_document();
        set_quantity(&mut document, 0, "3");
        set_price(&mut document, 0, "2,50");
        let version_before = document.version();

        let brand = BrandCatalog::default().resolve("caveste").unwrap();
        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::ChangeLineDescription(ChangeLineDescription {
                budget_id: __bid,
                index: 0,
                description: "Camisa oficial".to_string(),
                occurred_at: test_time(),
            }),
        );
        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::ChangeLineBrand(ChangeLineBrand {
                budget_id: __bid,
                index: 0,
                brand: brand.clone(),
                occurred_at: test_time(),
            }),
        );

        let row = &document.line_items()[0];
        assert_eq!(row.description, "Camisa oficial");
        assert_eq!(row.brand, Some(brand));
        assert_eq!(document.total_pieces(), 3);
        assert_eq!(document.grand_price().amount(), dec!(7.50));
        assert_eq!(document.version(), version_before + 2);
    }

    #[test]
    fn reset_restores_the_initial_lifecycle_state() {
        let mut document = open_document();
        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::AssignClient(AssignClient {
                budget_id: __bid,
                client_id: "ACME Esportes".to_string(),
                occurred_at: test_time(),
            }),
        );
        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::SetBudgetDate(SetBudgetDate {
                budget_id: __bid,
                date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
                occurred_at: test_time(),
            }),
        );
        set_quantity(&mut document, 0, "3");
        set_price(&mut document, 0, "2,50");

        let __bid = document.id_typed();
        execute(
            &mut document,
            BudgetCommand::ResetBudget(ResetBudget {
                budget_id: __bid,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(document.client_id(), "");
        assert_eq!(document.budget_date(), None);
        assert_eq!(document.line_items().len(), 1);
        assert_eq!(document.line_items()[0], LineItem::empty());
        assert_eq!(document.total_pieces(), 0);
        assert_eq!(document.grand_price(), Money::zero());
        // The allocated quotation number is not a form field; it survives.
        assert_eq!(document.budget_number(), 42);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let document = open_document();
        let before = document.clone();

        let command = BudgetCommand::ChangeLineQuantity(ChangeLineQuantity {
            budget_id: document.id_typed(),
            index: 0,
            raw: "9".to_string(),
            occurred_at: test_time(),
        });

        let events1 = document.handle(&command).unwrap();
        let events2 = document.handle(&command).unwrap();

        assert_eq!(document, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn version_increments_on_apply() {
        let mut document = open_document();
        let version = document.version();
        set_quantity(&mut document, 0, "2");
        assert_eq!(document.version(), version + 1);
        set_price(&mut document, 0, "1,00");
        assert_eq!(document.version(), version + 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum EditOp {
            Append,
            Remove(usize),
            Quantity(usize, String),
            Price(usize, String),
        }

        fn arb_quantity_input() -> impl Strategy<Value = String> {
            prop_oneof![
                (0u32..100).prop_map(|n| n.to_string()),
                Just(String::new()),
                Just("garbage".to_string()),
                Just("-3".to_string()),
            ]
        }

        fn arb_price_input() -> impl Strategy<Value = String> {
            prop_oneof![
                (1u64..1_000_000).prop_map(|cents| format!("{},{:02}", cents / 100, cents % 100)),
                (0u64..10_000).prop_map(|cents| format!("{}.{:02}", cents / 100, cents % 100)),
                Just("abc".to_string()),
                Just(String::new()),
            ]
        }

        fn arb_edit() -> impl Strategy<Value = EditOp> {
            prop_oneof![
                1 => Just(EditOp::Append),
                1 => (0usize..8).prop_map(EditOp::Remove),
                3 => (0usize..8, arb_quantity_input())
                    .prop_map(|(i, raw)| EditOp::Quantity(i, raw)),
                3 => (0usize..8, arb_price_input()).prop_map(|(i, raw)| EditOp::Price(i, raw)),
            ]
        }

        fn apply_edit(document: &mut BudgetDocument, edit: &EditOp) {
            let budget_id = document.id_typed();
            // Fold arbitrary indices into the current row range so only the
            // last-row guard can refuse an edit.
            let command = match edit {
                EditOp::Append => BudgetCommand::AppendLine(AppendLine {
                    budget_id,
                    occurred_at: test_time(),
                }),
                EditOp::Remove(i) => BudgetCommand::RemoveLine(RemoveLine {
                    budget_id,
                    index: i % document.line_items().len(),
                    occurred_at: test_time(),
                }),
                EditOp::Quantity(i, raw) => BudgetCommand::ChangeLineQuantity(ChangeLineQuantity {
                    budget_id,
                    index: i % document.line_items().len(),
                    raw: raw.clone(),
                    occurred_at: test_time(),
                }),
                EditOp::Price(i, raw) => BudgetCommand::ChangeLinePrice(ChangeLinePrice {
                    budget_id,
                    index: i % document.line_items().len(),
                    raw: raw.clone(),
                    occurred_at: test_time(),
                }),
            };
            if let Ok(events) = document.handle(&command) {
                for event in &events {
                    document.apply(event);
                }
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: after every edit, each row total equals quantity ×
            /// price (or is invalid with its price), and the document
            /// aggregates equal the sums over the current rows.
            #[test]
            fn derived_fields_stay_reconciled(edits in proptest::collection::vec(arb_edit(), 1..40)) {
                let mut document = open_document();

                for edit in &edits {
                    apply_edit(&mut document, edit);

                    prop_assert!(!document.line_items().is_empty());

                    let mut expected_pieces = 0u64;
                    let mut expected_grand = Money::zero();
                    for row in document.line_items() {
                        match row.price {
                            Some(price) => {
                                prop_assert_eq!(row.total_price, Some(price.times(row.quantity)));
                            }
                            None => prop_assert_eq!(row.total_price, None),
                        }
                        expected_pieces += u64::from(row.quantity);
                        if let Some(total) = row.total_price {
                            expected_grand = expected_grand + total;
                        }
                    }
                    prop_assert_eq!(document.total_pieces(), expected_pieces);
                    prop_assert_eq!(document.grand_price(), expected_grand);
                }
            }

            /// Property: repeating the same edit yields the same totals.
            #[test]
            fn edits_are_idempotent(raw_quantity in arb_quantity_input(), raw_price in arb_price_input()) {
                let mut document = open_document();

                apply_edit(&mut document, &EditOp::Quantity(0, raw_quantity.clone()));
                apply_edit(&mut document, &EditOp::Price(0, raw_price.clone()));
                let first = (
                    document.line_items()[0].clone(),
                    document.total_pieces(),
                    document.grand_price(),
                );

                apply_edit(&mut document, &EditOp::Quantity(0, raw_quantity));
                apply_edit(&mut document, &EditOp::Price(0, raw_price));

                prop_assert_eq!(document.line_items()[0].clone(), first.0);
                prop_assert_eq!(document.total_pieces(), first.1);
                prop_assert_eq!(document.grand_price(), first.2);
            }

            /// Property: the row count never drops below one, whatever the
            /// removal pattern.
            #[test]
            fn row_count_never_drops_below_one(removals in proptest::collection::vec(0usize..8, 1..20)) {
                let mut document = open_document();
                apply_edit(&mut document, &EditOp::Append);
                apply_edit(&mut document, &EditOp::Append);

                for index in removals {
                    apply_edit(&mut document, &EditOp::Remove(index));
                    prop_assert!(!document.line_items().is_empty());
                }
            }
        }
    }
}
