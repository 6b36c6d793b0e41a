use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopforge_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use shopforge_events::Event;

use crate::movement::MovementType;

/// Stream type name used when dispatching stock commands.
pub const STOCK_AGGREGATE_TYPE: &str = "inventory.stock";

/// UUIDv5 namespace for SKU-derived stock stream ids.
const STOCK_NAMESPACE: Uuid = Uuid::from_u128(0x4a9d_0b7c_25e8_4f1f_8c36_d90a_47b2_e815);

/// Stock record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockRecordId(pub AggregateId);

impl StockRecordId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Derive the stock record id for a SKU.
    ///
    /// One SKU, one ledger stream. Catalog and inventory share the SKU as
    /// their join key, so both sides can locate each other's stream without
    /// a lookup table.
    pub fn for_sku(sku: &str) -> Self {
        Self(AggregateId::derived(&STOCK_NAMESPACE, sku))
    }
}

impl core::fmt::Display for StockRecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: StockRecord.
///
/// The per-SKU movement ledger. `stock` is the fold of all recorded
/// movements; it is never written directly. Commands that would take the
/// balance negative are rejected before any event is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    id: StockRecordId,
    sku: String,
    stock: u64,
    threshold: u64,
    opened: bool,
    version: u64,
}

impl StockRecord {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: StockRecordId) -> Self {
        Self {
            id,
            sku: String::new(),
            stock: 0,
            threshold: 0,
            opened: false,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> StockRecordId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    /// Current balance: initial + inbound - outbound, with adjustments
    /// resetting the baseline.
    pub fn stock(&self) -> u64 {
        self.stock
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn exists(&self) -> bool {
        self.opened
    }

    /// At or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.threshold
    }

    /// Check that `requested` units could be taken out right now.
    ///
    /// This is the same guard `Out`/`Transfer` movements run; callers use it
    /// to pre-validate a whole order before committing any line.
    pub fn ensure_available(&self, requested: u64) -> Result<(), DomainError> {
        self.ensure_opened()?;
        if requested > self.stock {
            return Err(DomainError::insufficient_stock(requested, self.stock));
        }
        Ok(())
    }
}

impl AggregateRoot for StockRecord {
    type Id = StockRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStock {
    pub stock_id: StockRecordId,
    pub sku: String,
    pub threshold: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub stock_id: StockRecordId,
    pub movement_type: MovementType,
    pub quantity: u64,
    pub reason: String,
    pub performed_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetThreshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetThreshold {
    pub stock_id: StockRecordId,
    pub threshold: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    OpenStock(OpenStock),
    RecordMovement(RecordMovement),
    SetThreshold(SetThreshold),
}

/// Event: StockOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOpened {
    pub stock_id: StockRecordId,
    pub sku: String,
    pub threshold: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MovementRecorded.
///
/// Carries the balance before and after so the audit trail is replayable
/// without re-running the arithmetic, and so projections can detect gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecorded {
    pub stock_id: StockRecordId,
    pub sku: String,
    pub movement_type: MovementType,
    pub quantity: u64,
    pub previous_stock: u64,
    pub new_stock: u64,
    pub reason: String,
    pub performed_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ThresholdSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub stock_id: StockRecordId,
    pub sku: String,
    pub threshold: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    StockOpened(StockOpened),
    MovementRecorded(MovementRecorded),
    ThresholdSet(ThresholdSet),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::StockOpened(_) => "inventory.stock.opened",
            StockEvent::MovementRecorded(_) => "inventory.stock.movement_recorded",
            StockEvent::ThresholdSet(_) => "inventory.stock.threshold_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::StockOpened(e) => e.occurred_at,
            StockEvent::MovementRecorded(e) => e.occurred_at,
            StockEvent::ThresholdSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockRecord {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::StockOpened(e) => {
                self.id = e.stock_id;
                self.sku = e.sku.clone();
                self.stock = 0;
                self.threshold = e.threshold;
                self.opened = true;
            }
            StockEvent::MovementRecorded(e) => {
                self.stock = e.new_stock;
            }
            StockEvent::ThresholdSet(e) => {
                self.threshold = e.threshold;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::OpenStock(cmd) => self.handle_open(cmd),
            StockCommand::RecordMovement(cmd) => self.handle_record_movement(cmd),
            StockCommand::SetThreshold(cmd) => self.handle_set_threshold(cmd),
        }
    }
}

impl StockRecord {
    fn ensure_stock_id(&self, stock_id: StockRecordId) -> Result<(), DomainError> {
        if self.id != stock_id {
            return Err(DomainError::invariant("stock_id mismatch"));
        }
        Ok(())
    }

    fn ensure_opened(&self) -> Result<(), DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// Compute the balance a movement would leave behind, without applying it.
    fn project_balance(
        &self,
        movement_type: MovementType,
        quantity: u64,
    ) -> Result<u64, DomainError> {
        match movement_type {
            MovementType::In | MovementType::Return => self
                .stock
                .checked_add(quantity)
                .ok_or_else(|| DomainError::invariant("stock balance overflow")),
            MovementType::Out | MovementType::Transfer => {
                if quantity > self.stock {
                    return Err(DomainError::insufficient_stock(quantity, self.stock));
                }
                Ok(self.stock - quantity)
            }
            MovementType::Adjustment => Ok(quantity),
        }
    }

    fn handle_open(&self, cmd: &OpenStock) -> Result<Vec<StockEvent>, DomainError> {
        if self.opened {
            // The stream id is derived from the SKU, so this is the
            // duplicate-SKU case surfacing at the aggregate level.
            return Err(DomainError::conflict("stock record already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        Ok(vec![StockEvent::StockOpened(StockOpened {
            stock_id: cmd.stock_id,
            sku: cmd.sku.clone(),
            threshold: cmd.threshold,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_movement(&self, cmd: &RecordMovement) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_opened()?;
        self.ensure_stock_id(cmd.stock_id)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("movement reason cannot be empty"));
        }
        // Adjustment quantity is an absolute target; zero means "recounted
        // to empty" and is allowed. Delta movements of zero are noise.
        if !cmd.movement_type.is_absolute() && cmd.quantity == 0 {
            return Err(DomainError::validation(
                "movement quantity must be greater than zero",
            ));
        }

        let new_stock = self.project_balance(cmd.movement_type, cmd.quantity)?;

        Ok(vec![StockEvent::MovementRecorded(MovementRecorded {
            stock_id: cmd.stock_id,
            sku: self.sku.clone(),
            movement_type: cmd.movement_type,
            quantity: cmd.quantity,
            previous_stock: self.stock,
            new_stock,
            reason: cmd.reason.clone(),
            performed_by: cmd.performed_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_threshold(&self, cmd: &SetThreshold) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_opened()?;
        self.ensure_stock_id(cmd.stock_id)?;

        if self.threshold == cmd.threshold {
            return Err(DomainError::conflict("threshold unchanged"));
        }

        Ok(vec![StockEvent::ThresholdSet(ThresholdSet {
            stock_id: cmd.stock_id,
            sku: self.sku.clone(),
            threshold: cmd.threshold,
            occurred_at: cmd.occurred_at,
        })])
    }
}
