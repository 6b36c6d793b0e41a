use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopforge_catalog::ProductId;
use shopforge_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ValueObject};
use shopforge_events::Event;
use shopforge_orders::OrderId;

/// Stream type name used when dispatching sale commands.
pub const SALE_AGGREGATE_TYPE: &str = "sales.sale";

/// UUIDv5 namespace for order-derived sale stream ids.
const SALE_NAMESPACE: Uuid = Uuid::from_u128(0x1b84_f6d2_0a3e_47c9_b52f_8e61_c4d0_a973);

/// Sale identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Derive the sale id for an order.
    ///
    /// One order, one sale stream: recording a sale for the same order twice
    /// lands on the same stream and fails the create-once check, which is
    /// how the optional 1:1 back-reference stays 1:1.
    pub fn for_order(order_id: OrderId) -> Self {
        Self(AggregateId::derived(&SALE_NAMESPACE, &order_id.to_string()))
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One sale line: what was sold, at what price, against what cost.
///
/// Like order lines, these are purchase-time snapshots; later catalog
/// repricing never changes a recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub sku: String,
    pub product_name: String,
    pub quantity: u64,
    pub unit_price_cents: u64,
    pub unit_cost_cents: u64,
}

impl SaleLine {
    pub fn revenue_cents(&self) -> Option<u64> {
        self.unit_price_cents.checked_mul(self.quantity)
    }

    pub fn cost_cents(&self) -> Option<u64> {
        self.unit_cost_cents.checked_mul(self.quantity)
    }
}

impl ValueObject for SaleLine {}

/// Aggregate root: Sale.
///
/// The revenue-side record of units leaving the building. Order-derived
/// sales carry the order id they were settled from; manual sales stand
/// alone. Both are immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    order_id: Option<OrderId>,
    lines: Vec<SaleLine>,
    revenue_cents: u64,
    cost_cents: u64,
    profit_cents: i64,
    recorded_by: String,
    recorded: bool,
    version: u64,
}

impl Sale {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            order_id: None,
            lines: Vec::new(),
            revenue_cents: 0,
            cost_cents: 0,
            profit_cents: 0,
            recorded_by: String::new(),
            recorded: false,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn revenue_cents(&self) -> u64 {
        self.revenue_cents
    }

    pub fn cost_cents(&self) -> u64 {
        self.cost_cents
    }

    /// Revenue minus cost; negative when goods were sold below cost.
    pub fn profit_cents(&self) -> i64 {
        self.profit_cents
    }

    pub fn recorded_by(&self) -> &str {
        &self.recorded_by
    }

    pub fn exists(&self) -> bool {
        self.recorded
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub order_id: Option<OrderId>,
    pub lines: Vec<SaleLine>,
    pub recorded_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
}

/// Event: SaleRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub order_id: Option<OrderId>,
    pub lines: Vec<SaleLine>,
    pub revenue_cents: u64,
    pub cost_cents: u64,
    pub profit_cents: i64,
    pub recorded_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(_) => "sales.sale.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.order_id = e.order_id;
                self.lines = e.lines.clone();
                self.revenue_cents = e.revenue_cents;
                self.cost_cents = e.cost_cents;
                self.profit_cents = e.profit_cents;
                self.recorded_by = e.recorded_by.clone();
                self.recorded = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => self.handle_record(cmd),
        }
    }
}

impl Sale {
    fn validate_lines(lines: &[SaleLine]) -> Result<(u64, u64), DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("sale must contain at least one line"));
        }

        let mut revenue: u64 = 0;
        let mut cost: u64 = 0;
        for (index, line) in lines.iter().enumerate() {
            if line.line_no != (index as u32) + 1 {
                return Err(DomainError::invariant("line numbers must be contiguous"));
            }
            if line.sku.trim().is_empty() {
                return Err(DomainError::validation("line SKU cannot be empty"));
            }
            if line.product_name.trim().is_empty() {
                return Err(DomainError::validation("line product name cannot be empty"));
            }
            if line.quantity == 0 {
                return Err(DomainError::validation("line quantity must be greater than zero"));
            }
            let line_revenue = line
                .revenue_cents()
                .ok_or_else(|| DomainError::invariant("line revenue overflow"))?;
            let line_cost = line
                .cost_cents()
                .ok_or_else(|| DomainError::invariant("line cost overflow"))?;
            revenue = revenue
                .checked_add(line_revenue)
                .ok_or_else(|| DomainError::invariant("sale revenue overflow"))?;
            cost = cost
                .checked_add(line_cost)
                .ok_or_else(|| DomainError::invariant("sale cost overflow"))?;
        }

        Ok((revenue, cost))
    }

    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.recorded {
            // Order-derived streams are keyed by the order id, so this is
            // also the "sale already recorded for this order" case.
            return Err(DomainError::conflict("sale already recorded"));
        }
        if cmd.recorded_by.trim().is_empty() {
            return Err(DomainError::validation("recorded_by cannot be empty"));
        }

        let (revenue_cents, cost_cents) = Self::validate_lines(&cmd.lines)?;
        let profit_cents = (revenue_cents as i64) - (cost_cents as i64);

        Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
            sale_id: cmd.sale_id,
            order_id: cmd.order_id,
            lines: cmd.lines.clone(),
            revenue_cents,
            cost_cents,
            profit_cents,
            recorded_by: cmd.recorded_by.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
