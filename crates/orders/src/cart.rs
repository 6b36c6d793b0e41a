use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopforge_catalog::ProductId;
use shopforge_core::{AggregateId, DomainError, Entity, ValueObject};

/// UUIDv5 namespace for subject-derived customer ids.
const CUSTOMER_NAMESPACE: Uuid = Uuid::from_u128(0x6e2a_8c91_d4f7_42b3_a15d_0c7e_39b8_f254);

/// Customer identifier.
///
/// Derived from the authenticated principal's subject so that the same
/// caller always lands on the same cart without a registration step.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub AggregateId);

impl CustomerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_subject(subject: &str) -> Self {
        Self(AggregateId::derived(&CUSTOMER_NAMESPACE, subject))
    }
}

impl core::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One cart line: a product snapshot plus a quantity.
///
/// Price and name are captured when the line is added; the checkout
/// reconciler re-reads the catalog before charging, so a stale snapshot can
/// never be silently billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: u64,
    pub quantity: u64,
}

impl CartLine {
    pub fn line_total_cents(&self) -> u64 {
        self.unit_price_cents.saturating_mul(self.quantity)
    }
}

impl ValueObject for CartLine {}

/// The customer's working set. Mutable, not event-sourced.
///
/// Stock is NOT reserved by the cart; availability is checked when a line
/// is added and re-checked at confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    customer_id: CustomerId,
    lines: Vec<CartLine>,
    updated_at: DateTime<Utc>,
}

impl Entity for Cart {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.customer_id
    }
}

impl Cart {
    pub fn new(customer_id: CustomerId, now: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            lines: Vec::new(),
            updated_at: now,
        }
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal_cents(&self) -> u64 {
        self.lines.iter().map(CartLine::line_total_cents).sum()
    }

    pub fn quantity_of(&self, product_id: ProductId) -> u64 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.quantity)
    }

    /// Add a line, merging with an existing line for the same product.
    pub fn add_line(&mut self, line: CartLine, now: DateTime<Utc>) -> Result<(), DomainError> {
        if line.quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if line.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        match self.lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                // Refresh the snapshot so the most recent catalog read wins.
                existing.sku = line.sku;
                existing.name = line.name;
                existing.unit_price_cents = line.unit_price_cents;
            }
            None => self.lines.push(line),
        }
        self.updated_at = now;
        Ok(())
    }

    /// Replace the quantity of an existing line.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u64,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation(
                "quantity must be greater than zero; remove the line instead",
            ));
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(DomainError::NotFound)?;
        line.quantity = quantity;
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_line(
        &mut self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before {
            return Err(DomainError::NotFound);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.updated_at = now;
    }
}
