use serde::{Deserialize, Serialize};

use shopforge_core::DomainError;

/// Kind of ledgered stock change.
///
/// Semantics are asymmetric on purpose:
/// - `In` / `Return` add `quantity` to the balance.
/// - `Out` / `Transfer` subtract `quantity` and require that much stock.
/// - `Adjustment` treats `quantity` as an **absolute target** (a recount),
///   not a delta. Zero is a valid target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    Transfer,
    Return,
}

impl MovementType {
    /// Movements that add to the balance.
    pub fn is_inbound(self) -> bool {
        matches!(self, MovementType::In | MovementType::Return)
    }

    /// Movements that consume stock (and are gated by the guard).
    pub fn is_outbound(self) -> bool {
        matches!(self, MovementType::Out | MovementType::Transfer)
    }

    /// Movements whose quantity is an absolute target, not a delta.
    pub fn is_absolute(self) -> bool {
        matches!(self, MovementType::Adjustment)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Transfer => "TRANSFER",
            MovementType::Return => "RETURN",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            "TRANSFER" => Ok(MovementType::Transfer),
            "RETURN" => Ok(MovementType::Return),
            other => Err(DomainError::validation(format!(
                "unknown movement type: {other}"
            ))),
        }
    }
}
