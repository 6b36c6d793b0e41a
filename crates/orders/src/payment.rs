use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shopforge_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use shopforge_events::Event;

use crate::order::OrderId;

/// Stream type name used when dispatching payment claim commands.
pub const CLAIM_AGGREGATE_TYPE: &str = "orders.claim";

/// UUIDv5 namespace for reference-derived claim stream ids.
const CLAIM_NAMESPACE: Uuid = Uuid::from_u128(0xd2c7_5e0a_91b3_4c6d_8f04_a7e3_b61c_9d28);

/// Payment claim identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentClaimId(pub AggregateId);

impl PaymentClaimId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Derive the claim id for a gateway payment reference.
    ///
    /// One reference, one stream: replaying a confirmation lands on the
    /// claim that already consumed the reference and is turned away before
    /// any stock or order side effect runs.
    pub fn for_reference(reference: &str) -> Self {
        Self(AggregateId::derived(&CLAIM_NAMESPACE, reference))
    }
}

impl core::fmt::Display for PaymentClaimId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: PaymentClaim.
///
/// Tracks whether a gateway payment reference has been consumed by an
/// order. A claim is held from capture until either the order sticks
/// (held forever) or the confirmation fails partway and the claim is
/// released so the reference can be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentClaim {
    id: PaymentClaimId,
    reference: String,
    amount_cents: u64,
    order_id: Option<OrderId>,
    held: bool,
    captured_once: bool,
    version: u64,
}

impl PaymentClaim {
    /// Create an empty, never-captured aggregate instance for rehydration.
    pub fn empty(id: PaymentClaimId) -> Self {
        Self {
            id,
            reference: String::new(),
            amount_cents: 0,
            order_id: None,
            held: false,
            captured_once: false,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> PaymentClaimId {
        self.id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn amount_cents(&self) -> u64 {
        self.amount_cents
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    /// Currently consumed by an order.
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn exists(&self) -> bool {
        self.captured_once
    }
}

impl AggregateRoot for PaymentClaim {
    type Id = PaymentClaimId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CapturePayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePayment {
    pub claim_id: PaymentClaimId,
    pub reference: String,
    pub amount_cents: u64,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleasePayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePayment {
    pub claim_id: PaymentClaimId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentClaimCommand {
    CapturePayment(CapturePayment),
    ReleasePayment(ReleasePayment),
}

/// Event: PaymentCaptured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCaptured {
    pub claim_id: PaymentClaimId,
    pub reference: String,
    pub amount_cents: u64,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReleased {
    pub claim_id: PaymentClaimId,
    pub reference: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentClaimEvent {
    PaymentCaptured(PaymentCaptured),
    PaymentReleased(PaymentReleased),
}

impl Event for PaymentClaimEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentClaimEvent::PaymentCaptured(_) => "orders.claim.captured",
            PaymentClaimEvent::PaymentReleased(_) => "orders.claim.released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentClaimEvent::PaymentCaptured(e) => e.occurred_at,
            PaymentClaimEvent::PaymentReleased(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentClaim {
    type Command = PaymentClaimCommand;
    type Event = PaymentClaimEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentClaimEvent::PaymentCaptured(e) => {
                self.id = e.claim_id;
                self.reference = e.reference.clone();
                self.amount_cents = e.amount_cents;
                self.order_id = Some(e.order_id);
                self.held = true;
                self.captured_once = true;
            }
            PaymentClaimEvent::PaymentReleased(_) => {
                self.order_id = None;
                self.held = false;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentClaimCommand::CapturePayment(cmd) => self.handle_capture(cmd),
            PaymentClaimCommand::ReleasePayment(cmd) => self.handle_release(cmd),
        }
    }
}

impl PaymentClaim {
    fn handle_capture(&self, cmd: &CapturePayment) -> Result<Vec<PaymentClaimEvent>, DomainError> {
        if self.held {
            return Err(DomainError::conflict("payment reference already consumed"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("payment reference cannot be empty"));
        }
        if cmd.amount_cents == 0 {
            return Err(DomainError::validation("amount must be greater than zero"));
        }

        Ok(vec![PaymentClaimEvent::PaymentCaptured(PaymentCaptured {
            claim_id: cmd.claim_id,
            reference: cmd.reference.clone(),
            amount_cents: cmd.amount_cents,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleasePayment) -> Result<Vec<PaymentClaimEvent>, DomainError> {
        if !self.captured_once {
            return Err(DomainError::not_found());
        }
        if !self.held {
            return Err(DomainError::conflict("claim is not held"));
        }

        Ok(vec![PaymentClaimEvent::PaymentReleased(PaymentReleased {
            claim_id: cmd.claim_id,
            reference: self.reference.clone(),
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopforge_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn capture_cmd(claim_id: PaymentClaimId, reference: &str) -> CapturePayment {
        CapturePayment {
            claim_id,
            reference: reference.to_string(),
            amount_cents: 2_500,
            order_id: OrderId::new(AggregateId::new()),
            occurred_at: test_time(),
        }
    }

    #[test]
    fn capture_emits_payment_captured() {
        let claim_id = PaymentClaimId::for_reference("pi_test_001");
        let claim = PaymentClaim::empty(claim_id);

        let events = claim
            .handle(&PaymentClaimCommand::CapturePayment(capture_cmd(
                claim_id,
                "pi_test_001",
            )))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            PaymentClaimEvent::PaymentCaptured(e) => {
                assert_eq!(e.reference, "pi_test_001");
                assert_eq!(e.amount_cents, 2_500);
            }
            other => panic!("Expected PaymentCaptured event, got {other:?}"),
        }
    }

    #[test]
    fn same_reference_derives_same_stream_id() {
        assert_eq!(
            PaymentClaimId::for_reference("pi_test_001"),
            PaymentClaimId::for_reference("pi_test_001")
        );
        assert_ne!(
            PaymentClaimId::for_reference("pi_test_001"),
            PaymentClaimId::for_reference("pi_test_002")
        );
    }

    #[test]
    fn replayed_capture_is_rejected() {
        let claim_id = PaymentClaimId::for_reference("pi_test_001");
        let mut claim = PaymentClaim::empty(claim_id);
        let cmd = PaymentClaimCommand::CapturePayment(capture_cmd(claim_id, "pi_test_001"));

        execute(&mut claim, &cmd).unwrap();
        assert!(claim.is_held());

        let err = claim.handle(&cmd).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            other => panic!("Expected Conflict error for consumed reference, got {other:?}"),
        }
    }

    #[test]
    fn release_then_recapture_is_allowed() {
        let claim_id = PaymentClaimId::for_reference("pi_test_001");
        let mut claim = PaymentClaim::empty(claim_id);

        execute(
            &mut claim,
            &PaymentClaimCommand::CapturePayment(capture_cmd(claim_id, "pi_test_001")),
        )
        .unwrap();

        execute(
            &mut claim,
            &PaymentClaimCommand::ReleasePayment(ReleasePayment {
                claim_id,
                reason: "stock ran out during confirmation".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert!(!claim.is_held());
        assert_eq!(claim.order_id(), None);

        execute(
            &mut claim,
            &PaymentClaimCommand::CapturePayment(capture_cmd(claim_id, "pi_test_001")),
        )
        .unwrap();
        assert!(claim.is_held());
        assert_eq!(claim.version(), 3);
    }

    #[test]
    fn release_requires_held_claim() {
        let claim_id = PaymentClaimId::for_reference("pi_test_001");
        let claim = PaymentClaim::empty(claim_id);
        let cmd = ReleasePayment {
            claim_id,
            reason: "noop".to_string(),
            occurred_at: test_time(),
        };

        let err = claim
            .handle(&PaymentClaimCommand::ReleasePayment(cmd))
            .unwrap_err();
        match err {
            DomainError::NotFound => {}
            other => panic!("Expected NotFound error, got {other:?}"),
        }
    }

    #[test]
    fn double_release_is_rejected() {
        let claim_id = PaymentClaimId::for_reference("pi_test_001");
        let mut claim = PaymentClaim::empty(claim_id);

        execute(
            &mut claim,
            &PaymentClaimCommand::CapturePayment(capture_cmd(claim_id, "pi_test_001")),
        )
        .unwrap();

        let release = PaymentClaimCommand::ReleasePayment(ReleasePayment {
            claim_id,
            reason: "stock ran out during confirmation".to_string(),
            occurred_at: test_time(),
        });
        execute(&mut claim, &release).unwrap();

        let err = claim.handle(&release).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            other => panic!("Expected Conflict error for double release, got {other:?}"),
        }
    }

    #[test]
    fn capture_rejects_blank_reference_and_zero_amount() {
        let claim_id = PaymentClaimId::for_reference("pi_test_001");
        let claim = PaymentClaim::empty(claim_id);

        let mut cmd = capture_cmd(claim_id, "pi_test_001");
        cmd.reference = "  ".to_string();
        match claim
            .handle(&PaymentClaimCommand::CapturePayment(cmd))
            .unwrap_err()
        {
            DomainError::Validation(_) => {}
            other => panic!("Expected Validation error for blank reference, got {other:?}"),
        }

        let mut cmd = capture_cmd(claim_id, "pi_test_001");
        cmd.amount_cents = 0;
        match claim
            .handle(&PaymentClaimCommand::CapturePayment(cmd))
            .unwrap_err()
        {
            DomainError::Validation(_) => {}
            other => panic!("Expected Validation error for zero amount, got {other:?}"),
        }
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let claim_id = PaymentClaimId::for_reference("pi_test_001");
        let claim = PaymentClaim::empty(claim_id);
        let before = claim.clone();

        let cmd = PaymentClaimCommand::CapturePayment(capture_cmd(claim_id, "pi_test_001"));
        let events1 = claim.handle(&cmd).unwrap();
        let events2 = claim.handle(&cmd).unwrap();

        assert_eq!(claim, before);
        assert_eq!(events1, events2);
    }
}
