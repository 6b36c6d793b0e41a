//! Payment gateway port.
//!
//! The checkout reconciler only needs two things from a gateway: mint an
//! intent for an amount, and read an intent back by reference. A real
//! integration is an external collaborator; development and tests run on
//! the in-process fake, which can auto-settle intents (dev profile) or
//! leave settlement to the test driving it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::command_dispatcher::DispatchError;

/// Gateway-side lifecycle of a payment intent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPayment,
    Succeeded,
    Failed,
}

/// A payment intent as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway reference, e.g. `pi_018f3c...`. This is the key the claim
    /// stream is derived from.
    pub reference: String,
    pub amount_cents: u64,
    pub status: PaymentIntentStatus,
}

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("payment intent not found")]
    NotFound,

    #[error("payment gateway error: {0}")]
    Gateway(String),
}

impl From<PaymentGatewayError> for DispatchError {
    fn from(value: PaymentGatewayError) -> Self {
        match value {
            PaymentGatewayError::NotFound => DispatchError::NotFound,
            PaymentGatewayError::Gateway(msg) => {
                DispatchError::Validation(format!("payment gateway error: {msg}"))
            }
        }
    }
}

/// Payment gateway port.
pub trait PaymentGateway: Send + Sync {
    fn create_intent(&self, amount_cents: u64) -> Result<PaymentIntent, PaymentGatewayError>;

    fn retrieve(&self, reference: &str) -> Result<PaymentIntent, PaymentGatewayError>;
}

impl<G> PaymentGateway for Arc<G>
where
    G: PaymentGateway + ?Sized,
{
    fn create_intent(&self, amount_cents: u64) -> Result<PaymentIntent, PaymentGatewayError> {
        (**self).create_intent(amount_cents)
    }

    fn retrieve(&self, reference: &str) -> Result<PaymentIntent, PaymentGatewayError> {
        (**self).retrieve(reference)
    }
}

/// In-process gateway fake.
///
/// With `auto_settle`, every intent is created already `Succeeded` so the
/// dev profile can check out without a settlement step. Without it, tests
/// drive the lifecycle explicitly via `settle`/`fail`.
#[derive(Debug)]
pub struct InMemoryPaymentGateway {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    auto_settle: bool,
}

impl InMemoryPaymentGateway {
    pub fn new(auto_settle: bool) -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            auto_settle,
        }
    }

    /// Mark an intent as succeeded (test/dev control surface).
    pub fn settle(&self, reference: &str) -> Result<(), PaymentGatewayError> {
        self.set_status(reference, PaymentIntentStatus::Succeeded)
    }

    /// Mark an intent as failed (test/dev control surface).
    pub fn fail(&self, reference: &str) -> Result<(), PaymentGatewayError> {
        self.set_status(reference, PaymentIntentStatus::Failed)
    }

    fn set_status(
        &self,
        reference: &str,
        status: PaymentIntentStatus,
    ) -> Result<(), PaymentGatewayError> {
        let mut intents = self
            .intents
            .lock()
            .map_err(|_| PaymentGatewayError::Gateway("lock poisoned".to_string()))?;
        let intent = intents
            .get_mut(reference)
            .ok_or(PaymentGatewayError::NotFound)?;
        intent.status = status;
        Ok(())
    }
}

impl PaymentGateway for InMemoryPaymentGateway {
    fn create_intent(&self, amount_cents: u64) -> Result<PaymentIntent, PaymentGatewayError> {
        let intent = PaymentIntent {
            reference: format!("pi_{}", Uuid::now_v7().simple()),
            amount_cents,
            status: if self.auto_settle {
                PaymentIntentStatus::Succeeded
            } else {
                PaymentIntentStatus::RequiresPayment
            },
        };

        let mut intents = self
            .intents
            .lock()
            .map_err(|_| PaymentGatewayError::Gateway("lock poisoned".to_string()))?;
        intents.insert(intent.reference.clone(), intent.clone());
        Ok(intent)
    }

    fn retrieve(&self, reference: &str) -> Result<PaymentIntent, PaymentGatewayError> {
        let intents = self
            .intents
            .lock()
            .map_err(|_| PaymentGatewayError::Gateway("lock poisoned".to_string()))?;
        intents
            .get(reference)
            .cloned()
            .ok_or(PaymentGatewayError::NotFound)
    }
}
