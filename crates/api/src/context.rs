//! Per-request context injected by the auth middleware.

use shopforge_auth::Principal;
use shopforge_orders::CustomerId;

/// The authenticated principal, available to every protected handler via
/// request extensions.
#[derive(Debug, Clone)]
pub struct PrincipalContext(Principal);

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self(principal)
    }

    pub fn principal(&self) -> &Principal {
        &self.0
    }

    pub fn subject(&self) -> &str {
        &self.0.subject
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }

    /// Deterministic customer id for the token subject. Cart and order
    /// ownership key off this, so the same subject always maps to the
    /// same customer.
    pub fn customer_id(&self) -> CustomerId {
        CustomerId::for_subject(&self.0.subject)
    }
}
