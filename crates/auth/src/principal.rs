use serde::{Deserialize, Serialize};

use crate::Role;

/// An authenticated caller.
///
/// `subject` is whatever the token issuer put in `sub`; downstream code
/// derives stable identifiers from it (e.g. the customer's cart key)
/// rather than assuming any particular format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
