//! Handler-level permission gate.
//!
//! Roles map to permission sets in `shopforge-auth`; handlers name the
//! permission they need and get back the 403 response to send when the
//! principal's role does not grant it.

use axum::http::StatusCode;
use axum::response::Response;

use shopforge_auth::{authorize, Permission};

use crate::app::errors;
use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(principal.principal(), permission)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopforge_auth::{perms, Principal, Role};

    #[test]
    fn admins_pass_every_gate() {
        let ctx = PrincipalContext::new(Principal::new("ops", Role::Admin));
        assert!(require(&ctx, &perms::INVENTORY_WRITE).is_ok());
        assert!(require(&ctx, &perms::EVENTS_READ).is_ok());
    }

    #[test]
    fn customers_are_refused_admin_surfaces() {
        let ctx = PrincipalContext::new(Principal::new("alice", Role::Customer));
        assert!(require(&ctx, &perms::CART_MANAGE).is_ok());
        assert!(require(&ctx, &perms::CATALOG_WRITE).is_err());
    }
}
