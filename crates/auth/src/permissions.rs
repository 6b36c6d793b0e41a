use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "inventory.write").
/// The wildcard permission `"*"` means "allow all" and is what the admin
/// role grants, so new permissions never need an admin migration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn borrowed(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The permission vocabulary of the API surface.
pub mod perms {
    use super::Permission;

    pub const ALL: Permission = Permission::borrowed("*");
    pub const CATALOG_READ: Permission = Permission::borrowed("catalog.read");
    pub const CATALOG_WRITE: Permission = Permission::borrowed("catalog.write");
    pub const INVENTORY_READ: Permission = Permission::borrowed("inventory.read");
    pub const INVENTORY_WRITE: Permission = Permission::borrowed("inventory.write");
    pub const CART_MANAGE: Permission = Permission::borrowed("cart.manage");
    pub const CHECKOUT: Permission = Permission::borrowed("checkout");
    pub const ORDERS_READ: Permission = Permission::borrowed("orders.read");
    pub const ORDERS_WRITE: Permission = Permission::borrowed("orders.write");
    pub const SALES_READ: Permission = Permission::borrowed("sales.read");
    pub const SALES_WRITE: Permission = Permission::borrowed("sales.write");
    pub const EVENTS_READ: Permission = Permission::borrowed("events.read");
    pub const STREAM_READ: Permission = Permission::borrowed("stream.read");
}

/// Permissions granted by a role.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    const ADMIN: &[Permission] = &[perms::ALL];
    const CUSTOMER: &[Permission] = &[
        perms::CATALOG_READ,
        perms::CART_MANAGE,
        perms::CHECKOUT,
        perms::ORDERS_READ,
        perms::STREAM_READ,
    ];
    match role {
        Role::Admin => ADMIN,
        Role::Customer => CUSTOMER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_only_the_wildcard() {
        let granted = role_permissions(Role::Admin);
        assert_eq!(granted.len(), 1);
        assert!(granted[0].is_wildcard());
    }

    #[test]
    fn customers_cannot_touch_write_surfaces() {
        let granted = role_permissions(Role::Customer);
        assert!(!granted.contains(&perms::CATALOG_WRITE));
        assert!(!granted.contains(&perms::INVENTORY_WRITE));
        assert!(!granted.contains(&perms::ORDERS_WRITE));
        assert!(!granted.iter().any(Permission::is_wildcard));
    }
}
