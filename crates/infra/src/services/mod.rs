//! Application services (reconcilers).
//!
//! Services orchestrate flows that span more than one stream: checkout
//! touches the cart, the payment claim, every stock record, and the order.
//! There is no cross-stream transaction; multi-stream flows use
//! validate-first ordering plus compensating movements, so a failure
//! mid-flow converges back to a consistent state instead of holding locks.
//!
//! Domain crates stay pure; everything here composes the dispatcher, the
//! cart store, and the payment gateway.

use std::env;

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod sales;
mod stock_ops;

pub use cart::CartService;
pub use checkout::CheckoutService;
pub use orders::{NewOrderLine, OrderService};
pub use products::{NewProduct, ProductService};
pub use sales::{ManualSaleLine, SaleService};

/// Pricing knobs applied when an order total is computed.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// Flat shipping charge per order, in cents.
    pub shipping_flat_cents: u64,
    /// Tax rate in basis points (1/100th of a percent) of the subtotal.
    pub tax_rate_bps: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            shipping_flat_cents: 500,
            tax_rate_bps: 0,
        }
    }
}

impl CheckoutConfig {
    /// Read `SHIPPING_FLAT_CENTS` and `TAX_RATE_BPS` from the environment,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            shipping_flat_cents: env_u64("SHIPPING_FLAT_CENTS", defaults.shipping_flat_cents),
            tax_rate_bps: env_u64("TAX_RATE_BPS", defaults.tax_rate_bps),
        }
    }

    pub fn totals_for(&self, subtotal_cents: u64) -> OrderTotals {
        let tax_cents = subtotal_cents.saturating_mul(self.tax_rate_bps) / 10_000;
        let shipping_cents = self.shipping_flat_cents;
        let discount_cents = 0;
        OrderTotals {
            subtotal_cents,
            tax_cents,
            shipping_cents,
            discount_cents,
            total_cents: subtotal_cents
                .saturating_add(tax_cents)
                .saturating_add(shipping_cents)
                .saturating_sub(discount_cents),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// The money breakdown of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal_cents: u64,
    pub tax_cents: u64,
    pub shipping_cents: u64,
    pub discount_cents: u64,
    pub total_cents: u64,
}
