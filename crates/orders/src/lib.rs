//! Orders domain module (event-sourced, except the cart).
//!
//! An order is an immutable snapshot of what was bought at the price it was
//! bought for; later catalog edits never reach into placed orders. The cart
//! is the one mutable working set in the system and is deliberately NOT
//! event-sourced: it is scratch space, replaced in place and discarded at
//! checkout. Payment claims make confirmation replay-safe: one gateway
//! reference can be consumed by at most one order.

pub mod cart;
pub mod order;
pub mod payment;

pub use cart::{Cart, CartLine, CustomerId};
pub use order::{
    CancelOrder, Order, OrderCancelled, OrderCommand, OrderEvent, OrderId, OrderLine,
    OrderPlaced, OrderRefunded, OrderStatus, OrderStatusChanged, PaymentStatus, PlaceOrder,
    RefundOrder, UpdateOrderStatus, ORDER_AGGREGATE_TYPE,
};
pub use payment::{
    CapturePayment, PaymentCaptured, PaymentClaim, PaymentClaimCommand, PaymentClaimEvent,
    PaymentClaimId, PaymentReleased, ReleasePayment, CLAIM_AGGREGATE_TYPE,
};
