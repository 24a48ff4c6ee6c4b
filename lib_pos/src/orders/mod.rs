//! # Orders Module
//!
//! Packaging the cart into an outbound order event and delivering it.
//!
//! - **`event`**: the `OrderEvent` payload and the order id generator.
//! - **`submission`**: `OrderSubmitter` and the cart clearing policy.

/// Order payload and ids.
pub mod event;
/// Delivery and cart clearing.
pub mod submission;

pub use event::{OrderEvent, OrderIdGenerator};
pub use submission::{
    DeliveryFailure, DeliveryStatus, OrderReceipt, OrderSubmitter, StaffMeta, SubmitError, SubmitPolicy,
};
