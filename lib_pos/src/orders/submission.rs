//! # Order Submission
//!
//! Turns the cart into an [`OrderEvent`] and posts it to the events endpoint.
//!
//! ## Clearing policy
//! The cart is cleared exactly once per order, according to [`SubmitPolicy`]:
//! - **`ConfirmThenClear`** waits for a 2xx and only then clears. A failed
//!   delivery leaves the cart as it was and returns the error.
//! - **`Optimistic`** clears immediately and delivers in the background. A
//!   failed delivery is logged and reported on the failure channel together
//!   with the cart contents, so the front end can put the items back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::cart::{Cart, Money};
use crate::menu::MenuItem;
use crate::orders::event::{describe_line, OrderEvent, OrderIdGenerator, ORDER_EVENT_TYPE};
use crate::retrieve::ky_http::{ApiClient, FetchError};

/// Path of the events endpoint, relative to the API base.
pub const EVENTS_PATH: &str = "api/events";

/// When the cart is cleared relative to delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubmitPolicy {
    /// Clear only after the server accepted the order.
    #[default]
    #[value(name = "confirm")]
    #[serde(rename = "confirm")]
    ConfirmThenClear,
    /// Clear at once; report failures on the failure channel.
    Optimistic,
}

/// Who placed the order and where it goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffMeta {
    /// Established at login.
    pub staff_name: String,
    pub table: Option<String>,
    pub customer_name: Option<String>,
    pub note: Option<String>,
}

impl StaffMeta {
    pub fn new(staff_name: impl Into<String>) -> Self {
        Self {
            staff_name: staff_name.into(),
            ..Default::default()
        }
    }
}

/// Whether the server has acknowledged the order yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Confirmed,
    Pending,
}

/// Returned for every order that left the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order_id: String,
    pub total: Money,
    pub lines: usize,
    pub delivery: DeliveryStatus,
}

/// Why an order was not placed.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Nothing in the cart; no request was made.
    #[error("Cart is empty. Please add menu items.")]
    EmptyCart,

    /// Every id in the cart has left the menu; no request was made.
    #[error("None of the items in the cart are on the current menu.")]
    NoKnownItems,

    /// The request was made and failed.
    #[error("Order {order_id} was not delivered: {source}")]
    Delivery {
        order_id: String,
        #[source]
        source: FetchError,
    },
}

/// A background delivery that failed under [`SubmitPolicy::Optimistic`].
#[derive(Debug)]
pub struct DeliveryFailure {
    pub order_id: String,
    /// The cart as it was when the order was submitted.
    pub restored: Cart,
    pub error: FetchError,
}

/// # Order Submitter
///
/// One per terminal. Holds the events client and the identifying details
/// stamped on every order.
pub struct OrderSubmitter {
    client: Arc<ApiClient>,
    company_name: String,
    device_id: String,
    policy: SubmitPolicy,
    ids: OrderIdGenerator,
    failures: Option<mpsc::UnboundedSender<DeliveryFailure>>,
}

impl OrderSubmitter {
    pub fn new(
        client: Arc<ApiClient>,
        company_name: impl Into<String>,
        device_id: impl Into<String>,
        policy: SubmitPolicy,
    ) -> Self {
        Self {
            client,
            company_name: company_name.into(),
            device_id: device_id.into(),
            policy,
            ids: OrderIdGenerator::new(),
            failures: None,
        }
    }

    /// Attaches a channel that receives background delivery failures.
    pub fn with_failure_channel(mut self) -> (Self, mpsc::UnboundedReceiver<DeliveryFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.failures = Some(tx);
        (self, rx)
    }

    pub fn policy(&self) -> SubmitPolicy {
        self.policy
    }

    /// Builds the payload without sending it.
    pub fn build_event(&self, cart: &Cart, catalog: &[MenuItem], staff: &StaffMeta) -> Result<OrderEvent, SubmitError> {
        if cart.is_empty() {
            return Err(SubmitError::EmptyCart);
        }

        let lines = cart.lines(catalog);
        if lines.is_empty() {
            return Err(SubmitError::NoKnownItems);
        }
        let dangling = cart.dangling_ids(catalog);
        if !dangling.is_empty() {
            log::warn!("Dropping {} cart ids no longer on the menu: {:?}", dangling.len(), dangling);
        }

        Ok(OrderEvent {
            kind: ORDER_EVENT_TYPE.to_string(),
            order_id: self.ids.next_id(),
            table: staff.table.clone().unwrap_or_default(),
            items: lines.iter().map(describe_line).collect(),
            note: staff.note.clone().unwrap_or_default(),
            company_name: self.company_name.clone(),
            customer_name: staff.customer_name.clone().unwrap_or_default(),
            device_id: self.device_id.clone(),
            staff_name: staff.staff_name.clone(),
            total_cents: cart.total(catalog).cents(),
        })
    }

    /// Places an order for everything in `cart`.
    ///
    /// Fails fast without a request when the cart is empty or holds only
    /// ids the menu no longer has.
    pub async fn submit(
        &self,
        cart: &mut Cart,
        catalog: &[MenuItem],
        staff: &StaffMeta,
    ) -> Result<OrderReceipt, SubmitError> {
        let event = self.build_event(cart, catalog, staff)?;
        let total = Money::from_cents(event.total_cents);
        let lines = event.items.len();
        let order_id = event.order_id.clone();

        match self.policy {
            SubmitPolicy::ConfirmThenClear => match deliver(&self.client, &event).await {
                Ok(()) => {
                    cart.clear();
                    log::info!("Order {} delivered: {} lines, total {}", order_id, lines, total);
                    Ok(OrderReceipt {
                        order_id,
                        total,
                        lines,
                        delivery: DeliveryStatus::Confirmed,
                    })
                }
                Err(e) => {
                    log::error!("Order {} not delivered, cart kept: {}", order_id, e);
                    Err(SubmitError::Delivery { order_id, source: e })
                }
            },
            SubmitPolicy::Optimistic => {
                let restored = cart.clone();
                cart.clear();

                let client = Arc::clone(&self.client);
                let failures = self.failures.clone();
                tokio::spawn(async move {
                    match deliver(&client, &event).await {
                        Ok(()) => log::info!("Order {} delivered in background", event.order_id),
                        Err(e) => {
                            log::error!("Order {} failed in background: {}", event.order_id, e);
                            if let Some(tx) = failures {
                                let _ = tx.send(DeliveryFailure {
                                    order_id: event.order_id.clone(),
                                    restored,
                                    error: e,
                                });
                            }
                        }
                    }
                });

                Ok(OrderReceipt {
                    order_id,
                    total,
                    lines,
                    delivery: DeliveryStatus::Pending,
                })
            }
        }
    }
}

async fn deliver(client: &ApiClient, event: &OrderEvent) -> Result<(), FetchError> {
    client.post_json(EVENTS_PATH, event).await?.error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::ky_http::ClientOptions;

    fn submitter() -> OrderSubmitter {
        // nothing listens here; these tests must never reach the network
        let client = ApiClient::new("http://127.0.0.1:9", ClientOptions::default()).unwrap();
        OrderSubmitter::new(Arc::new(client), "Yurica", "till-1", SubmitPolicy::ConfirmThenClear)
    }

    #[tokio::test]
    async fn empty_cart_fails_fast() {
        let mut cart = Cart::new();
        let err = submitter().submit(&mut cart, &[], &StaffMeta::new("Tia")).await.unwrap_err();
        assert!(matches!(err, SubmitError::EmptyCart));
        assert_eq!(err.to_string(), "Cart is empty. Please add menu items.");
    }

    #[tokio::test]
    async fn cart_of_unknown_ids_fails_fast_and_is_kept() {
        let mut cart = Cart::new();
        cart.add("ghost");
        let err = submitter().submit(&mut cart, &[], &StaffMeta::new("Tia")).await.unwrap_err();
        assert!(matches!(err, SubmitError::NoKnownItems));
        assert_eq!(cart.quantity_of("ghost"), 1);
    }

    #[test]
    fn event_lists_known_lines_with_metadata() {
        let catalog = vec![
            MenuItem::new("1", "Udon", Money::from_cents(1200)),
            MenuItem::new("2", "Gyoza", Money::from_cents(800)),
        ];
        let mut cart = Cart::new();
        cart.add("1");
        cart.add("1");
        cart.add("2");
        cart.add("gone");
        let staff = StaffMeta {
            staff_name: "Tia".into(),
            table: Some("12".into()),
            customer_name: None,
            note: Some("no onion".into()),
        };
        let event = submitter().build_event(&cart, &catalog, &staff).unwrap();
        assert_eq!(event.items, vec!["Udon x2", "Gyoza x1"]);
        assert_eq!(event.table, "12");
        assert_eq!(event.customer_name, "");
        assert_eq!(event.note, "no onion");
        assert_eq!(event.total_cents, 3200);
        assert!(event.order_id.starts_with("ORD-"));
    }

    #[test]
    fn policy_names_round_trip_through_config_values() {
        let p: SubmitPolicy = serde_json::from_str("\"optimistic\"").unwrap();
        assert_eq!(p, SubmitPolicy::Optimistic);
        let p: SubmitPolicy = serde_json::from_str("\"confirm\"").unwrap();
        assert_eq!(p, SubmitPolicy::ConfirmThenClear);
    }
}
