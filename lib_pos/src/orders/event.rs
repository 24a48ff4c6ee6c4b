//! Outbound order payload and order id generation.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::utils::misc::utils::unix_millis;

/// Value of the `type` field for a new order.
pub const ORDER_EVENT_TYPE: &str = "order";

/// Body of `POST /api/events` for a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub order_id: String,
    pub table: String,
    /// One entry per line: `"<name> x<qty>"`.
    pub items: Vec<String>,
    pub note: String,
    pub company_name: String,
    pub customer_name: String,
    pub device_id: String,
    pub staff_name: String,
    pub total_cents: i64,
}

/// Renders one cart line for the event's `items` list.
pub fn describe_line(line: &CartLine<'_>) -> String {
    format!("{} x{}", line.item.name, line.quantity)
}

/// # Order Id Generator
///
/// `ORD-<unix millis>`, strictly increasing for the lifetime of the process:
/// two orders in the same millisecond get consecutive values. Not unique
/// across devices.
#[derive(Debug, Default)]
pub struct OrderIdGenerator {
    last: AtomicI64,
}

impl OrderIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let now = unix_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return format!("ORD-{}", candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_increasing() {
        let generator = OrderIdGenerator::new();
        let ids: Vec<String> = (0..1000).map(|_| generator.next_id()).collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let stamps: Vec<i64> = ids
            .iter()
            .map(|id| id.trim_start_matches("ORD-").parse().unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn event_uses_camel_case_keys() {
        let event = OrderEvent {
            kind: ORDER_EVENT_TYPE.into(),
            order_id: "ORD-1".into(),
            table: "5".into(),
            items: vec!["Udon x2".into()],
            note: String::new(),
            company_name: "Yurica".into(),
            customer_name: "Walk-in".into(),
            device_id: "till-1".into(),
            staff_name: "Tia".into(),
            total_cents: 2400,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "order");
        assert_eq!(value["orderId"], "ORD-1");
        assert_eq!(value["companyName"], "Yurica");
        assert_eq!(value["deviceId"], "till-1");
        assert_eq!(value["items"][0], "Udon x2");
    }
}
