//! # Cart Engine
//!
//! Client-local mapping of menu item ids to the quantities staff selected,
//! plus the [`Money`] type used for every price and total in the crate.
//!
//! Every mutation goes through [`Cart::add`], [`Cart::decrement`] or
//! [`Cart::clear`], which keep the one invariant of the mapping: a stored
//! quantity is always at least 1. An id that is not in the mapping has
//! quantity zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::menu::MenuItem;

/// A monetary amount in minor units (cents).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// From minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// From major units, rounded to the nearest cent.
    pub fn from_major(amount: f64) -> Self {
        Money((amount * 100.0).round() as i64)
    }

    /// The amount in minor units.
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// The amount in major units (e.g. dollars).
    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `self * quantity`, saturating instead of overflowing.
    pub fn times(self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// One resolved cart line: a known menu item and how many were ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine<'a> {
    pub item: &'a MenuItem,
    pub quantity: u32,
}

impl CartLine<'_> {
    /// `price × quantity`.
    pub fn subtotal(&self) -> Money {
        self.item.price.times(self.quantity)
    }
}

/// Item id → quantity, with no zero entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    entries: BTreeMap<String, u32>,
}

impl Cart {
    /// An empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one of `item_id`, creating the entry if needed. Returns the new quantity.
    pub fn add(&mut self, item_id: &str) -> u32 {
        let qty = self.entries.entry(item_id.to_string()).or_insert(0);
        *qty = qty.saturating_add(1);
        *qty
    }

    /// Removes one of `item_id`. The entry disappears when it reaches zero.
    /// Returns the remaining quantity.
    pub fn decrement(&mut self, item_id: &str) -> u32 {
        match self.entries.get_mut(item_id) {
            Some(qty) if *qty > 1 => {
                *qty -= 1;
                *qty
            }
            Some(_) => {
                self.entries.remove(item_id);
                0
            }
            None => 0,
        }
    }

    /// Stored quantity, or 0 when absent.
    pub fn quantity_of(&self, item_id: &str) -> u32 {
        self.entries.get(item_id).copied().unwrap_or(0)
    }

    /// Sum of `quantity × price` over entries whose id is in `catalog`.
    /// Entries for ids the catalog no longer has contribute nothing.
    pub fn total(&self, catalog: &[MenuItem]) -> Money {
        self.entries
            .iter()
            .filter_map(|(id, qty)| catalog.iter().find(|item| &item.id == id).map(|item| item.price.times(*qty)))
            .sum()
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct ids in the cart.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total number of units across all entries.
    pub fn unit_count(&self) -> u64 {
        self.entries.values().map(|q| u64::from(*q)).sum()
    }

    /// Raw `(id, quantity)` pairs, ordered by id.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.entries.iter().map(|(id, qty)| (id.as_str(), *qty))
    }

    /// Lines for ids present in `catalog`, in catalog order.
    pub fn lines<'a>(&self, catalog: &'a [MenuItem]) -> Vec<CartLine<'a>> {
        catalog
            .iter()
            .filter_map(|item| {
                self.entries
                    .get(&item.id)
                    .map(|qty| CartLine { item, quantity: *qty })
            })
            .collect()
    }

    /// Ids in the cart that `catalog` does not know.
    pub fn dangling_ids<'a>(&'a self, catalog: &[MenuItem]) -> Vec<&'a str> {
        self.entries
            .keys()
            .filter(|id| !catalog.iter().any(|item| &item.id == *id))
            .map(String::as_str)
            .collect()
    }
}
