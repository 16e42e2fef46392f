//! Bid (buy-side) order book index.
//!
//! Maintains buy orders sorted by price descending (best bid first), with
//! the creating event's sequence id as the time tie-break. Uses BTreeMap
//! for deterministic iteration order.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::Price;

/// Priority key for the buy side: highest price first, then oldest
/// sequence id.
type BidKey = (Reverse<Price>, u64);

/// Bid (buy) side order book index.
#[derive(Debug, Clone, Default)]
pub struct BidBook {
    entries: BTreeMap<BidKey, OrderId>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, price: Price, sequence_id: u64, order_id: OrderId) {
        self.entries.insert((Reverse(price), sequence_id), order_id);
    }

    /// Remove an entry, returning the order id if it was present.
    pub fn remove(&mut self, price: Price, sequence_id: u64) -> Option<OrderId> {
        self.entries.remove(&(Reverse(price), sequence_id))
    }

    /// The highest-priority order: best price, oldest within that price.
    pub fn first(&self) -> Option<OrderId> {
        self.entries.values().next().copied()
    }

    /// All order ids in matching priority order.
    pub fn iter(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.entries.values().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
