//! Ask (sell-side) order book index.
//!
//! Maintains sell orders sorted by price ascending (best ask first), with
//! the creating event's sequence id as the time tie-break.

use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::Price;

/// Priority key for the sell side: lowest price first, then oldest
/// sequence id.
type AskKey = (Price, u64);

/// Ask (sell) side order book index.
#[derive(Debug, Clone, Default)]
pub struct AskBook {
    entries: BTreeMap<AskKey, OrderId>,
}

impl AskBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, price: Price, sequence_id: u64, order_id: OrderId) {
        self.entries.insert((price, sequence_id), order_id);
    }

    /// Remove an entry, returning the order id if it was present.
    pub fn remove(&mut self, price: Price, sequence_id: u64) -> Option<OrderId> {
        self.entries.remove(&(price, sequence_id))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_price_first() {
        let mut book = AskBook::new();
        book.insert(Price::from_u64(50000), 1, OrderId(10));
        book.insert(Price::from_u64(51000), 2, OrderId(20));
        book.insert(Price::from_u64(49000), 3, OrderId(30));

        assert_eq!(book.first(), Some(OrderId(30)));
        let ids: Vec<_> = book.iter().collect();
        assert_eq!(ids, vec![OrderId(30), OrderId(10), OrderId(20)]);
    }

    #[test]
    fn test_fifo_within_price() {
        let mut book = AskBook::new();
        book.insert(Price::from_u64(50000), 5, OrderId(50));
        book.insert(Price::from_u64(50000), 2, OrderId(20));

        assert_eq!(book.first(), Some(OrderId(20)));
    }

    #[test]
    fn test_remove() {
        let mut book = AskBook::new();
        book.insert(Price::from_u64(50000), 1, OrderId(10));
        assert_eq!(book.remove(Price::from_u64(50000), 1), Some(OrderId(10)));
        assert!(book.is_empty());
    }
}
