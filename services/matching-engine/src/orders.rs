//! Active order registry.
//!
//! Owns every active order; the side books and the per-user index only
//! refer to orders by id. An order is inserted when it starts resting and
//! removed when it reaches a terminal status.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use types::ids::{OrderId, UserId};
use types::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("active order {0} not found")]
    OrderNotFound(OrderId),
}

/// Registry of active (non-terminal) orders.
#[derive(Debug, Clone, Default)]
pub struct OrderRegistry {
    orders: HashMap<OrderId, Order>,
    /// Per-user index, kept sorted for deterministic listing.
    user_orders: HashMap<UserId, BTreeSet<OrderId>>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) {
        self.user_orders
            .entry(order.user_id)
            .or_default()
            .insert(order.order_id);
        self.orders.insert(order.order_id, order);
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn get_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&order_id)
    }

    /// Remove an order, dropping it from the per-user index as well.
    pub fn remove(&mut self, order_id: OrderId) -> Result<Order, RegistryError> {
        let order = self
            .orders
            .remove(&order_id)
            .ok_or(RegistryError::OrderNotFound(order_id))?;
        if let Some(ids) = self.user_orders.get_mut(&order.user_id) {
            ids.remove(&order_id);
            if ids.is_empty() {
                self.user_orders.remove(&order.user_id);
            }
        }
        Ok(order)
    }

    /// Active orders of one user, in order id order.
    pub fn user_orders(&self, user_id: UserId) -> Vec<&Order> {
        match self.user_orders.get(&user_id) {
            Some(ids) => ids.iter().filter_map(|id| self.orders.get(id)).collect(),
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::{Price, Quantity};
    use types::order::Direction;

    fn order(seq: u64, user: u64) -> Order {
        Order::new(
            OrderId::derive(seq, 1_708_123_456_789),
            seq,
            UserId(user),
            Direction::BUY,
            Price::from_u64(100),
            Quantity::from_u64(1),
            false,
            1_708_123_456_789,
        )
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = OrderRegistry::new();
        let o = order(1, 100);
        let id = o.order_id;
        registry.insert(o);
        assert!(registry.contains(id));
        assert_eq!(registry.user_orders(UserId(100)).len(), 1);

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.order_id, id);
        assert!(!registry.contains(id));
        assert!(registry.user_orders(UserId(100)).is_empty());
    }

    #[test]
    fn test_remove_missing_is_error() {
        let mut registry = OrderRegistry::new();
        assert_eq!(
            registry.remove(OrderId(99)),
            Err(RegistryError::OrderNotFound(OrderId(99)))
        );
    }

    #[test]
    fn test_user_index_sorted() {
        let mut registry = OrderRegistry::new();
        let a = order(3, 100);
        let b = order(1, 100);
        let c = order(2, 200);
        registry.insert(a);
        registry.insert(b);
        registry.insert(c);

        let ids: Vec<_> = registry
            .user_orders(UserId(100))
            .iter()
            .map(|o| o.sequence_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
