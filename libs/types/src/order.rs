//! Order lifecycle types.

use crate::ids::{OrderId, UserId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order direction (buyer or seller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Buy order (bid).
    BUY,
    /// Sell order (ask).
    SELL,
}

impl Direction {
    /// Get the opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::BUY => Direction::SELL,
            Direction::SELL => Direction::BUY,
        }
    }
}

/// Order status, derived from fill and cancel history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, no fills yet.
    Pending,
    /// Some quantity filled, remainder still active.
    PartialFilled,
    /// Completely filled (terminal).
    FullyFilled,
    /// Cancelled after partial fills (terminal).
    PartialCancelled,
    /// Cancelled with no fills (terminal).
    FullyCancelled,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible).
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::FullyFilled | OrderStatus::PartialCancelled | OrderStatus::FullyCancelled
        )
    }
}

/// A limit order.
///
/// Owned by the order registry while active; the side books only index it
/// by `(price, sequence_id)`. Mutated exclusively on the orchestrator
/// thread, by the matching engine (fills) and the cancel path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    /// Sequence id of the event that created this order. Tie-break key for
    /// price-time priority.
    pub sequence_id: u64,
    pub user_id: UserId,
    pub direction: Direction,
    pub price: Price,
    pub quantity: Quantity,
    pub unfilled_quantity: Quantity,
    pub status: OrderStatus,
    /// Immediate-or-cancel: any unfilled remainder is cancelled instead of
    /// resting on the book.
    pub ioc: bool,
    pub created_at: i64, // Unix millis
    pub updated_at: i64, // Unix millis
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        sequence_id: u64,
        user_id: UserId,
        direction: Direction,
        price: Price,
        quantity: Quantity,
        ioc: bool,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id,
            sequence_id,
            user_id,
            direction,
            price,
            quantity,
            unfilled_quantity: quantity,
            status: OrderStatus::Pending,
            ioc,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.quantity
            .checked_sub(self.unfilled_quantity)
            .unwrap_or_else(Quantity::zero)
    }

    pub fn is_fully_filled(&self) -> bool {
        self.unfilled_quantity.is_zero()
    }

    /// Apply a fill and derive the new status.
    ///
    /// # Panics
    /// Panics if the fill exceeds the unfilled quantity.
    pub fn fill(&mut self, quantity: Quantity, timestamp: i64) {
        let remaining = self
            .unfilled_quantity
            .checked_sub(quantity)
            .expect("fill exceeds unfilled quantity");
        self.unfilled_quantity = remaining;
        self.status = if remaining.is_zero() {
            OrderStatus::FullyFilled
        } else {
            OrderStatus::PartialFilled
        };
        self.updated_at = timestamp;
    }

    /// Mark the order cancelled, deriving partial vs. full cancellation.
    pub fn cancel(&mut self, timestamp: i64) {
        self.status = if self.unfilled_quantity == self.quantity {
            OrderStatus::FullyCancelled
        } else {
            OrderStatus::PartialCancelled
        };
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order(qty: u64) -> Order {
        Order::new(
            OrderId::derive(1, 1_708_123_456_789),
            1,
            UserId(100),
            Direction::BUY,
            Price::from_u64(50000),
            Quantity::from_u64(qty),
            false,
            1_708_123_456_789,
        )
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::BUY.opposite(), Direction::SELL);
        assert_eq!(Direction::SELL.opposite(), Direction::BUY);
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = test_order(2);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.unfilled_quantity, order.quantity);
        assert!(!order.status.is_final());
    }

    #[test]
    fn test_partial_then_full_fill() {
        let mut order = test_order(2);
        order.fill(Quantity::from_u64(1), 1_708_123_456_790);
        assert_eq!(order.status, OrderStatus::PartialFilled);
        assert_eq!(order.filled_quantity(), Quantity::from_u64(1));

        order.fill(Quantity::from_u64(1), 1_708_123_456_791);
        assert_eq!(order.status, OrderStatus::FullyFilled);
        assert!(order.status.is_final());
        assert!(order.is_fully_filled());
    }

    #[test]
    #[should_panic(expected = "fill exceeds unfilled quantity")]
    fn test_overfill_panics() {
        let mut order = test_order(1);
        order.fill(Quantity::from_u64(2), 1_708_123_456_790);
    }

    #[test]
    fn test_cancel_derives_status() {
        let mut untouched = test_order(2);
        untouched.cancel(1_708_123_456_790);
        assert_eq!(untouched.status, OrderStatus::FullyCancelled);

        let mut partial = test_order(2);
        partial.fill(Quantity::from_u64(1), 1_708_123_456_790);
        partial.cancel(1_708_123_456_791);
        assert_eq!(partial.status, OrderStatus::PartialCancelled);
        assert!(partial.status.is_final());
    }
}
