//! Match results and their derived persistence/publication records.

use crate::ids::{OrderId, UserId};
use crate::numeric::{Price, Quantity};
use crate::order::{Direction, Order};
use serde::{Deserialize, Serialize};

/// Role an order played in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchType {
    /// The incoming order being processed.
    TAKER,
    /// The resting order it matched against.
    MAKER,
}

/// One fill: matched at the maker's price, in the order fills occurred.
///
/// Holds post-fill copies of both orders, so downstream consumers see the
/// state each order had immediately after this fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetail {
    pub price: Price,
    pub quantity: Quantity,
    pub taker_order: Order,
    pub maker_order: Order,
}

/// Result of processing one taker order against the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The taker in its post-match state.
    pub taker_order: Order,
    pub match_details: Vec<MatchDetail>,
}

impl MatchResult {
    pub fn no_match(taker_order: Order) -> Self {
        Self {
            taker_order,
            match_details: Vec::new(),
        }
    }
}

/// One persisted row per order per fill (a fill produces a TAKER row and a
/// MAKER row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetailRow {
    pub sequence_id: u64,
    pub order_id: OrderId,
    pub counter_order_id: OrderId,
    pub user_id: UserId,
    pub counter_user_id: UserId,
    pub direction: Direction,
    pub match_type: MatchType,
    pub price: Price,
    pub quantity: Quantity,
    pub created_at: i64,
}

impl MatchDetailRow {
    /// Build the TAKER or MAKER row for one match detail.
    pub fn from_detail(
        sequence_id: u64,
        timestamp: i64,
        detail: &MatchDetail,
        match_type: MatchType,
    ) -> Self {
        let (order, counter) = match match_type {
            MatchType::TAKER => (&detail.taker_order, &detail.maker_order),
            MatchType::MAKER => (&detail.maker_order, &detail.taker_order),
        };
        Self {
            sequence_id,
            order_id: order.order_id,
            counter_order_id: counter.order_id,
            user_id: order.user_id,
            counter_user_id: counter.user_id,
            direction: order.direction,
            match_type,
            price: detail.price,
            quantity: detail.quantity,
            created_at: timestamp,
        }
    }

    /// Stable sort key for deterministic batch persistence.
    pub fn sort_key(&self) -> (u64, OrderId, MatchType) {
        (self.sequence_id, self.order_id, self.match_type)
    }
}

/// One trade tick, published on the tick stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub sequence_id: u64,
    pub taker_order_id: OrderId,
    pub maker_order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    /// True when the taker was the buyer.
    pub taker_buy: bool,
    pub created_at: i64,
}

/// Batch of ticks produced by a single processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickMessage {
    pub sequence_id: u64,
    pub created_at: i64,
    pub ticks: Vec<Tick>,
}
