//! Order book infrastructure module
//!
//! Contains the bid and ask side books plus the published snapshot types.
//! The side books are indexes only: they map a priority key to an order
//! id, while the orders themselves live in the order registry.

pub mod ask_book;
pub mod bid_book;

pub use ask_book::AskBook;
pub use bid_book::BidBook;

use serde::{Deserialize, Serialize};
use types::numeric::{Price, Quantity};

/// One aggregated price level of a book snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Quantity,
}

/// Depth snapshot published on the order book lane.
///
/// `bids` are sorted best (highest) price first, `asks` best (lowest)
/// price first. Orders at the same price are merged into one level, and a
/// level is never split: the depth cap applies to whole levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Sequence id of the event this snapshot reflects.
    pub sequence_id: u64,
    pub market_price: Price,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}
