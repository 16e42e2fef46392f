//! Price-time priority matching for the single BTC/USD market.
//!
//! The engine is purely deterministic: it has no clock, no I/O, and no
//! randomness. Given the same sequence of orders it produces the same
//! fills, the same book, and the same market price.

pub mod book;
pub mod engine;
pub mod orders;

pub use book::{AskBook, BidBook, BookLevel, OrderBookSnapshot};
pub use engine::MatchEngine;
pub use orders::{OrderRegistry, RegistryError};
