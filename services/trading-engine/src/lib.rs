//! The trading engine service.
//!
//! Owns all mutable trading state for the single BTC/USD market: the
//! asset ledger, the active order registry and the matching books. Events
//! arrive strictly ordered from the sequencer; processing is synchronous
//! and single-threaded, and everything the outside world sees leaves
//! through the asynchronous output lanes.

pub mod assets;
pub mod audit;
pub mod clearing;
pub mod config;
pub mod orchestrator;
pub mod output;
pub mod store;

pub use assets::{AssetLedger, TransferKind};
pub use config::EngineConfig;
pub use orchestrator::{EngineFault, TradingEngine};
pub use output::{channels, DbWrite, OutputLanes, OutputReceivers};
pub use store::{EventLog, JournalEventLog, Publisher, StoreError, TradeStore};
