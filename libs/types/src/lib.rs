//! Core type definitions shared by the sequencer, matching engine and
//! trading engine.
//!
//! Everything downstream of the sequencer must be deterministic, so these
//! types use `rust_decimal` for all money arithmetic and integer ids derived
//! from sequence numbers rather than random identifiers.

pub mod asset;
pub mod errors;
pub mod event;
pub mod ids;
pub mod message;
pub mod numeric;
pub mod order;
pub mod trade;
