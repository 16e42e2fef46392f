//! Event types flowing through the sequencer into the trading engine.
//!
//! A `RawEvent` is what upstream producers submit: a payload plus an
//! optional caller-chosen `unique_id` for idempotent retries. The sequencer
//! turns it into a `SequencedEvent` by assigning identity fields exactly
//! once; after that the event is immutable.

use crate::asset::AssetKind;
use crate::ids::{OrderId, UserId};
use crate::numeric::{Price, Quantity};
use crate::order::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request to place a limit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequestEvent {
    pub user_id: UserId,
    pub direction: Direction,
    pub price: Price,
    pub quantity: Quantity,
    /// Immediate-or-cancel flag; the unfilled remainder never rests.
    #[serde(default)]
    pub ioc: bool,
    /// Caller-supplied reference id, echoed on the API result lane.
    pub ref_id: String,
}

/// Request to cancel an active order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelEvent {
    pub user_id: UserId,
    pub ref_order_id: OrderId,
    pub ref_id: String,
}

/// Asset transfer between two users (deposits are debt-account transfers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from_user: UserId,
    pub to_user: UserId,
    pub asset: AssetKind,
    pub amount: Decimal,
    /// When true the sender's available balance is checked. False only for
    /// transfers funded by the debt account.
    pub sufficient: bool,
}

/// Tagged union of every event kind the engine can process.
///
/// Dispatch is an exhaustive match, so adding a variant forces every
/// consumer to handle it. Externally tagged so the same definition works
/// for both the JSON ingestion surface and the bincode journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    OrderRequest(OrderRequestEvent),
    OrderCancel(OrderCancelEvent),
    Transfer(TransferEvent),
}

/// An event as submitted by upstream producers, before sequencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Optional idempotency key; a duplicate is silently dropped.
    pub unique_id: Option<String>,
    pub payload: EventPayload,
}

impl RawEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            unique_id: None,
            payload,
        }
    }

    pub fn with_unique_id(payload: EventPayload, unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: Some(unique_id.into()),
            payload,
        }
    }
}

/// An event with identity assigned by the sequencer.
///
/// `sequence_id` values are dense and start at 1; `previous_id` of event N
/// equals `sequence_id` of event N-1. `created_at` is a server-assigned,
/// monotonically non-decreasing millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub sequence_id: u64,
    pub previous_id: u64,
    pub created_at: i64,
    pub unique_id: Option<String>,
    pub payload: EventPayload,
}
