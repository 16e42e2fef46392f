//! Identifier types for exchange entities.
//!
//! Orders and users are identified by integers, not random UUIDs: order ids
//! are derived from the sequence id that created the order, so they can be
//! regenerated exactly during replay. User ids are assigned by an upstream
//! account service and are opaque here, with one exception: the reserved
//! system debt account.

use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl UserId {
    /// The reserved system debt account. It funds all external deposits and
    /// is the only account allowed to hold a non-positive available balance.
    pub const DEBT: UserId = UserId(1);

    pub fn is_debt(&self) -> bool {
        *self == Self::DEBT
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order.
///
/// Derived from the sequence id of the event that created the order plus a
/// calendar bucket, so the same event stream always yields the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Derive an order id from the creating event.
    ///
    /// `order_id = sequence_id * 10000 + yyyyMM` of the event timestamp.
    /// Sequence ids are globally unique, so derived order ids are too.
    pub fn derive(sequence_id: u64, created_at_millis: i64) -> Self {
        let bucket = match Utc.timestamp_millis_opt(created_at_millis).single() {
            Some(ts) => (ts.year() as u64) * 100 + u64::from(ts.month()),
            // Out-of-range timestamp cannot happen for server-assigned
            // millis, but a zero bucket still keeps ids unique.
            None => 0,
        };
        Self(sequence_id * 10000 + bucket)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
