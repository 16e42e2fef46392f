//! Asset kinds and per-user balances.
//!
//! A balance is partitioned into `available` (spendable) and `frozen`
//! (reserved for open orders). Balances are raw decimals because the debt
//! account legitimately holds a negative available balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset kinds traded on the single BTC/USD market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetKind {
    /// Quote asset.
    USD,
    /// Base asset.
    BTC,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::USD, AssetKind::BTC];
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::USD => write!(f, "USD"),
            AssetKind::BTC => write!(f, "BTC"),
        }
    }
}

/// One user's holding of one asset kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub available: Decimal,
    pub frozen: Decimal,
}

impl Asset {
    pub fn new(available: Decimal, frozen: Decimal) -> Self {
        Self { available, frozen }
    }

    pub fn total(&self) -> Decimal {
        self.available + self.frozen
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[available={}, frozen={}]", self.available, self.frozen)
    }
}
