//! Shared error types.

use crate::asset::AssetKind;
use crate::ids::UserId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the asset ledger.
///
/// Note that an ordinary insufficient-balance outcome is not an error; the
/// ledger reports it as `Ok(false)` so callers can reject the request on
/// the result lane. `LedgerError` covers caller bugs only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Transfer amounts must be non-negative.
    #[error("transfer amount must not be negative: {0}")]
    NegativeAmount(Decimal),

    /// An unfreeze exceeded the frozen balance it was releasing.
    #[error("unfreeze of {amount} {asset} exceeds frozen balance of user {user}")]
    UnfreezeExceedsFrozen {
        user: UserId,
        asset: AssetKind,
        amount: Decimal,
    },
}
