//! The asset ledger.
//!
//! Tracks every user's available and frozen balance per asset. The system
//! is closed: assets enter and leave only through transfers against the
//! debt account, so the sum of each asset over all users (debt account
//! included) is always exactly zero.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;
use types::asset::{Asset, AssetKind};
use types::errors::LedgerError;
use types::ids::UserId;

/// Which balance buckets a transfer moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    AvailableToAvailable,
    AvailableToFrozen,
    FrozenToAvailable,
}

/// All balances, keyed by user then asset. BTreeMaps keep iteration
/// deterministic for audits and snapshots.
#[derive(Debug, Clone, Default)]
pub struct AssetLedger {
    accounts: BTreeMap<UserId, BTreeMap<AssetKind, Asset>>,
}

impl AssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A user's balance of one asset; zero if never touched.
    pub fn asset(&self, user: UserId, kind: AssetKind) -> Asset {
        self.accounts
            .get(&user)
            .and_then(|assets| assets.get(&kind))
            .cloned()
            .unwrap_or_default()
    }

    pub fn accounts(&self) -> &BTreeMap<UserId, BTreeMap<AssetKind, Asset>> {
        &self.accounts
    }

    fn asset_mut(&mut self, user: UserId, kind: AssetKind) -> &mut Asset {
        self.accounts.entry(user).or_default().entry(kind).or_default()
    }

    /// Move `amount` between two balances.
    ///
    /// Returns `Ok(false)` when `check_balance` is set and the source
    /// bucket is short; that is an ordinary rejection, not a fault.
    /// `check_balance` is false only for transfers funded by the debt
    /// account, which is allowed to go negative.
    pub fn try_transfer(
        &mut self,
        kind: TransferKind,
        from: UserId,
        to: UserId,
        asset: AssetKind,
        amount: Decimal,
        check_balance: bool,
    ) -> Result<bool, LedgerError> {
        if amount.is_sign_negative() {
            return Err(LedgerError::NegativeAmount(amount));
        }
        if amount.is_zero() {
            return Ok(true);
        }

        match kind {
            TransferKind::AvailableToAvailable => {
                if check_balance && self.asset(from, asset).available < amount {
                    return Ok(false);
                }
                self.asset_mut(from, asset).available -= amount;
                self.asset_mut(to, asset).available += amount;
            }
            TransferKind::AvailableToFrozen => {
                if check_balance && self.asset(from, asset).available < amount {
                    return Ok(false);
                }
                self.asset_mut(from, asset).available -= amount;
                self.asset_mut(to, asset).frozen += amount;
            }
            TransferKind::FrozenToAvailable => {
                if check_balance && self.asset(from, asset).frozen < amount {
                    return Ok(false);
                }
                self.asset_mut(from, asset).frozen -= amount;
                self.asset_mut(to, asset).available += amount;
            }
        }
        debug!(?kind, %from, %to, %asset, %amount, "transfer");
        Ok(true)
    }

    /// Reserve `amount` of a user's available balance for an open order.
    pub fn try_freeze(
        &mut self,
        user: UserId,
        asset: AssetKind,
        amount: Decimal,
    ) -> Result<bool, LedgerError> {
        self.try_transfer(TransferKind::AvailableToFrozen, user, user, asset, amount, true)
    }

    /// Release previously frozen balance back to available.
    ///
    /// Unfreezing more than is frozen means the freeze accounting is
    /// broken, so it is an error rather than a rejection.
    pub fn unfreeze(
        &mut self,
        user: UserId,
        asset: AssetKind,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let ok =
            self.try_transfer(TransferKind::FrozenToAvailable, user, user, asset, amount, true)?;
        if !ok {
            return Err(LedgerError::UnfreezeExceedsFrozen {
                user,
                asset,
                amount,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn deposit(ledger: &mut AssetLedger, user: u64, asset: AssetKind, amount: i64) {
        ledger
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId::DEBT,
                UserId(user),
                asset,
                dec(amount),
                false,
            )
            .unwrap();
    }

    #[test]
    fn test_deposit_is_zero_sum() {
        let mut ledger = AssetLedger::new();
        deposit(&mut ledger, 100, AssetKind::USD, 1000);

        assert_eq!(ledger.asset(UserId(100), AssetKind::USD).available, dec(1000));
        assert_eq!(ledger.asset(UserId::DEBT, AssetKind::USD).available, dec(-1000));
    }

    #[test]
    fn test_insufficient_balance_is_rejected_not_error() {
        let mut ledger = AssetLedger::new();
        deposit(&mut ledger, 100, AssetKind::USD, 50);

        let ok = ledger
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId(100),
                UserId(200),
                AssetKind::USD,
                dec(100),
                true,
            )
            .unwrap();
        assert!(!ok);
        // Nothing moved.
        assert_eq!(ledger.asset(UserId(100), AssetKind::USD).available, dec(50));
        assert_eq!(ledger.asset(UserId(200), AssetKind::USD).available, dec(0));
    }

    #[test]
    fn test_negative_amount_is_error() {
        let mut ledger = AssetLedger::new();
        let err = ledger
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId(100),
                UserId(200),
                AssetKind::USD,
                dec(-1),
                true,
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::NegativeAmount(dec(-1)));
    }

    #[test]
    fn test_freeze_and_unfreeze() {
        let mut ledger = AssetLedger::new();
        deposit(&mut ledger, 100, AssetKind::USD, 1000);

        assert!(ledger.try_freeze(UserId(100), AssetKind::USD, dec(400)).unwrap());
        let asset = ledger.asset(UserId(100), AssetKind::USD);
        assert_eq!(asset.available, dec(600));
        assert_eq!(asset.frozen, dec(400));

        ledger.unfreeze(UserId(100), AssetKind::USD, dec(400)).unwrap();
        let asset = ledger.asset(UserId(100), AssetKind::USD);
        assert_eq!(asset.available, dec(1000));
        assert_eq!(asset.frozen, dec(0));
    }

    #[test]
    fn test_freeze_more_than_available_rejected() {
        let mut ledger = AssetLedger::new();
        deposit(&mut ledger, 100, AssetKind::USD, 100);
        assert!(!ledger.try_freeze(UserId(100), AssetKind::USD, dec(101)).unwrap());
    }

    #[test]
    fn test_unfreeze_more_than_frozen_is_error() {
        let mut ledger = AssetLedger::new();
        deposit(&mut ledger, 100, AssetKind::USD, 100);
        ledger.try_freeze(UserId(100), AssetKind::USD, dec(50)).unwrap();

        let err = ledger.unfreeze(UserId(100), AssetKind::USD, dec(51)).unwrap_err();
        assert!(matches!(err, LedgerError::UnfreezeExceedsFrozen { .. }));
    }

    #[test]
    fn test_frozen_to_available_between_users() {
        let mut ledger = AssetLedger::new();
        deposit(&mut ledger, 100, AssetKind::USD, 1000);
        ledger.try_freeze(UserId(100), AssetKind::USD, dec(1000)).unwrap();

        let ok = ledger
            .try_transfer(
                TransferKind::FrozenToAvailable,
                UserId(100),
                UserId(200),
                AssetKind::USD,
                dec(1000),
                true,
            )
            .unwrap();
        assert!(ok);
        assert_eq!(ledger.asset(UserId(100), AssetKind::USD).total(), dec(0));
        assert_eq!(ledger.asset(UserId(200), AssetKind::USD).available, dec(1000));
    }

    #[test]
    fn test_zero_amount_is_noop() {
        let mut ledger = AssetLedger::new();
        assert!(ledger
            .try_transfer(
                TransferKind::AvailableToAvailable,
                UserId(100),
                UserId(200),
                AssetKind::BTC,
                dec(0),
                true,
            )
            .unwrap());
        assert!(ledger.accounts().is_empty());
    }
}
