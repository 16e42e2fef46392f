//! Internal consistency audit.
//!
//! Run after every event in debug mode. Any violation means the engine
//! state is corrupt and the process must stop before persisting or
//! publishing anything further.

use matching_engine::{MatchEngine, OrderRegistry};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;
use types::asset::AssetKind;
use types::ids::UserId;
use types::numeric::quote_amount;
use types::order::Direction;

use crate::assets::AssetLedger;

#[derive(Debug, Error, PartialEq)]
pub enum AuditError {
    #[error("asset {asset} does not sum to zero: {sum}")]
    Imbalance { asset: AssetKind, sum: Decimal },

    #[error("user {user} has negative {asset}: available={available}, frozen={frozen}")]
    NegativeBalance {
        user: UserId,
        asset: AssetKind,
        available: Decimal,
        frozen: Decimal,
    },

    #[error("debt account must owe, not own: {asset} available={available}, frozen={frozen}")]
    DebtAccount {
        asset: AssetKind,
        available: Decimal,
        frozen: Decimal,
    },

    #[error("user {user} frozen {asset} is {actual}, open orders require {expected}")]
    FrozenMismatch {
        user: UserId,
        asset: AssetKind,
        expected: Decimal,
        actual: Decimal,
    },

    #[error("book and registry disagree: {0}")]
    BookMismatch(String),
}

/// Check every engine invariant.
pub fn validate(
    ledger: &AssetLedger,
    orders: &OrderRegistry,
    engine: &MatchEngine,
) -> Result<(), AuditError> {
    validate_balances(ledger)?;
    validate_frozen(ledger, orders)?;
    validate_books(orders, engine)
}

/// Zero-sum per asset, non-negative user balances, debt account shape.
fn validate_balances(ledger: &AssetLedger) -> Result<(), AuditError> {
    let mut sums: BTreeMap<AssetKind, Decimal> = BTreeMap::new();

    for (user, assets) in ledger.accounts() {
        for (kind, asset) in assets {
            *sums.entry(*kind).or_default() += asset.total();

            if user.is_debt() {
                if asset.available > Decimal::ZERO || !asset.frozen.is_zero() {
                    return Err(AuditError::DebtAccount {
                        asset: *kind,
                        available: asset.available,
                        frozen: asset.frozen,
                    });
                }
            } else if asset.available.is_sign_negative() || asset.frozen.is_sign_negative() {
                return Err(AuditError::NegativeBalance {
                    user: *user,
                    asset: *kind,
                    available: asset.available,
                    frozen: asset.frozen,
                });
            }
        }
    }

    for (asset, sum) in sums {
        if !sum.is_zero() {
            return Err(AuditError::Imbalance { asset, sum });
        }
    }
    Ok(())
}

/// Every frozen balance is exactly accounted for by active orders.
fn validate_frozen(ledger: &AssetLedger, orders: &OrderRegistry) -> Result<(), AuditError> {
    let mut expected: BTreeMap<(UserId, AssetKind), Decimal> = BTreeMap::new();
    for order in orders.iter() {
        let (asset, amount) = match order.direction {
            Direction::BUY => (
                AssetKind::USD,
                quote_amount(order.price, order.unfilled_quantity),
            ),
            Direction::SELL => (AssetKind::BTC, order.unfilled_quantity.as_decimal()),
        };
        *expected.entry((order.user_id, asset)).or_default() += amount;
    }

    // Both directions: no unexplained frozen funds, no underfunded order.
    for (user, assets) in ledger.accounts() {
        for (kind, asset) in assets {
            let required = expected.remove(&(*user, *kind)).unwrap_or_default();
            if asset.frozen != required {
                return Err(AuditError::FrozenMismatch {
                    user: *user,
                    asset: *kind,
                    expected: required,
                    actual: asset.frozen,
                });
            }
        }
    }
    if let Some(((user, asset), required)) = expected.into_iter().next() {
        return Err(AuditError::FrozenMismatch {
            user,
            asset,
            expected: required,
            actual: Decimal::ZERO,
        });
    }
    Ok(())
}

/// Books and registry reference exactly the same orders.
fn validate_books(orders: &OrderRegistry, engine: &MatchEngine) -> Result<(), AuditError> {
    let book_total = engine.buy_book.len() + engine.sell_book.len();
    if book_total != orders.len() {
        return Err(AuditError::BookMismatch(format!(
            "{} book entries vs {} registered orders",
            book_total,
            orders.len()
        )));
    }

    for (id, expected) in engine
        .buy_book
        .iter()
        .map(|id| (id, Direction::BUY))
        .chain(engine.sell_book.iter().map(|id| (id, Direction::SELL)))
    {
        match orders.get(id) {
            None => {
                return Err(AuditError::BookMismatch(format!(
                    "book references unknown order {}",
                    id
                )))
            }
            Some(order) if order.direction != expected => {
                return Err(AuditError::BookMismatch(format!(
                    "order {} rests on the wrong side",
                    id
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}
