//! Settlement of match results and cancellations.
//!
//! Clearing turns a match result into ledger movements. Buyer funds move
//! out of the USD they froze when the order was accepted, seller funds
//! out of frozen BTC. Because fills execute at the maker's price, a buy
//! taker that bid above the maker's ask gets the difference unfrozen
//! back before the settlement transfers run.

use matching_engine::orders::{OrderRegistry, RegistryError};
use rust_decimal::Decimal;
use thiserror::Error;
use types::asset::AssetKind;
use types::errors::LedgerError;
use types::ids::UserId;
use types::numeric::quote_amount;
use types::order::{Direction, Order};
use types::trade::MatchResult;

use crate::assets::{AssetLedger, TransferKind};

#[derive(Debug, Error)]
pub enum ClearingError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A settlement transfer drew on funds that should have been frozen
    /// by order acceptance. The engine state is corrupt.
    #[error("settlement transfer failed: {amount} {asset} from user {from} to user {to}")]
    TransferFailed {
        from: UserId,
        to: UserId,
        asset: AssetKind,
        amount: Decimal,
    },
}

/// Settle every fill of one match result.
///
/// Fully filled makers are dropped from the registry; the taker never
/// entered it, its disposition is the orchestrator's business.
pub fn settle_match(
    ledger: &mut AssetLedger,
    orders: &mut OrderRegistry,
    result: &MatchResult,
) -> Result<(), ClearingError> {
    let taker = &result.taker_order;
    for detail in &result.match_details {
        let maker = &detail.maker_order;
        let matched = quote_amount(detail.price, detail.quantity);

        let (buyer, seller) = match taker.direction {
            Direction::BUY => {
                // Price improvement: the buyer froze at their own limit
                // price, the fill ran at the cheaper maker price.
                if taker.price > detail.price {
                    let refund = (taker.price.as_decimal() - detail.price.as_decimal())
                        * detail.quantity.as_decimal();
                    ledger.unfreeze(taker.user_id, AssetKind::USD, refund)?;
                }
                (taker, maker)
            }
            Direction::SELL => (maker, taker),
        };

        settlement_transfer(ledger, buyer.user_id, seller.user_id, AssetKind::USD, matched)?;
        settlement_transfer(
            ledger,
            seller.user_id,
            buyer.user_id,
            AssetKind::BTC,
            detail.quantity.as_decimal(),
        )?;

        if maker.is_fully_filled() {
            orders.remove(maker.order_id)?;
        }
    }
    Ok(())
}

/// Release the frozen remainder of a cancelled order.
///
/// Applies both to explicit cancels and to the unfilled remainder of an
/// immediate-or-cancel order.
pub fn settle_cancel(ledger: &mut AssetLedger, order: &Order) -> Result<(), ClearingError> {
    match order.direction {
        Direction::BUY => ledger.unfreeze(
            order.user_id,
            AssetKind::USD,
            quote_amount(order.price, order.unfilled_quantity),
        )?,
        Direction::SELL => ledger.unfreeze(
            order.user_id,
            AssetKind::BTC,
            order.unfilled_quantity.as_decimal(),
        )?,
    }
    Ok(())
}

/// Frozen-to-available transfer that must succeed.
fn settlement_transfer(
    ledger: &mut AssetLedger,
    from: UserId,
    to: UserId,
    asset: AssetKind,
    amount: Decimal,
) -> Result<(), ClearingError> {
    let ok = ledger.try_transfer(TransferKind::FrozenToAvailable, from, to, asset, amount, true)?;
    if !ok {
        return Err(ClearingError::TransferFailed {
            from,
            to,
            asset,
            amount,
        });
    }
    Ok(())
}
