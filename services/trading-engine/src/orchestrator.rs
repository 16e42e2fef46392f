//! The orchestrator: strict in-order event processing.
//!
//! One instance owns every piece of mutable trading state and applies
//! sequenced events one at a time. Ordering is enforced here: duplicates
//! are skipped, gaps are closed by re-reading the event log, and anything
//! else halts the engine, because a single misapplied event silently
//! corrupts every balance after it.

use thiserror::Error;
use tracing::{error, warn};

use matching_engine::{MatchEngine, OrderRegistry};
use types::asset::AssetKind;
use types::errors::LedgerError;
use types::event::{EventPayload, OrderCancelEvent, OrderRequestEvent, SequencedEvent, TransferEvent};
use types::ids::OrderId;
use types::message::{ApiError, ApiResultMessage, NotificationKind, NotificationMessage};
use types::numeric::quote_amount;
use types::order::{Direction, Order};
use types::trade::{MatchDetailRow, MatchType, Tick, TickMessage};

use crate::assets::{AssetLedger, TransferKind};
use crate::audit::{self, AuditError};
use crate::clearing::{self, ClearingError};
use crate::config::EngineConfig;
use crate::output::{DbWrite, OutputLanes};
use crate::store::{EventLog, StoreError};

/// A fault that stops the engine.
///
/// Every variant except `Halted` also marks the engine halted; processing
/// anything after a fault would diverge from the journal.
#[derive(Debug, Error)]
pub enum EngineFault {
    #[error("engine is halted")]
    Halted,

    #[error("event {sequence} out of order: previous={previous}, last processed={last}")]
    OutOfOrder {
        sequence: u64,
        previous: u64,
        last: u64,
    },

    #[error("sequence gap after {last} but the event log has nothing beyond it")]
    UnrecoverableGap { last: u64 },

    #[error(transparent)]
    Clearing(#[from] ClearingError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// The trading engine orchestrator.
pub struct TradingEngine {
    config: EngineConfig,
    pub assets: AssetLedger,
    pub orders: OrderRegistry,
    pub engine: MatchEngine,
    event_log: Box<dyn EventLog>,
    lanes: OutputLanes,
    last_sequence_id: u64,
    halted: bool,
}

impl TradingEngine {
    pub fn new(config: EngineConfig, event_log: Box<dyn EventLog>, lanes: OutputLanes) -> Self {
        Self {
            config,
            assets: AssetLedger::new(),
            orders: OrderRegistry::new(),
            engine: MatchEngine::new(),
            event_log,
            lanes,
            last_sequence_id: 0,
            halted: false,
        }
    }

    pub fn last_sequence_id(&self) -> u64 {
        self.last_sequence_id
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Process a batch of sequenced events, stopping at the first fault.
    pub fn process_batch(&mut self, events: Vec<SequencedEvent>) -> Result<(), EngineFault> {
        for event in events {
            self.process_event(event)?;
        }
        Ok(())
    }

    /// Process one sequenced event.
    ///
    /// A returned error is fatal: the engine is halted and the caller is
    /// expected to terminate the process.
    pub fn process_event(&mut self, event: SequencedEvent) -> Result<(), EngineFault> {
        if self.halted {
            return Err(EngineFault::Halted);
        }
        let result = self.process_ordered(event);
        if let Err(fault) = &result {
            error!("halting engine: {}", fault);
            self.halted = true;
        }
        result
    }

    fn process_ordered(&mut self, event: SequencedEvent) -> Result<(), EngineFault> {
        // Redelivery of something already applied is harmless.
        if event.sequence_id <= self.last_sequence_id {
            warn!(
                sequence_id = event.sequence_id,
                last = self.last_sequence_id,
                "skipping duplicate event"
            );
            return Ok(());
        }

        // A gap means we missed events that are nonetheless durable, so
        // recover them from the log; the current event is re-read too.
        if event.previous_id > self.last_sequence_id {
            warn!(
                sequence_id = event.sequence_id,
                previous_id = event.previous_id,
                last = self.last_sequence_id,
                "sequence gap, reloading from event log"
            );
            let missing = self.event_log.load_after(self.last_sequence_id)?;
            if missing.is_empty() {
                return Err(EngineFault::UnrecoverableGap {
                    last: self.last_sequence_id,
                });
            }
            for event in missing {
                if event.sequence_id <= self.last_sequence_id {
                    continue;
                }
                if event.previous_id != self.last_sequence_id {
                    return Err(EngineFault::OutOfOrder {
                        sequence: event.sequence_id,
                        previous: event.previous_id,
                        last: self.last_sequence_id,
                    });
                }
                self.apply(event)?;
            }
            return Ok(());
        }

        if event.previous_id != self.last_sequence_id {
            return Err(EngineFault::OutOfOrder {
                sequence: event.sequence_id,
                previous: event.previous_id,
                last: self.last_sequence_id,
            });
        }
        self.apply(event)
    }

    fn apply(&mut self, event: SequencedEvent) -> Result<(), EngineFault> {
        let book_changed = match event.payload.clone() {
            EventPayload::OrderRequest(request) => self.on_order_request(&event, request)?,
            EventPayload::OrderCancel(request) => self.on_order_cancel(&event, request)?,
            EventPayload::Transfer(request) => {
                self.on_transfer(&request)?;
                false
            }
        };
        self.last_sequence_id = event.sequence_id;

        if self.config.debug_mode {
            audit::validate(&self.assets, &self.orders, &self.engine)?;
        }

        if book_changed {
            let snapshot = self.engine.snapshot(
                event.sequence_id,
                self.config.order_book_depth,
                &self.orders,
            );
            self.lanes.book.send_replace(Some(snapshot));
        }
        Ok(())
    }

    fn on_order_request(
        &mut self,
        event: &SequencedEvent,
        request: OrderRequestEvent,
    ) -> Result<bool, EngineFault> {
        // A zero-quantity order is born fully filled and would enter the
        // registry without ever resting in a book; a zero price freezes
        // nothing on the buy side. Neither may reach the engine.
        if request.quantity.is_zero() || request.price.is_zero() {
            self.send_api(ApiResultMessage::failure(
                request.ref_id,
                ApiError::InvalidParameter,
                event.created_at,
            ));
            return Ok(false);
        }

        let (asset, required) = match request.direction {
            Direction::BUY => (
                AssetKind::USD,
                quote_amount(request.price, request.quantity),
            ),
            Direction::SELL => (AssetKind::BTC, request.quantity.as_decimal()),
        };
        if !self.assets.try_freeze(request.user_id, asset, required)? {
            self.send_api(ApiResultMessage::failure(
                request.ref_id,
                ApiError::InsufficientBalance,
                event.created_at,
            ));
            return Ok(false);
        }

        let mut taker = Order::new(
            OrderId::derive(event.sequence_id, event.created_at),
            event.sequence_id,
            request.user_id,
            request.direction,
            request.price,
            request.quantity,
            request.ioc,
            event.created_at,
        );
        let result = self
            .engine
            .process_order(event.sequence_id, &mut taker, &mut self.orders);
        clearing::settle_match(&mut self.assets, &mut self.orders, &result)?;

        if !taker.status.is_final() {
            if taker.ioc {
                // The remainder never rests; release what it still holds.
                clearing::settle_cancel(&mut self.assets, &taker)?;
                taker.cancel(event.created_at);
            } else {
                self.orders.insert(taker.clone());
            }
        }

        let mut ticks = Vec::with_capacity(result.match_details.len());
        for detail in &result.match_details {
            self.send_db(DbWrite::MatchDetail(MatchDetailRow::from_detail(
                event.sequence_id,
                event.created_at,
                detail,
                MatchType::TAKER,
            )));
            self.send_db(DbWrite::MatchDetail(MatchDetailRow::from_detail(
                event.sequence_id,
                event.created_at,
                detail,
                MatchType::MAKER,
            )));
            // Only closed orders are persisted; open ones are recoverable
            // from the journal.
            if detail.maker_order.status.is_final() {
                self.send_db(DbWrite::Order(detail.maker_order.clone()));
            }
            self.send_notification(NotificationMessage {
                created_at: event.created_at,
                kind: NotificationKind::OrderMatched,
                user_id: detail.maker_order.user_id,
                order: detail.maker_order.clone(),
            });
            ticks.push(Tick {
                sequence_id: event.sequence_id,
                taker_order_id: taker.order_id,
                maker_order_id: detail.maker_order.order_id,
                price: detail.price,
                quantity: detail.quantity,
                taker_buy: taker.direction == Direction::BUY,
                created_at: event.created_at,
            });
        }
        if !ticks.is_empty() {
            self.send_notification(NotificationMessage {
                created_at: event.created_at,
                kind: NotificationKind::OrderMatched,
                user_id: taker.user_id,
                order: taker.clone(),
            });
            if self.lanes.ticks.send(TickMessage {
                sequence_id: event.sequence_id,
                created_at: event.created_at,
                ticks,
            }).is_err() {
                warn!("tick lane closed");
            }
        }
        if taker.status.is_final() {
            self.send_db(DbWrite::Order(taker.clone()));
        }
        self.send_api(ApiResultMessage::order_success(
            request.ref_id,
            taker,
            event.created_at,
        ));
        Ok(true)
    }

    fn on_order_cancel(
        &mut self,
        event: &SequencedEvent,
        request: OrderCancelEvent,
    ) -> Result<bool, EngineFault> {
        let Some(order) = self.orders.get(request.ref_order_id) else {
            self.send_api(ApiResultMessage::failure(
                request.ref_id,
                ApiError::OrderNotFound,
                event.created_at,
            ));
            return Ok(false);
        };
        if order.user_id != request.user_id {
            self.send_api(ApiResultMessage::failure(
                request.ref_id,
                ApiError::NotOwner,
                event.created_at,
            ));
            return Ok(false);
        }

        // Ledger first: the order leaves the registry only once its frozen
        // funds are released.
        clearing::settle_cancel(&mut self.assets, order)?;
        let mut order = self
            .orders
            .remove(request.ref_order_id)
            .map_err(ClearingError::from)?;
        self.engine.cancel(event.created_at, &mut order);

        self.send_db(DbWrite::Order(order.clone()));
        self.send_notification(NotificationMessage {
            created_at: event.created_at,
            kind: NotificationKind::OrderCanceled,
            user_id: order.user_id,
            order: order.clone(),
        });
        self.send_api(ApiResultMessage::order_success(
            request.ref_id,
            order,
            event.created_at,
        ));
        Ok(true)
    }

    fn on_transfer(&mut self, request: &TransferEvent) -> Result<(), EngineFault> {
        let ok = self.assets.try_transfer(
            TransferKind::AvailableToAvailable,
            request.from_user,
            request.to_user,
            request.asset,
            request.amount,
            request.sufficient,
        )?;
        if !ok {
            warn!(
                from = %request.from_user,
                to = %request.to_user,
                asset = %request.asset,
                amount = %request.amount,
                "transfer rejected, insufficient balance"
            );
        }
        Ok(())
    }

    fn send_db(&self, row: DbWrite) {
        if self.lanes.db.send(row).is_err() {
            warn!("persistence lane closed");
        }
    }

    fn send_api(&self, message: ApiResultMessage) {
        if self.lanes.api_results.send(message).is_err() {
            warn!("api result lane closed");
        }
    }

    fn send_notification(&self, message: NotificationMessage) {
        if self.lanes.notifications.send(message).is_err() {
            warn!("notification lane closed");
        }
    }
}
