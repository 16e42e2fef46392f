//! Asynchronous output lanes.
//!
//! Event processing is synchronous; everything it produces leaves through
//! these channels so slow consumers can never stall the engine. The
//! persistence, tick, api-result and notification lanes are unbounded
//! queues; the order book lane is a latest-only cell, because a stale
//! depth snapshot has no value once a newer one exists.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use matching_engine::book::OrderBookSnapshot;
use serde::{Deserialize, Serialize};
use types::ids::OrderId;
use types::message::{ApiResultMessage, NotificationMessage};
use types::order::Order;
use types::trade::{MatchDetailRow, MatchType, TickMessage};

use crate::store::{Publisher, TradeStore};

/// Rows per persistence batch.
pub const DB_BATCH_LIMIT: usize = 1000;

/// One row for the persistence lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DbWrite {
    Order(Order),
    MatchDetail(MatchDetailRow),
}

impl DbWrite {
    /// Stable ordering so a replayed run persists identical batches.
    pub fn sort_key(&self) -> (u64, u8, OrderId, u8) {
        match self {
            DbWrite::Order(order) => (order.sequence_id, 0, order.order_id, 0),
            DbWrite::MatchDetail(row) => {
                let match_type = match row.match_type {
                    MatchType::TAKER => 0,
                    MatchType::MAKER => 1,
                };
                (row.sequence_id, 1, row.order_id, match_type)
            }
        }
    }
}

/// Sending halves, held by the orchestrator.
pub struct OutputLanes {
    pub db: mpsc::UnboundedSender<DbWrite>,
    pub ticks: mpsc::UnboundedSender<TickMessage>,
    pub api_results: mpsc::UnboundedSender<ApiResultMessage>,
    pub notifications: mpsc::UnboundedSender<NotificationMessage>,
    pub book: watch::Sender<Option<OrderBookSnapshot>>,
}

/// Receiving halves, consumed by the output workers.
pub struct OutputReceivers {
    pub db: mpsc::UnboundedReceiver<DbWrite>,
    pub ticks: mpsc::UnboundedReceiver<TickMessage>,
    pub api_results: mpsc::UnboundedReceiver<ApiResultMessage>,
    pub notifications: mpsc::UnboundedReceiver<NotificationMessage>,
    pub book: watch::Receiver<Option<OrderBookSnapshot>>,
}

/// Create all output lanes.
pub fn channels() -> (OutputLanes, OutputReceivers) {
    let (db_tx, db_rx) = mpsc::unbounded_channel();
    let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();
    let (api_tx, api_rx) = mpsc::unbounded_channel();
    let (notif_tx, notif_rx) = mpsc::unbounded_channel();
    let (book_tx, book_rx) = watch::channel(None);
    (
        OutputLanes {
            db: db_tx,
            ticks: ticks_tx,
            api_results: api_tx,
            notifications: notif_tx,
            book: book_tx,
        },
        OutputReceivers {
            db: db_rx,
            ticks: ticks_rx,
            api_results: api_rx,
            notifications: notif_rx,
            book: book_rx,
        },
    )
}

/// Spawn one worker task per lane.
pub fn spawn_workers(
    receivers: OutputReceivers,
    store: Arc<dyn TradeStore>,
    publisher: Arc<dyn Publisher>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(db_worker(receivers.db, store)),
        tokio::spawn(tick_worker(receivers.ticks, publisher.clone())),
        tokio::spawn(api_result_worker(receivers.api_results, publisher.clone())),
        tokio::spawn(notification_worker(receivers.notifications, publisher.clone())),
        tokio::spawn(book_worker(receivers.book, publisher)),
    ]
}

/// Drain the persistence lane in sorted batches.
///
/// Storage errors are retried forever; losing trade history is worse
/// than lagging on it, and the unbounded queue absorbs the backlog.
async fn db_worker(mut rx: mpsc::UnboundedReceiver<DbWrite>, store: Arc<dyn TradeStore>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while batch.len() < DB_BATCH_LIMIT {
            match rx.try_recv() {
                Ok(row) => batch.push(row),
                Err(_) => break,
            }
        }
        batch.sort_by_key(DbWrite::sort_key);

        loop {
            match store.save_batch(&batch) {
                Ok(()) => break,
                Err(e) => {
                    warn!(rows = batch.len(), "persistence batch failed, retrying: {}", e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }
}

async fn tick_worker(mut rx: mpsc::UnboundedReceiver<TickMessage>, publisher: Arc<dyn Publisher>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = publisher.publish_ticks(&message) {
            warn!(sequence_id = message.sequence_id, "dropping tick message: {}", e);
        }
    }
}

async fn api_result_worker(
    mut rx: mpsc::UnboundedReceiver<ApiResultMessage>,
    publisher: Arc<dyn Publisher>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = publisher.publish_api_result(&message) {
            warn!(ref_id = %message.ref_id, "dropping api result: {}", e);
        }
    }
}

async fn notification_worker(
    mut rx: mpsc::UnboundedReceiver<NotificationMessage>,
    publisher: Arc<dyn Publisher>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = publisher.publish_notification(&message) {
            warn!(user_id = %message.user_id, "dropping notification: {}", e);
        }
    }
}

/// Publish book snapshots, newest wins.
///
/// The watch cell may be overwritten many times between wakeups; the
/// sequence id guard keeps publication monotonic.
async fn book_worker(
    mut rx: watch::Receiver<Option<OrderBookSnapshot>>,
    publisher: Arc<dyn Publisher>,
) {
    let mut last_published = 0u64;
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if let Some(snapshot) = snapshot {
            if snapshot.sequence_id > last_published {
                last_published = snapshot.sequence_id;
                if let Err(e) = publisher.publish_book(&snapshot) {
                    warn!(sequence_id = snapshot.sequence_id, "dropping book snapshot: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTradeStore;
    use types::ids::UserId;
    use types::numeric::{Price, Quantity};
    use types::order::Direction;

    fn order_row(seq: u64) -> DbWrite {
        DbWrite::Order(Order::new(
            OrderId::derive(seq, 1_708_123_456_789),
            seq,
            UserId(1),
            Direction::BUY,
            Price::from_u64(10),
            Quantity::from_u64(1),
            false,
            1_708_123_456_789,
        ))
    }

    #[test]
    fn test_sort_key_orders_by_sequence_then_kind() {
        let mut rows = vec![order_row(3), order_row(1), order_row(2)];
        rows.sort_by_key(DbWrite::sort_key);
        let seqs: Vec<_> = rows
            .iter()
            .map(|r| match r {
                DbWrite::Order(o) => o.sequence_id,
                DbWrite::MatchDetail(d) => d.sequence_id,
            })
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_db_worker_persists_sorted_batch() {
        let (lanes, receivers) = channels();
        let store = Arc::new(MemoryTradeStore::new());
        let worker = tokio::spawn(db_worker(receivers.db, store.clone()));

        lanes.db.send(order_row(2)).unwrap();
        lanes.db.send(order_row(1)).unwrap();
        drop(lanes);
        worker.await.unwrap();

        let rows = store.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].sort_key() < rows[1].sort_key());
    }

    #[tokio::test]
    async fn test_book_lane_keeps_latest_only() {
        let (lanes, mut receivers) = channels();
        for seq in 1..=5 {
            lanes.book.send_replace(Some(OrderBookSnapshot {
                sequence_id: seq,
                market_price: Price::zero(),
                bids: Vec::new(),
                asks: Vec::new(),
            }));
        }

        assert!(receivers.book.changed().await.is_ok());
        let seen = receivers.book.borrow_and_update().clone().unwrap();
        assert_eq!(seen.sequence_id, 5);
    }
}
