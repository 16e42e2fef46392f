//! Matching engine core
//!
//! Processes one taker order at a time against the resting book. Fills
//! always execute at the maker's price, walking the opposing side in
//! price-time priority until prices no longer cross or the taker is done.

use types::ids::OrderId;
use types::numeric::Price;
use types::order::{Direction, Order};
use types::trade::{MatchDetail, MatchResult};

use crate::book::{AskBook, BidBook, BookLevel, OrderBookSnapshot};
use crate::orders::OrderRegistry;

/// Matching engine for the single market.
///
/// Holds the two side books and the last traded price. Orders referenced
/// by the books live in the order registry, which the caller passes in so
/// that settlement can mutate the same orders afterwards.
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    pub buy_book: BidBook,
    pub sell_book: AskBook,
    /// Price of the most recent fill; zero before the first trade.
    pub market_price: Price,
}

impl MatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a taker order against the book.
    ///
    /// The taker is mutated in place as fills occur. If a remainder is
    /// left and the order is not immediate-or-cancel, it is inserted into
    /// its side book; the caller is responsible for putting the order into
    /// the registry. An immediate-or-cancel remainder never rests, the
    /// caller settles its cancellation.
    pub fn process_order(
        &mut self,
        sequence_id: u64,
        taker: &mut Order,
        orders: &mut OrderRegistry,
    ) -> MatchResult {
        let timestamp = taker.created_at;
        let mut match_details = Vec::new();

        loop {
            let maker_id = match taker.direction {
                Direction::BUY => self.sell_book.first(),
                Direction::SELL => self.buy_book.first(),
            };
            let Some(maker_id) = maker_id else { break };
            // Book entries always refer to registered orders. A dangling id
            // means the engine state is already corrupt, so the panic is the
            // halt.
            let maker = orders
                .get_mut(maker_id)
                .expect("book entry refers to an active order");

            let crosses = match taker.direction {
                Direction::BUY => taker.price >= maker.price,
                Direction::SELL => taker.price <= maker.price,
            };
            if !crosses {
                break;
            }

            // Fills execute at the maker's price.
            self.market_price = maker.price;
            let quantity = taker.unfilled_quantity.min(maker.unfilled_quantity);
            taker.fill(quantity, timestamp);
            maker.fill(quantity, timestamp);
            match_details.push(MatchDetail {
                price: maker.price,
                quantity,
                taker_order: taker.clone(),
                maker_order: maker.clone(),
            });

            if maker.is_fully_filled() {
                let (price, seq) = (maker.price, maker.sequence_id);
                match taker.direction {
                    Direction::BUY => self.sell_book.remove(price, seq),
                    Direction::SELL => self.buy_book.remove(price, seq),
                };
            }
            if taker.is_fully_filled() {
                break;
            }
        }

        if !taker.is_fully_filled() && !taker.ioc {
            match taker.direction {
                Direction::BUY => self.buy_book.insert(taker.price, sequence_id, taker.order_id),
                Direction::SELL => self.sell_book.insert(taker.price, sequence_id, taker.order_id),
            }
        }

        MatchResult {
            taker_order: taker.clone(),
            match_details,
        }
    }

    /// Remove a resting order from its side book and mark it cancelled.
    pub fn cancel(&mut self, timestamp: i64, order: &mut Order) {
        match order.direction {
            Direction::BUY => self.buy_book.remove(order.price, order.sequence_id),
            Direction::SELL => self.sell_book.remove(order.price, order.sequence_id),
        };
        order.cancel(timestamp);
    }

    /// Build a depth snapshot with at most `max_depth` levels per side.
    pub fn snapshot(
        &self,
        sequence_id: u64,
        max_depth: usize,
        orders: &OrderRegistry,
    ) -> OrderBookSnapshot {
        OrderBookSnapshot {
            sequence_id,
            market_price: self.market_price,
            bids: side_levels(self.buy_book.iter(), orders, max_depth),
            asks: side_levels(self.sell_book.iter(), orders, max_depth),
        }
    }
}

/// Aggregate book entries into price levels, best price first.
///
/// The depth cap counts levels, not orders; a level is either included
/// whole or not at all.
fn side_levels(
    ids: impl Iterator<Item = OrderId>,
    orders: &OrderRegistry,
    max_depth: usize,
) -> Vec<BookLevel> {
    let mut levels: Vec<BookLevel> = Vec::new();
    for id in ids {
        // Same invariant as the match loop: ids in a book resolve or the
        // state is corrupt.
        let order = orders
            .get(id)
            .expect("book entry refers to an active order");
        match levels.last_mut() {
            Some(level) if level.price == order.price => {
                level.quantity = level.quantity + order.unfilled_quantity;
            }
            _ => {
                if levels.len() == max_depth {
                    break;
                }
                levels.push(BookLevel {
                    price: order.price,
                    quantity: order.unfilled_quantity,
                });
            }
        }
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::UserId;
    use types::numeric::Quantity;
    use types::order::OrderStatus;

    const TS: i64 = 1_708_123_456_789;

    fn submit(
        engine: &mut MatchEngine,
        orders: &mut OrderRegistry,
        seq: u64,
        user: u64,
        direction: Direction,
        price: u64,
        qty: &str,
    ) -> MatchResult {
        submit_order(engine, orders, seq, user, direction, price, qty, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_order(
        engine: &mut MatchEngine,
        orders: &mut OrderRegistry,
        seq: u64,
        user: u64,
        direction: Direction,
        price: u64,
        qty: &str,
        ioc: bool,
    ) -> MatchResult {
        let mut taker = Order::new(
            OrderId::derive(seq, TS),
            seq,
            UserId(user),
            direction,
            Price::from_u64(price),
            qty.parse().unwrap(),
            ioc,
            TS,
        );
        let result = engine.process_order(seq, &mut taker, orders);
        // Mimic settlement: filled makers leave the registry.
        for detail in &result.match_details {
            if detail.maker_order.is_fully_filled() {
                orders.remove(detail.maker_order.order_id).unwrap();
            }
        }
        if !taker.status.is_final() && !taker.ioc {
            orders.insert(taker);
        }
        result
    }

    #[test]
    fn test_resting_order_no_match() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        let result = submit(&mut engine, &mut orders, 1, 100, Direction::BUY, 50000, "1");
        assert!(result.match_details.is_empty());
        assert_eq!(result.taker_order.status, OrderStatus::Pending);
        assert_eq!(engine.buy_book.len(), 1);
        assert_eq!(engine.market_price, Price::zero());
    }

    #[test]
    fn test_full_match_at_maker_price() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        submit(&mut engine, &mut orders, 1, 1, Direction::SELL, 10, "1");
        // Taker bids 12 but pays the maker's 10.
        let result = submit(&mut engine, &mut orders, 2, 2, Direction::BUY, 12, "1");

        assert_eq!(result.match_details.len(), 1);
        let detail = &result.match_details[0];
        assert_eq!(detail.price, Price::from_u64(10));
        assert_eq!(detail.quantity, Quantity::from_u64(1));
        assert_eq!(result.taker_order.status, OrderStatus::FullyFilled);
        assert_eq!(detail.maker_order.status, OrderStatus::FullyFilled);
        assert_eq!(engine.market_price, Price::from_u64(10));
        assert!(engine.sell_book.is_empty());
        assert!(engine.buy_book.is_empty());
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        submit(&mut engine, &mut orders, 1, 1, Direction::SELL, 100, "0.5");
        let result = submit(&mut engine, &mut orders, 2, 2, Direction::BUY, 100, "2");

        assert_eq!(result.match_details.len(), 1);
        assert_eq!(result.taker_order.status, OrderStatus::PartialFilled);
        assert_eq!(
            result.taker_order.unfilled_quantity,
            "1.5".parse::<Quantity>().unwrap()
        );
        assert_eq!(engine.buy_book.len(), 1);
        assert!(engine.sell_book.is_empty());
    }

    #[test]
    fn test_price_time_priority() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        // Two asks at 10 (older first), one at 9.
        submit(&mut engine, &mut orders, 1, 1, Direction::SELL, 10, "1");
        submit(&mut engine, &mut orders, 2, 2, Direction::SELL, 10, "1");
        submit(&mut engine, &mut orders, 3, 3, Direction::SELL, 9, "1");

        let result = submit(&mut engine, &mut orders, 4, 4, Direction::BUY, 10, "3");
        let prices: Vec<_> = result
            .match_details
            .iter()
            .map(|d| d.price)
            .collect();
        assert_eq!(
            prices,
            vec![Price::from_u64(9), Price::from_u64(10), Price::from_u64(10)]
        );
        let maker_seqs: Vec<_> = result
            .match_details
            .iter()
            .map(|d| d.maker_order.sequence_id)
            .collect();
        assert_eq!(maker_seqs, vec![3, 1, 2]);
    }

    #[test]
    fn test_no_cross_leaves_both_sides() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        submit(&mut engine, &mut orders, 1, 1, Direction::SELL, 51000, "1");
        let result = submit(&mut engine, &mut orders, 2, 2, Direction::BUY, 50000, "1");

        assert!(result.match_details.is_empty());
        assert_eq!(engine.buy_book.len(), 1);
        assert_eq!(engine.sell_book.len(), 1);
    }

    #[test]
    fn test_ioc_remainder_does_not_rest() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        submit(&mut engine, &mut orders, 1, 1, Direction::SELL, 100, "1");
        let result = submit_order(
            &mut engine,
            &mut orders,
            2,
            2,
            Direction::BUY,
            100,
            "3",
            true,
        );

        assert_eq!(result.match_details.len(), 1);
        assert_eq!(result.taker_order.status, OrderStatus::PartialFilled);
        assert!(engine.buy_book.is_empty());
    }

    #[test]
    fn test_cancel_removes_from_book() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        let result = submit(&mut engine, &mut orders, 1, 1, Direction::BUY, 100, "1");
        let order_id = result.taker_order.order_id;
        assert_eq!(engine.buy_book.len(), 1);

        let mut order = orders.remove(order_id).unwrap();
        engine.cancel(TS + 1, &mut order);
        assert!(engine.buy_book.is_empty());
        assert_eq!(order.status, OrderStatus::FullyCancelled);
    }

    #[test]
    fn test_snapshot_merges_levels_and_caps_depth() {
        let mut engine = MatchEngine::new();
        let mut orders = OrderRegistry::new();

        submit(&mut engine, &mut orders, 1, 1, Direction::BUY, 100, "1");
        submit(&mut engine, &mut orders, 2, 2, Direction::BUY, 100, "2");
        submit(&mut engine, &mut orders, 3, 3, Direction::BUY, 99, "1");
        submit(&mut engine, &mut orders, 4, 4, Direction::BUY, 98, "1");
        submit(&mut engine, &mut orders, 5, 5, Direction::SELL, 110, "1");

        let snapshot = engine.snapshot(5, 2, &orders);
        assert_eq!(snapshot.sequence_id, 5);
        assert_eq!(snapshot.bids.len(), 2);
        assert_eq!(snapshot.bids[0].price, Price::from_u64(100));
        assert_eq!(snapshot.bids[0].quantity, Quantity::from_u64(3));
        assert_eq!(snapshot.bids[1].price, Price::from_u64(99));
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(snapshot.asks[0].price, Price::from_u64(110));
    }

    proptest::proptest! {
        // Whatever the traffic, the books and the registry must describe
        // exactly the same set of resting orders.
        #[test]
        fn book_and_registry_stay_consistent(
            ops in proptest::collection::vec((proptest::bool::ANY, 1u64..20, 1u64..5), 1..50)
        ) {
            let mut engine = MatchEngine::new();
            let mut orders = OrderRegistry::new();
            for (seq, (buy, price, qty)) in ops.into_iter().enumerate() {
                let seq = seq as u64 + 1;
                let direction = if buy { Direction::BUY } else { Direction::SELL };
                submit(
                    &mut engine,
                    &mut orders,
                    seq,
                    seq,
                    direction,
                    price,
                    &qty.to_string(),
                );
            }

            let book_ids: Vec<_> = engine
                .buy_book
                .iter()
                .chain(engine.sell_book.iter())
                .collect();
            proptest::prop_assert_eq!(book_ids.len(), orders.len());
            for id in book_ids {
                proptest::prop_assert!(orders.get(id).is_some());
            }
        }
    }

    #[test]
    fn test_deterministic_replay() {
        let run = || {
            let mut engine = MatchEngine::new();
            let mut orders = OrderRegistry::new();
            submit(&mut engine, &mut orders, 1, 1, Direction::SELL, 10, "2");
            submit(&mut engine, &mut orders, 2, 2, Direction::BUY, 11, "1");
            submit(&mut engine, &mut orders, 3, 3, Direction::BUY, 9, "3");
            submit(&mut engine, &mut orders, 4, 4, Direction::SELL, 9, "2");
            engine.snapshot(4, 10, &orders)
        };
        assert_eq!(run(), run());
    }
}
