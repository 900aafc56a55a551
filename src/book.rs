//! The price-time-priority limit order book for a single (venue, symbol)
//! pair — the matching engine itself.
//!
//! Ladders ([`Book::bids`], [`Book::asks`]) are price-indexed maps of FIFO
//! queues holding order ids, not orders: the order itself lives once, in
//! [`Book::id_index`], and is mutated in place by [`Book::cross`] and by
//! [`Book::cancel_order`]. This is the back-reference layout spec's design
//! notes recommend over storing full order copies in the ladder.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::BookError;
use crate::order::{self, Fill, Order, OrderType, Side};

/// Request shape for [`Book::parse_order`] — the wire "Submit order" object.
/// Either `symbol` or `stock` may carry the instrument; `symbol` wins if
/// both are present (an alias kept from the Stockfighter-derived original).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrder {
    pub venue: String,
    pub symbol: Option<String>,
    pub stock: Option<String>,
    pub direction: Side,
    pub qty: i64,
    pub price: i64,
    pub order_type: OrderType,
    pub account: String,
}

/// One resting-or-was-resting order as reported in a [`BookSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookLevel {
    pub price: i64,
    pub qty: i64,
    pub is_buy: bool,
}

/// Full top-to-bottom snapshot of both ladders, in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSnapshot {
    pub ok: bool,
    pub venue: String,
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub ts: String,
}

/// Top-of-book quote with depth and the last-trade tape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub ok: bool,
    pub venue: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<i64>,
    pub bid_size: i64,
    pub bid_depth: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask: Option<i64>,
    pub ask_size: i64,
    pub ask_depth: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_trade: Option<String>,
    pub quote_time: String,
}

/// The order book and matching engine for one (venue, symbol) pair.
pub struct Book {
    pub venue: String,
    pub symbol: String,
    /// Buy side, keyed by price ascending; best bid is the highest price
    /// (iterate in reverse for priority order).
    pub bids: BTreeMap<i64, VecDeque<u64>>,
    /// Sell side, keyed by price ascending; best ask is the lowest price.
    pub asks: BTreeMap<i64, VecDeque<u64>>,
    /// Canonical store: every order ever accepted, indexed by id, owned
    /// here for the lifetime of the Book.
    pub id_index: HashMap<u64, Order>,
    /// Append-only per-account order history, in submission order.
    pub account_index: HashMap<String, Vec<u64>>,
    pub next_id: u64,
    last_trade: Option<(i64, i64, String)>,
}

impl Book {
    pub fn new(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        Book {
            venue: venue.into(),
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            id_index: HashMap::new(),
            account_index: HashMap::new(),
            next_id: 0,
            last_trade: None,
        }
    }

    /// Validate, assign an id, index, and dispatch by order type. This is
    /// the engine's single mutating entry point for new orders.
    pub fn parse_order(&mut self, req: SubmitOrder, now: DateTime<Utc>) -> Result<Order, BookError> {
        let symbol = req
            .symbol
            .or(req.stock)
            .ok_or_else(|| BookError::Validation("missing symbol".into()))?;
        if req.venue != self.venue {
            return Err(BookError::Validation(format!(
                "venue mismatch: book is {}, order is {}",
                self.venue, req.venue
            )));
        }
        if symbol != self.symbol {
            return Err(BookError::Validation(format!(
                "symbol mismatch: book is {}, order is {}",
                self.symbol, symbol
            )));
        }
        if req.qty <= 0 {
            return Err(BookError::Validation("qty must be > 0".into()));
        }
        if req.price < 0 {
            return Err(BookError::Validation("price must be >= 0".into()));
        }
        if req.account.trim().is_empty() {
            return Err(BookError::Validation("account must not be empty".into()));
        }

        let id = self.next_id;
        self.next_id += 1;

        let order = Order {
            id,
            account: req.account.clone(),
            venue: self.venue.clone(),
            symbol: self.symbol.clone(),
            direction: req.direction,
            order_type: req.order_type,
            original_qty: req.qty,
            price: req.price,
            qty: req.qty,
            total_filled: 0,
            fills: Vec::new(),
            open: true,
            ts: order::format_ts(now),
        };
        info!(
            id,
            account = %order.account,
            direction = ?order.direction,
            order_type = ?order.order_type,
            qty = order.original_qty,
            price = order.price,
            "order accepted"
        );
        self.id_index.insert(id, order);
        self.account_index
            .entry(req.account)
            .or_default()
            .push(id);

        self.dispatch(id, now);

        Ok(self.id_index[&id].clone())
    }

    /// Apply order-type semantics on top of `cross` (spec §4.3).
    fn dispatch(&mut self, id: u64, now: DateTime<Utc>) {
        // Pulled out of id_index for the duration of matching so that
        // `cross` can borrow the rest of id_index mutably without aliasing
        // the very order it's matching — reinserted before returning.
        let mut incoming = self.id_index.remove(&id).expect("order was just inserted");
        let mut rests = false;

        match incoming.order_type {
            OrderType::Limit => {
                self.cross(&mut incoming, now);
                rests = incoming.belongs_on_ladder();
            }
            OrderType::ImmediateOrCancel => {
                self.cross(&mut incoming, now);
                if incoming.qty > 0 {
                    incoming.open = false;
                }
            }
            OrderType::FillOrKill => {
                if self.fok_fillable(incoming.direction, incoming.price, incoming.qty) {
                    self.cross(&mut incoming, now);
                } else {
                    warn!(id, "fill-or-kill order could not be fully filled, killed");
                    incoming.open = false;
                }
            }
            OrderType::Market => {
                let worst_price = match incoming.direction {
                    Side::Buy => self.asks.keys().next_back().copied(),
                    Side::Sell => self.bids.keys().next().copied(),
                };
                if let Some(worst_price) = worst_price {
                    let submitted_price = incoming.price;
                    incoming.price = worst_price;
                    self.cross(&mut incoming, now);
                    incoming.price = submitted_price;
                }
                if incoming.qty > 0 {
                    incoming.open = false;
                }
            }
        }

        self.id_index.insert(id, incoming);
        if rests {
            self.insert_resting(id);
        }
    }

    /// Cross `incoming` against the opposite ladder in priority order,
    /// mutating both sides and recording fills, until either side is
    /// exhausted or the next resting price is no longer acceptable.
    fn cross(&mut self, incoming: &mut Order, now: DateTime<Utc>) {
        let buy = incoming.direction == Side::Buy;
        let Book {
            bids,
            asks,
            id_index,
            last_trade,
            ..
        } = self;

        loop {
            if incoming.qty == 0 {
                break;
            }
            let ladder: &mut BTreeMap<i64, VecDeque<u64>> = if buy { &mut *asks } else { &mut *bids };
            let best_price = if buy {
                ladder.keys().next().copied()
            } else {
                ladder.keys().next_back().copied()
            };
            let Some(price) = best_price else { break };
            let acceptable = if buy {
                price <= incoming.price
            } else {
                price >= incoming.price
            };
            if !acceptable {
                break;
            }

            let queue = ladder.get_mut(&price).expect("price level just looked up");
            let Some(&resting_id) = queue.front() else {
                ladder.remove(&price);
                continue;
            };
            let resting = id_index
                .get_mut(&resting_id)
                .expect("ladder id missing from id_index");

            let traded = incoming.qty.min(resting.qty);
            let fill = Fill::new(price, traded, now);

            incoming.qty -= traded;
            incoming.total_filled += traded;
            incoming.fills.push(fill.clone());
            if incoming.qty == 0 {
                incoming.open = false;
            }

            resting.qty -= traded;
            resting.total_filled += traded;
            resting.fills.push(fill);

            let resting_closed = resting.qty == 0;
            if resting_closed {
                resting.open = false;
            }
            *last_trade = Some((price, traded, order::format_ts(now)));

            if resting_closed {
                let ladder: &mut BTreeMap<i64, VecDeque<u64>> = if buy { &mut *asks } else { &mut *bids };
                if let Some(queue) = ladder.get_mut(&price) {
                    queue.pop_front();
                    if queue.is_empty() {
                        ladder.remove(&price);
                    }
                }
            }
        }

        self.sweep();
    }

    /// Drop closed orders from both ladders. Runs after every cross and
    /// after every cancel, localizing removal cost to a single pass
    /// instead of existence-checking inside the cross loop (spec §4.1).
    fn sweep(&mut self) {
        Self::sweep_side(&mut self.bids, &self.id_index);
        Self::sweep_side(&mut self.asks, &self.id_index);
    }

    fn sweep_side(ladder: &mut BTreeMap<i64, VecDeque<u64>>, id_index: &HashMap<u64, Order>) {
        let mut emptied = Vec::new();
        for (&price, queue) in ladder.iter_mut() {
            queue.retain(|id| id_index.get(id).is_some_and(|o| o.open));
            if queue.is_empty() {
                emptied.push(price);
            }
        }
        for price in emptied {
            ladder.remove(&price);
        }
    }

    fn insert_resting(&mut self, id: u64) {
        let order = self.id_index.get(&id).expect("order must exist");
        let (direction, price) = (order.direction, order.price);
        let ladder = match direction {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        ladder.entry(price).or_default().push_back(id);
    }

    /// Pre-scan the opposite ladder: can `qty` at `price` be fully filled
    /// right now? Stops early once the target is reached or a
    /// non-acceptable price is hit, relying on ladder sortedness.
    fn fok_fillable(&self, direction: Side, price: i64, qty: i64) -> bool {
        let mut available = 0i64;
        match direction {
            Side::Buy => {
                for (&ask_price, ids) in self.asks.iter() {
                    if ask_price > price {
                        break;
                    }
                    available += self.level_qty(ids);
                    if available >= qty {
                        break;
                    }
                }
            }
            Side::Sell => {
                for (&bid_price, ids) in self.bids.iter().rev() {
                    if bid_price < price {
                        break;
                    }
                    available += self.level_qty(ids);
                    if available >= qty {
                        break;
                    }
                }
            }
        }
        available >= qty
    }

    fn level_qty(&self, ids: &VecDeque<u64>) -> i64 {
        ids.iter()
            .filter_map(|id| self.id_index.get(id))
            .map(|o| o.qty)
            .sum()
    }

    /// Idempotent cancel: closes an open order and sweeps it off its
    /// ladder. Cancelling an already-closed order is a no-op that returns
    /// it unchanged.
    pub fn cancel_order(&mut self, id: u64) -> Result<Order, BookError> {
        let order = self.id_index.get_mut(&id).ok_or(BookError::NotFound(id))?;
        if order.open {
            order.qty = 0;
            order.open = false;
            info!(id, "order cancelled");
            self.sweep();
        }
        Ok(self.id_index[&id].clone())
    }

    pub fn get_status(&self, id: u64) -> Result<Order, BookError> {
        self.id_index.get(&id).cloned().ok_or(BookError::NotFound(id))
    }

    /// Full order history for an account, open and closed, in submission
    /// order. An account that has never submitted an order gets an empty
    /// list rather than an error.
    pub fn get_all_orders(&self, account: &str) -> Vec<Order> {
        self.account_index
            .get(account)
            .map(|ids| ids.iter().filter_map(|id| self.id_index.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn account_from_order_id(&self, id: u64) -> Option<String> {
        self.id_index.get(&id).map(|o| o.account.clone())
    }

    pub fn get_book(&self, now: DateTime<Utc>) -> BookSnapshot {
        let bids = self
            .bids
            .iter()
            .rev()
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.id_index.get(id))
            .map(|o| BookLevel {
                price: o.price,
                qty: o.qty,
                is_buy: true,
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.id_index.get(id))
            .map(|o| BookLevel {
                price: o.price,
                qty: o.qty,
                is_buy: false,
            })
            .collect();
        BookSnapshot {
            ok: true,
            venue: self.venue.clone(),
            symbol: self.symbol.clone(),
            bids,
            asks,
            ts: order::format_ts(now),
        }
    }

    pub fn get_quote(&self, now: DateTime<Utc>) -> Quote {
        let best_bid = self.bids.iter().next_back();
        let best_ask = self.asks.iter().next();

        let (bid, bid_size) = match best_bid {
            Some((&price, ids)) => (Some(price), self.level_qty(ids)),
            None => (None, 0),
        };
        let (ask, ask_size) = match best_ask {
            Some((&price, ids)) => (Some(price), self.level_qty(ids)),
            None => (None, 0),
        };
        let bid_depth = self.bids.values().map(|ids| self.level_qty(ids)).sum();
        let ask_depth = self.asks.values().map(|ids| self.level_qty(ids)).sum();

        let (last, last_size, last_trade) = match &self.last_trade {
            Some((price, qty, ts)) => (Some(*price), Some(*qty), Some(ts.clone())),
            None => (None, None, None),
        };

        Quote {
            ok: true,
            venue: self.venue.clone(),
            symbol: self.symbol.clone(),
            bid,
            bid_size,
            bid_depth,
            ask,
            ask_size,
            ask_depth,
            last,
            last_size,
            last_trade,
            quote_time: order::format_ts(now),
        }
    }
}
