//! Order and fill records.
//!
//! An [`Order`] is created once by [`crate::book::Book::parse_order`] and then
//! only mutated in place by the matcher and by cancellation — it is never
//! removed from a [`Book`](crate::book::Book)'s index while the book lives.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// The four order types the engine understands. No stop orders, no iceberg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderType {
    Limit,
    Market,
    ImmediateOrCancel,
    FillOrKill,
}

/// One executed trade slice. Appended field-for-field to both the resting
/// and the incoming order of a cross (spec invariant I5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub price: i64,
    pub qty: i64,
    pub ts: String,
}

impl Fill {
    pub fn new(price: i64, qty: i64, ts: DateTime<Utc>) -> Self {
        Fill {
            price,
            qty,
            ts: format_ts(ts),
        }
    }
}

/// Render a timestamp the way the wire contract expects: ISO-8601 UTC with
/// sub-second resolution.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// An order resting in, or having passed through, a [`Book`](crate::book::Book).
///
/// Identity and intent (`id`, `account`, `venue`, `symbol`, `side`,
/// `order_type`, `original_qty`, `price`) never change after creation.
/// Progress (`qty`, `total_filled`, `fills`, `open`) is mutated only by the
/// matcher and by `cancel_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub account: String,
    pub venue: String,
    pub symbol: String,
    pub direction: Side,
    pub order_type: OrderType,
    pub original_qty: i64,
    /// Client-submitted price. For market orders this is temporarily
    /// overridden during `cross` and always restored before the order is
    /// returned to the caller — fills still carry the executed price.
    pub price: i64,
    pub qty: i64,
    pub total_filled: i64,
    pub fills: Vec<Fill>,
    pub open: bool,
    pub ts: String,
}

impl Order {
    /// Key a buy order by `(-price, ts, id)` — more aggressive price first,
    /// ties broken by arrival, ties on arrival broken by id. Adding `id` to
    /// the key (spec §9) makes the ordering deterministic even when two
    /// orders share a textual timestamp.
    pub fn buy_priority_key(&self) -> (i64, &str, u64) {
        (-self.price, &self.ts, self.id)
    }

    /// Key a sell order by `(price, ts, id)` — lower price first.
    pub fn sell_priority_key(&self) -> (i64, &str, u64) {
        (self.price, &self.ts, self.id)
    }

    /// An order rests on a ladder iff it is an open limit order with
    /// remaining quantity (spec invariant I1/I4).
    pub fn belongs_on_ladder(&self) -> bool {
        self.open && self.order_type == OrderType::Limit && self.qty > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(price: i64, ts: &str, id: u64) -> Order {
        Order {
            id,
            account: "A".into(),
            venue: "TESTEX".into(),
            symbol: "FOO".into(),
            direction: Side::Buy,
            order_type: OrderType::Limit,
            original_qty: 10,
            price,
            qty: 10,
            total_filled: 0,
            fills: vec![],
            open: true,
            ts: ts.to_string(),
        }
    }

    #[test]
    fn buy_priority_prefers_higher_price() {
        let hi = sample(110, "2026-01-01T00:00:00.000000Z", 0);
        let lo = sample(100, "2026-01-01T00:00:00.000000Z", 1);
        assert!(hi.buy_priority_key() < lo.buy_priority_key());
    }

    #[test]
    fn equal_price_breaks_tie_on_ts_then_id() {
        let first = sample(100, "2026-01-01T00:00:00.000000Z", 5);
        let second = sample(100, "2026-01-01T00:00:00.000001Z", 1);
        assert!(first.buy_priority_key() < second.buy_priority_key());

        let a = sample(100, "2026-01-01T00:00:00.000000Z", 1);
        let b = sample(100, "2026-01-01T00:00:00.000000Z", 2);
        assert!(a.buy_priority_key() < b.buy_priority_key());
    }

    #[test]
    fn belongs_on_ladder_requires_open_limit_with_qty() {
        let mut o = sample(100, "t", 0);
        assert!(o.belongs_on_ladder());
        o.qty = 0;
        assert!(!o.belongs_on_ladder());
        o.qty = 10;
        o.open = false;
        assert!(!o.belongs_on_ladder());
        o.open = true;
        o.order_type = OrderType::Market;
        assert!(!o.belongs_on_ladder());
    }
}
