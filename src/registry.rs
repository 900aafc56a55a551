//! Maps `(venue, symbol)` pairs to independent [`Book`]s and dispatches to
//! them. This is the "Registry above the Book" spec.md sketches only
//! briefly: each Book gets its own lock, so unrelated instruments never
//! contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::book::{Book, BookSnapshot, Quote, SubmitOrder};
use crate::errors::BookError;
use crate::order::Order;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct InstrumentKey {
    pub venue: String,
    pub symbol: String,
}

impl InstrumentKey {
    pub fn new(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        InstrumentKey {
            venue: venue.into(),
            symbol: symbol.into(),
        }
    }
}

/// Registered (venue, symbol) books, each independently lockable.
#[derive(Clone, Default)]
pub struct Registry {
    books: Arc<RwLock<HashMap<InstrumentKey, Arc<RwLock<Book>>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a new, empty book for `(venue, symbol)`. A no-op if one
    /// already exists.
    pub async fn register(&self, venue: impl Into<String>, symbol: impl Into<String>) {
        let venue = venue.into();
        let symbol = symbol.into();
        let key = InstrumentKey::new(venue.clone(), symbol.clone());
        let mut books = self.books.write().await;
        books
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(Book::new(venue, symbol))));
    }

    async fn book(&self, venue: &str, symbol: &str) -> Option<Arc<RwLock<Book>>> {
        let key = InstrumentKey::new(venue, symbol);
        self.books.read().await.get(&key).cloned()
    }

    pub async fn instruments(&self) -> Vec<InstrumentKey> {
        self.books.read().await.keys().cloned().collect()
    }

    pub async fn parse_order(&self, req: SubmitOrder) -> Result<Order, BookError> {
        let symbol = req
            .symbol
            .clone()
            .or_else(|| req.stock.clone())
            .ok_or_else(|| BookError::Validation("missing symbol".into()))?;
        let book = self
            .book(&req.venue, &symbol)
            .await
            .ok_or_else(|| BookError::Validation(format!("unknown instrument {}:{}", req.venue, symbol)))?;
        let mut book = book.write().await;
        book.parse_order(req, Utc::now())
    }

    pub async fn cancel_order(
        &self,
        venue: &str,
        symbol: &str,
        id: u64,
    ) -> Result<Order, BookError> {
        let book = self
            .book(venue, symbol)
            .await
            .ok_or_else(|| BookError::Validation(format!("unknown instrument {venue}:{symbol}")))?;
        let mut book = book.write().await;
        book.cancel_order(id)
    }

    pub async fn get_status(&self, venue: &str, symbol: &str, id: u64) -> Result<Order, BookError> {
        let book = self
            .book(venue, symbol)
            .await
            .ok_or_else(|| BookError::Validation(format!("unknown instrument {venue}:{symbol}")))?;
        let book = book.read().await;
        book.get_status(id)
    }

    pub async fn get_all_orders(&self, venue: &str, symbol: &str, account: &str) -> Result<Vec<Order>, BookError> {
        let book = self
            .book(venue, symbol)
            .await
            .ok_or_else(|| BookError::Validation(format!("unknown instrument {venue}:{symbol}")))?;
        let book = book.read().await;
        Ok(book.get_all_orders(account))
    }

    pub async fn get_book(&self, venue: &str, symbol: &str) -> Result<BookSnapshot, BookError> {
        let book = self
            .book(venue, symbol)
            .await
            .ok_or_else(|| BookError::Validation(format!("unknown instrument {venue}:{symbol}")))?;
        let book = book.read().await;
        Ok(book.get_book(Utc::now()))
    }

    pub async fn get_quote(&self, venue: &str, symbol: &str) -> Result<Quote, BookError> {
        let book = self
            .book(venue, symbol)
            .await
            .ok_or_else(|| BookError::Validation(format!("unknown instrument {venue}:{symbol}")))?;
        let book = book.read().await;
        Ok(book.get_quote(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderType, Side};

    fn submit(venue: &str, symbol: &str, direction: Side, qty: i64, price: i64, account: &str) -> SubmitOrder {
        SubmitOrder {
            venue: venue.into(),
            symbol: Some(symbol.into()),
            stock: None,
            direction,
            qty,
            price,
            order_type: OrderType::Limit,
            account: account.into(),
        }
    }

    #[tokio::test]
    async fn unregistered_instrument_is_rejected() {
        let reg = Registry::new();
        let res = reg
            .parse_order(submit("TESTEX", "FOO", Side::Buy, 10, 100, "A"))
            .await;
        assert!(matches!(res, Err(BookError::Validation(_))));
    }

    #[tokio::test]
    async fn independent_books_do_not_share_ids() {
        let reg = Registry::new();
        reg.register("TESTEX", "FOO").await;
        reg.register("TESTEX", "BAR").await;

        let foo = reg
            .parse_order(submit("TESTEX", "FOO", Side::Buy, 10, 100, "A"))
            .await
            .unwrap();
        let bar = reg
            .parse_order(submit("TESTEX", "BAR", Side::Buy, 10, 100, "A"))
            .await
            .unwrap();
        assert_eq!(foo.id, 0);
        assert_eq!(bar.id, 0);
    }
}
