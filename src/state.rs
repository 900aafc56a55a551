use tokio::sync::broadcast;

use crate::registry::{InstrumentKey, Registry};
use crate::trade::TradeEvent;

/// Shared application state handed to every axum handler: the instrument
/// [`Registry`] plus the broadcast channels the websocket tape reads from.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub trade_tx: broadcast::Sender<TradeEvent>,
    pub book_tx: broadcast::Sender<InstrumentKey>,
}

impl AppState {
    pub fn new() -> Self {
        let (trade_tx, _) = broadcast::channel(1024);
        let (book_tx, _) = broadcast::channel(1024);
        AppState {
            registry: Registry::new(),
            trade_tx,
            book_tx,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new()
    }
}
