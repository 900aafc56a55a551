use serde::{Deserialize, Serialize};

use crate::order::Fill;

/// A fill, tagged with the instrument it happened on, broadcast over the
/// websocket tape. The fill's own price/qty/ts come from the resting
/// order's side of the cross, per spec.md §4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub venue: String,
    pub symbol: String,
    #[serde(flatten)]
    pub fill: Fill,
}
