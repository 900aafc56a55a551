//! A two-sided market maker bot: quotes a buy and a sell just around the
//! book's current mid-price, and re-quotes whenever that midpoint moves.
//!
//! Connects to the engine's websocket tape for one instrument, tracks the
//! midpoint via a `tokio::watch` channel, and places/cancels resting limit
//! orders over REST as the midpoint drifts.

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::{sync::watch, time};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMsg};
use tokio_util::sync::CancellationToken;

use crate::api::WsFrame;
use crate::book::SubmitOrder;
use crate::errors::MarketMakerError;
use crate::order::{OrderType, Side};

const SPREAD: i64 = 2;
const PACE_MS: u64 = 500;
const ACCOUNT: &str = "market-maker";

#[derive(Deserialize)]
struct OrderAck {
    id: u64,
}

/// Starts the market maker loop against a REST+WS API at `api_base` for
/// `(venue, symbol)`.
pub async fn run_market_maker(
    api_base: &str,
    venue: &str,
    symbol: &str,
    token: CancellationToken,
) -> Result<(), MarketMakerError> {
    let ws_url = format!(
        "ws://{host}/ws/{venue}/{symbol}",
        host = api_base.trim_start_matches("http://"),
    );
    tracing::warn!("market maker: connecting to: {:?}", ws_url);

    let ws_stream = loop {
        match connect_async(&ws_url).await {
            Ok((stream, _)) => {
                tracing::info!("market maker: ws connected successfully");
                break stream;
            }
            Err(e) => {
                tracing::warn!("market maker: ws connect failed: {}; retrying...", e);
                tokio::time::sleep(std::time::Duration::from_millis(100)).await
            }
        }
    };

    let (_write, read) = ws_stream.split();

    let (mid_tx, mid_rx) = watch::channel(None::<i64>);

    let frames = read.filter_map(|msg| async move {
        match msg {
            Ok(WsMsg::Text(txt)) => match serde_json::from_str::<WsFrame>(&txt) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    tracing::warn!("invalid WS frame: {err}");
                    None
                }
            },
            _ => None,
        }
    });
    tokio::spawn(async move {
        tokio::pin!(frames);
        while let Some(frame) = frames.next().await {
            if let WsFrame::BookSnapshot(snap) = frame {
                if let (Some(bb), Some(aa)) = (snap.bids.first(), snap.asks.first()) {
                    let mid = (bb.price + aa.price) / 2;
                    let _ = mid_tx.send(Some(mid));
                }
            }
        }
    });

    let client = reqwest::Client::new();
    let mut outstanding: Vec<u64> = Vec::new();
    let mut interval = time::interval(time::Duration::from_millis(PACE_MS));
    let mut last_mid = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("market maker: shutdown requested, tearing down...");
                break;
            }
            _ = interval.tick() => {
                let mid_opt: Option<i64> = *mid_rx.borrow();
                let Some(mid_price) = mid_opt else { continue };
                if Some(mid_price) == last_mid {
                    continue;
                }

                for id in outstanding.drain(..) {
                    let _ = client
                        .delete(format!("{api_base}/orders/{venue}/{symbol}/{id}"))
                        .send()
                        .await;
                }

                let bid_price = mid_price.saturating_sub(SPREAD).max(0);
                tracing::info!(bid_price, "placing bid");
                if let Ok(resp) = client
                    .post(format!("{api_base}/orders"))
                    .json(&SubmitOrder {
                        venue: venue.into(),
                        symbol: Some(symbol.into()),
                        stock: None,
                        direction: Side::Buy,
                        order_type: OrderType::Limit,
                        price: bid_price,
                        qty: 1,
                        account: ACCOUNT.into(),
                    })
                    .send()
                    .await
                {
                    if let Ok(ack) = resp.json::<OrderAck>().await {
                        outstanding.push(ack.id);
                    }
                }

                let ask_price = mid_price.saturating_add(SPREAD);
                tracing::info!(ask_price, "placing ask");
                if let Ok(resp) = client
                    .post(format!("{api_base}/orders"))
                    .json(&SubmitOrder {
                        venue: venue.into(),
                        symbol: Some(symbol.into()),
                        stock: None,
                        direction: Side::Sell,
                        order_type: OrderType::Limit,
                        price: ask_price,
                        qty: 1,
                        account: ACCOUNT.into(),
                    })
                    .send()
                    .await
                {
                    if let Ok(ack) = resp.json::<OrderAck>().await {
                        outstanding.push(ack.id);
                    }
                }

                last_mid = Some(mid_price);
            }
        }
    }
    Ok(())
}
