//! Simulation harness for noisy order flow against the engine.

use rand::Rng; // for rng().random_bool()
use rand_distr::{Distribution, Exp, Exp1, Normal};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct SimConfig {
    pub api_base: String,
    pub venue: String,
    pub symbol: String,
    pub run_secs: Option<u64>,
    pub attack_rate_hz: f64, // Poisson rate λ
    pub noise_sigma: f64,    // N(0, σ) drift applied to mid each tick
    pub mean_qty: f64,       // average order size (unit-exp * mean_qty)
}

#[derive(Deserialize)]
struct Ack {
    fills: Vec<AckFill>,
}

#[derive(Deserialize)]
struct AckFill {
    price: i64,
    qty: i64,
}

/// Fire a single **market** order of size 1, update inventory/P&L.
pub async fn send_one_order(
    client: &Client,
    api_base: &str,
    venue: &str,
    symbol: &str,
    iv: &mut i64,
    pnl: &mut f64,
) -> anyhow::Result<()> {
    let direction = if rand::rng().random_bool(0.5) {
        "buy"
    } else {
        "sell"
    };

    let resp = client
        .post(format!("{api_base}/orders"))
        .json(&json!({
            "venue": venue,
            "symbol": symbol,
            "direction": direction,
            "orderType": "market",
            "qty": 1i64,
            "price": 0i64,
            "account": "simulator",
        }))
        .send()
        .await?
        .error_for_status()?;

    let ack: Ack = resp.json().await?;

    for t in ack.fills {
        let price = t.price as f64;
        let qty = t.qty as f64;
        if direction == "buy" {
            *iv -= t.qty;
            *pnl += price * qty;
        } else {
            *iv += t.qty;
            *pnl -= price * qty;
        }
    }
    Ok(())
}

/// Noisy limit-order simulation loop.
pub async fn run_simulation(cfg: SimConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let client: Client = ClientBuilder::new()
        .timeout(Duration::from_secs(5))
        .build()?;

    let ia = Exp::new(cfg.attack_rate_hz).expect("attack_rate_hz must be > 0");
    let drift = Normal::new(0.0, cfg.noise_sigma).expect("noise_sigma >= 0");
    let size = Exp1;

    let mut iv: i64 = 0;
    let mut pnl: f64 = 0.0;
    let mut mid: f64 = 50.0;
    let start = Instant::now();

    let spread = 1.0_f64;

    loop {
        if let Some(max_secs) = cfg.run_secs {
            if start.elapsed().as_secs() >= max_secs {
                break;
            }
        }

        let wait_secs: f64 = ia.sample(&mut rand::rng());
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("received shutdown; exiting simulation loop");
                break;
            }
            _ = sleep(Duration::from_secs_f64(wait_secs)) => {}
        }

        let unit: f64 = size.sample(&mut rand::rng());
        let qty: i64 = (unit * cfg.mean_qty).max(1.0).round() as i64;

        mid += drift.sample(&mut rand::rng());

        let (price, direction) = if rand::rng().random_bool(0.5) {
            (mid - spread, "buy")
        } else {
            (mid + spread, "sell")
        };
        let price: i64 = price.max(1.0).round() as i64;

        match client
            .post(format!("{}/orders", cfg.api_base))
            .json(&json!({
                "venue": cfg.venue,
                "symbol": cfg.symbol,
                "direction": direction,
                "orderType": "limit",
                "qty": qty,
                "price": price,
                "account": "simulator",
            }))
            .send()
            .await
        {
            Ok(resp) => {
                if let Err(e) = resp.error_for_status_ref() {
                    warn!(error = %e, "order post returned non-success");
                    continue;
                }
                match resp.json::<Ack>().await {
                    Ok(ack) => {
                        for t in ack.fills {
                            let px = t.price as f64;
                            let q = t.qty as f64;
                            if direction == "buy" {
                                iv -= t.qty;
                                pnl += px * q;
                            } else {
                                iv += t.qty;
                                pnl -= px * q;
                            }
                        }
                        info!(
                            elapsed = format_args!("{:.1}s", start.elapsed().as_secs_f64()),
                            direction,
                            qty,
                            price,
                            mid = format_args!("{:.2}", mid),
                            inventory = iv,
                            pnl = format_args!("{:.2}", pnl),
                            "sim tick"
                        );
                    }
                    Err(e) => warn!(error = %e, "failed to parse Ack JSON"),
                }
            }
            Err(e) => {
                warn!(error = %e, "HTTP request failed");
                continue;
            }
        }
    }

    info!(
        inventory = iv,
        pnl = format_args!("{:.2}", pnl),
        "simulation done"
    );
    Ok(())
}
