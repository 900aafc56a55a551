use axum::Router;
use clap::Parser;
use order_book_engine::cli::{Cli, Commands};
use order_book_engine::utils::shutdown_token;
use order_book_engine::{api, market_maker, simulate, state::AppState};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

async fn wait_for_server(api_base: &str, venue: &str, symbol: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    loop {
        match client
            .get(format!("{api_base}/books/{venue}/{symbol}"))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => break,
            _ => tokio::time::sleep(Duration::from_millis(25)).await,
        };
    }
    Ok(())
}

async fn seed_book(ep: &str, venue: &str, symbol: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    for (direction, price) in &[("buy", 48), ("sell", 52)] {
        client
            .post(format!("{ep}/orders"))
            .json(&serde_json::json!({
                "venue": venue,
                "symbol": symbol,
                "direction": direction,
                "orderType": "limit",
                "price": price,
                "qty": 10,
                "account": "seed",
            }))
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(direction, price, "seeded resting orders");
    }
    Ok(())
}

async fn get_app_listener(port: u16, state: AppState) -> anyhow::Result<(TcpListener, Router)> {
    let app = api::router(state);
    let ep = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(ep.clone()).await?;
    Ok((listener, app))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::new();
    let token = shutdown_token();
    let server_token = token.clone();
    let mm_token = token.clone();
    let sim_token = token.clone();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let base = "http://127.0.0.1".to_string();
    match cli.command {
        Commands::Simulate {
            port,
            secs,
            venue,
            symbol,
        } => {
            state.registry.register(venue.clone(), symbol.clone()).await;
            let mut handlers = tokio::task::JoinSet::new();
            let (listener, app) = get_app_listener(port, state.clone()).await?;
            tracing::warn!(port, secs, "spawning the server task");
            handlers.spawn(async move {
                tracing::info!("HTTP/WS server listening on 0.0.0.0:{}", port);
                axum::serve(listener, app)
                    .with_graceful_shutdown(server_token.cancelled_owned())
                    .await
                    .unwrap();
            });
            let ep = format!("{base}:{port}");
            tracing::info!(%ep, "end_point");
            wait_for_server(&ep, &venue, &symbol).await?;
            seed_book(&ep, &venue, &symbol).await?;

            let (mm_venue, mm_symbol) = (venue.clone(), symbol.clone());
            let mmb = base.clone();
            handlers.spawn(async move {
                if let Err(e) = market_maker::run_market_maker(&mmb, &mm_venue, &mm_symbol, mm_token).await {
                    tracing::error!("market maker exited: {:?}", e);
                }
            });

            handlers.spawn(async move {
                if let Err(e) = simulate::run_simulation(
                    simulate::SimConfig {
                        api_base: base,
                        venue,
                        symbol,
                        run_secs: if secs == 0 { None } else { Some(secs) },
                        attack_rate_hz: 5.0,
                        noise_sigma: 0.5,
                        mean_qty: 10.0,
                    },
                    sim_token,
                )
                .await
                {
                    tracing::error!("simulation error: {:?}", e);
                }
            });
            handlers.join_all().await;
        }
        Commands::Server { port, venue, symbol } => {
            state.registry.register(venue, symbol).await;
            let (listener, app) = get_app_listener(port, state.clone()).await?;
            let svh = tokio::spawn(async move {
                tracing::info!("HTTP/WS server listening on 0.0.0.0:{}", port);
                axum::serve(listener, app)
                    .with_graceful_shutdown(server_token.cancelled_owned())
                    .await
                    .unwrap();
            });
            svh.await?;
        }
    };
    Ok(())
}
