//! Command-line surface: `server` runs the HTTP/WS engine standalone,
//! `simulate` additionally spawns a market maker and noisy order flow
//! against it, all on one instrument.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "engine-cli")]
#[command(version = "0.1", about = "A price-time-priority limit order book engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server plus a market maker and simulated order flow for one instrument.
    Simulate {
        port: u16,
        secs: u64,
        #[arg(long, default_value = "TESTEX")]
        venue: String,
        #[arg(long, default_value = "FOO")]
        symbol: String,
    },
    /// Run the HTTP/WS server only.
    Server {
        port: u16,
        #[arg(long, default_value = "TESTEX")]
        venue: String,
        #[arg(long, default_value = "FOO")]
        symbol: String,
    },
}
