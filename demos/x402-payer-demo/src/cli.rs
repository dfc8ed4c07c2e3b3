use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the x402 payer.
#[derive(Parser, Debug)]
#[command(name = "x402-payer")]
#[command(about = "Call x402 endpoints, paying when asked to")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "X402_PAYER_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Call an endpoint, paying its quote if it answers 402
    Call {
        /// Endpoint URL
        url: String,
        /// JSON payload; the call is a POST when present
        #[arg(long, short)]
        data: Option<String>,
        /// Poll an asynchronous job until it finishes
        #[arg(long)]
        wait: bool,
        /// Refuse quotes above this many atomic units
        #[arg(long)]
        max_amount: Option<u64>,
    },
    /// Show the USDC balance of a wallet
    Balance {
        /// Network name (`base-sepolia`) or CAIP-2 chain id
        chain: String,
        /// Wallet address; the configured payer wallet if omitted
        #[arg(long)]
        owner: Option<String>,
    },
}
