//! x402 payer command line.
//!
//! Calls a paid endpoint, paying the quote it answers with, and prints the
//! interaction result as JSON. Jobs the server finishes later can be polled to
//! completion with `--wait`.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `X402_PAYER_CONFIG` points at the config file
//! - `SOLANA_PRIVATE_KEY`, `EVM_PRIVATE_KEY` supply signing keys
//! - `RUST_LOG` controls log verbosity

mod cli;
mod run;

use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run::run().await {
        eprintln!("{e}");
        process::exit(1)
    }
}
