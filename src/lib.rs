#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Pay-per-call HTTP client for [x402](https://www.x402.org).
//!
//! [`X402Payer`] calls an endpoint and, when it answers `402 Payment Required`,
//! reads the quote, signs a payment with the right wallet for the quoted chain,
//! retries once with the `X-Payment` header and returns the response together with
//! a [`Receipt`](types::proto::Receipt) of what was charged. Calls that the server
//! finishes later come back with a [`JobHandle`](types::proto::JobHandle) to poll.
//!
//! Two settlement families are supported:
//!
//! - **Solana**: a sponsored SPL token transfer, pre-signed by the payer
//!   (see [`x402_payer_solana`]).
//! - **EVM chains**: an EIP-3009 transfer authorization signed with EIP-712
//!   (see [`x402_payer_eip155`]).
//!
//! # Modules
//!
//! - [`client`] - The protocol state machine, [`X402Payer`]
//! - [`wallet`] - Finding and caching signing identities
//! - [`proof`] - Building payment proofs for either chain family
//! - [`receipt`] - Normalizing receipts
//! - [`poller`] - Polling asynchronous jobs
//! - [`config`] - The JSON config file
//! - [`error`] - The error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use x402_payer::{PayerConfig, X402Payer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = match PayerConfig::default_path() {
//!     Some(path) => PayerConfig::load_or_default(&path)?,
//!     None => PayerConfig::default(),
//! };
//! let payer = X402Payer::from_config(&config);
//! let payload = serde_json::json!({"query": "weather in Lisbon"});
//! let result = payer.send("https://api.example.com/tools/weather", Some(&payload)).await?;
//! if let Some(receipt) = &result.receipt {
//!     println!("paid {} to {}", receipt.amount_paid, receipt.merchant);
//! }
//! if let Some(job) = &result.job {
//!     let status = payer.poll(job, None).await?;
//!     println!("job finished: {:?}", status.state);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod proof;
pub mod receipt;
pub mod wallet;

pub use x402_payer_types as types;

pub use client::{Balance, PaidRequest, X402Payer};
pub use config::PayerConfig;
pub use error::X402PayerError;
pub use poller::{JobPoller, PollOptions};
pub use proof::{PaymentProofFactory, ProofError};
pub use receipt::{ReceiptError, ReceiptParser};
pub use wallet::{SigningIdentity, WalletError, WalletResolver};
