#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana support for paying x402 quotes.
//!
//! A Solana payment is an SPL `TransferChecked` transaction from the payer's
//! associated token account to the recipient's, whose network fee is paid by a
//! sponsor named in the quote. The payer signs its own slot and hands the partially
//! signed transaction to the server; it never broadcasts.
//!
//! # Modules
//!
//! - [`chain`] - Addresses, USDC mints and the ledger RPC seam
//! - [`identity`] - The payer's keypair and its secret formats
//! - [`exact`] - Transaction assembly and the payment payload
//! - [`balance`] - Token balance queries
//!
//! # Example
//!
//! ```no_run
//! use solana_client::nonblocking::rpc_client::RpcClient;
//! use solana_keypair::Keypair;
//! use x402_payer_solana::{SolanaIdentity, sign_payment};
//! # async fn pay(quote: x402_payer_types::proto::Quote) -> Result<(), Box<dyn std::error::Error>> {
//! let identity = SolanaIdentity::new(Keypair::new());
//! let rpc = RpcClient::new("https://api.devnet.solana.com".to_string());
//! let proof = sign_payment(&identity, &rpc, &quote).await?;
//! println!("X-Payment: {}", proof.header_value());
//! # Ok(())
//! # }
//! ```

pub mod balance;
pub mod chain;
pub mod exact;
pub mod identity;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use chain::rpc::RpcClientLike;
pub use exact::client::{SolanaExactError, sign_payment};
pub use identity::{KeypairSecretError, SolanaIdentity};
