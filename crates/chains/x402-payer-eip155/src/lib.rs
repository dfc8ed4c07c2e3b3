#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EIP-155 (EVM) support for paying x402 quotes.
//!
//! An EVM payment is an ERC-3009 `transferWithAuthorization` signed off-chain with
//! EIP-712. The payer never submits a transaction; the server presents the signed
//! authorization to the token contract.
//!
//! # Modules
//!
//! - [`chain`] - Chain references, USDC deployments and ERC-20 balance queries
//! - [`identity`] - The payer's private key and its secret formats
//! - [`exact`] - Authorization signing and the payment payload
//!
//! # Example
//!
//! ```no_run
//! use alloy_signer_local::PrivateKeySigner;
//! use x402_payer_eip155::{EvmIdentity, sign_payment};
//! # async fn pay(quote: x402_payer_types::proto::Quote) -> Result<(), Box<dyn std::error::Error>> {
//! let identity = EvmIdentity::new(PrivateKeySigner::random());
//! let proof = sign_payment(&identity, &quote).await?;
//! println!("X-Payment: {}", proof.header_value());
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod exact;
pub mod identity;

pub use exact::client::{Eip155ExactError, sign_payment};
pub use identity::{EvmIdentity, EvmSecretError, SignerLike};
