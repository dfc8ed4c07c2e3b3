#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for paying [x402](https://www.x402.org) quotes.
//!
//! This crate holds the chain-agnostic vocabulary shared by the payer client and
//! the chain-specific signing crates. It does no I/O.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2 chain identifiers and chain families
//! - [`config`] - Configuration values that may reference environment variables
//! - [`networks`] - Registry of well-known network names
//! - [`proto`] - Wire types and the quote / proof / receipt data model
//! - [`timestamp`] - Unix timestamps used in authorization windows
//! - [`util`] - Base64 helpers and the quoted-amount normalizer

pub mod chain;
pub mod config;
pub mod networks;
pub mod proto;
pub mod timestamp;
pub mod util;
