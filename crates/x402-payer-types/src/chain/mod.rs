//! Chain identifiers and settlement families.
//!
//! - [`ChainId`] - A CAIP-2 compliant chain identifier (e.g., `eip155:8453` for Base)
//! - [`ChainFamily`] - Which of the two settlement models a chain uses

mod chain_id;

pub use chain_id::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// CAIP-2 namespace of EVM-compatible chains.
pub const EIP155_NAMESPACE: &str = "eip155";
/// CAIP-2 namespace of Solana chains.
pub const SOLANA_NAMESPACE: &str = "solana";

/// The settlement model of a chain.
///
/// The two families need structurally different payment proofs:
///
/// - [`ChainFamily::AccountModel`]: a pre-signed token transfer transaction whose
///   network fee is sponsored by a third party (Solana).
/// - [`ChainFamily::Evm`]: an off-chain EIP-712 signature over an ERC-3009 transfer
///   authorization, settled by the server (EIP-155 chains).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainFamily {
    AccountModel,
    Evm,
}

impl ChainFamily {
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            EIP155_NAMESPACE => Some(ChainFamily::Evm),
            SOLANA_NAMESPACE => Some(ChainFamily::AccountModel),
            _ => None,
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            ChainFamily::AccountModel => SOLANA_NAMESPACE,
            ChainFamily::Evm => EIP155_NAMESPACE,
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}
