//! Solana chain types: addresses, token deployments and the ledger RPC seam.

pub mod rpc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_pubkey::{Pubkey, pubkey};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use x402_payer_types::chain::{ChainId, SOLANA_NAMESPACE};
use x402_payer_types::networks::USDC;

/// CAIP-2 reference of Solana mainnet.
pub const SOLANA_MAINNET_REFERENCE: &str = "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp";
/// CAIP-2 reference of Solana devnet.
pub const SOLANA_DEVNET_REFERENCE: &str = "EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

/// A Solana public key address.
///
/// Serialized as a base58-encoded string.
///
/// ```
/// use x402_payer_solana::chain::Address;
/// use std::str::FromStr;
///
/// let addr = Address::from_str("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").unwrap();
/// assert_eq!(addr.to_string(), "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
/// ```
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Address(Pubkey);

impl Address {
    pub const fn new(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }

    pub fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl From<Pubkey> for Address {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl From<Address> for Pubkey {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to decode Solana address: {0}")]
pub struct AddressParseError(String);

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pubkey = Pubkey::from_str(s.trim()).map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self(pubkey))
    }
}

/// An SPL token mint on a specific Solana network.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SolanaTokenDeployment {
    pub chain_id: ChainId,
    /// The SPL token mint address.
    pub address: Address,
    pub decimals: u8,
}

/// The USDC mint on the given Solana chain, if it is a known network.
///
/// ```
/// use x402_payer_solana::chain::usdc_deployment;
/// use x402_payer_types::chain::ChainId;
///
/// let devnet = ChainId::from_network_name("solana-devnet").unwrap();
/// let usdc = usdc_deployment(&devnet).unwrap();
/// assert_eq!(usdc.address.to_string(), "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");
/// ```
pub fn usdc_deployment(chain_id: &ChainId) -> Option<SolanaTokenDeployment> {
    if chain_id.namespace != SOLANA_NAMESPACE {
        return None;
    }
    let address = match chain_id.reference.as_str() {
        SOLANA_MAINNET_REFERENCE => pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
        SOLANA_DEVNET_REFERENCE => pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
        _ => return None,
    };
    Some(SolanaTokenDeployment {
        chain_id: chain_id.clone(),
        address: address.into(),
        decimals: USDC::DECIMALS as u8,
    })
}
