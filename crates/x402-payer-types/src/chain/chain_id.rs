//! CAIP-2 chain identifiers.
//!
//! A CAIP-2 chain ID is `namespace:reference`, e.g. `eip155:8453` for Base or
//! `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp` for Solana mainnet.
//!
//! ```
//! use x402_payer_types::chain::ChainId;
//!
//! let base: ChainId = "eip155:8453".parse().unwrap();
//! assert_eq!(base.namespace, "eip155");
//! assert_eq!(base.reference, "8453");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

use crate::chain::ChainFamily;
use crate::networks;

/// A CAIP-2 compliant blockchain identifier.
///
/// Serializes to/from a colon-separated string: `"eip155:8453"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    /// The blockchain namespace (e.g., `eip155` for EVM chains, `solana` for Solana).
    pub namespace: String,
    /// The chain-specific reference (e.g., `8453` for Base).
    pub reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Looks a well-known network name up in [`crate::networks`].
    ///
    /// ```
    /// use x402_payer_types::chain::ChainId;
    ///
    /// let base = ChainId::from_network_name("base").unwrap();
    /// assert_eq!(base.to_string(), "eip155:8453");
    /// assert!(ChainId::from_network_name("unknown").is_none());
    /// ```
    pub fn from_network_name(network_name: &str) -> Option<Self> {
        networks::chain_id_by_network_name(network_name).cloned()
    }

    /// Returns the well-known network name for this chain ID, if any.
    pub fn as_network_name(&self) -> Option<&'static str> {
        networks::network_name_by_chain_id(self)
    }

    /// Resolves a chain identifier as it appears in a quote.
    ///
    /// Quotes name the chain either by a well-known network name (`base`, `solana-devnet`)
    /// or by a CAIP-2 id. Network names are tried first.
    ///
    /// ```
    /// use x402_payer_types::chain::ChainId;
    ///
    /// assert_eq!(ChainId::from_quoted("solana").unwrap().namespace, "solana");
    /// assert_eq!(ChainId::from_quoted("eip155:137").unwrap().reference, "137");
    /// assert!(ChainId::from_quoted("nowhere").is_none());
    /// ```
    pub fn from_quoted(quoted: &str) -> Option<Self> {
        let quoted = quoted.trim();
        Self::from_network_name(quoted).or_else(|| quoted.parse().ok())
    }

    /// The settlement model of this chain, if it is one the payer can pay on.
    pub fn family(&self) -> Option<ChainFamily> {
        ChainFamily::from_namespace(&self.namespace)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when parsing an invalid chain ID string.
#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || reference.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(ChainId::new(namespace, reference))
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_caip2() {
        let chain: ChainId = "eip155:8453".parse().unwrap();
        assert_eq!(chain, ChainId::new("eip155", "8453"));
        assert_eq!(chain.to_string(), "eip155:8453");
    }

    #[test]
    fn test_parse_rejects_missing_parts() {
        assert!("eip155".parse::<ChainId>().is_err());
        assert!(":8453".parse::<ChainId>().is_err());
        assert!("eip155:".parse::<ChainId>().is_err());
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let chain = ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1");
        let json = serde_json::to_string(&chain).unwrap();
        assert_eq!(json, "\"solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1\"");
        let back: ChainId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
    }

    #[test]
    fn test_from_quoted_prefers_network_names() {
        let chain = ChainId::from_quoted("base-sepolia").unwrap();
        assert_eq!(chain, ChainId::new("eip155", "84532"));
        assert_eq!(chain.as_network_name(), Some("base-sepolia"));
    }

    #[test]
    fn test_family_by_namespace() {
        assert_eq!(
            ChainId::new("eip155", "1").family(),
            Some(ChainFamily::Evm)
        );
        assert_eq!(
            ChainId::new("solana", "x").family(),
            Some(ChainFamily::AccountModel)
        );
        assert_eq!(ChainId::new("aptos", "1").family(), None);
    }
}
