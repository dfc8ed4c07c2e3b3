//! The EVM signing identity: a secp256k1 private key.

use alloy_primitives::{Address, B256, FixedBytes, Signature};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EvmSecretError {
    #[error("Secret is neither a JSON key object nor a 32-byte hex string")]
    Unrecognized,
    #[error("Secret is not a valid secp256k1 private key: {0}")]
    InvalidKey(String),
}

/// Abstracts signing so both owned and `Arc`-wrapped signers can be used.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner` is not
/// `Clone`.
#[async_trait]
pub trait SignerLike {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + Send + Sync> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// A private key that signs EIP-712 transfer authorizations.
///
/// The public address is derived on first use and remembered. `Debug` shows the
/// address only.
#[derive(Clone)]
pub struct EvmIdentity {
    signer: Arc<PrivateKeySigner>,
    address: Arc<OnceCell<Address>>,
}

impl EvmIdentity {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer: Arc::new(signer),
            address: Arc::new(OnceCell::new()),
        }
    }

    /// An identity whose address is already known.
    pub fn with_address(signer: PrivateKeySigner, address: Address) -> Self {
        Self {
            signer: Arc::new(signer),
            address: Arc::new(OnceCell::with_value(address)),
        }
    }

    /// Parses secret material in any of these forms:
    ///
    /// - a 32-byte hex string, with or without `0x`
    /// - a JSON string holding such a hex string
    /// - a JSON object with a `privateKey`, `private_key` or `key` field holding one
    ///
    /// An `address` field in the JSON object is not trusted; the address is always
    /// derived from the key.
    pub fn from_secret(secret: &str) -> Result<Self, EvmSecretError> {
        let secret = secret.trim();
        let hex = if secret.starts_with('{') || secret.starts_with('"') {
            let value: serde_json::Value =
                serde_json::from_str(secret).map_err(|_| EvmSecretError::Unrecognized)?;
            match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Object(map) => ["privateKey", "private_key", "key"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .ok_or(EvmSecretError::Unrecognized)?,
                _ => return Err(EvmSecretError::Unrecognized),
            }
        } else {
            secret.to_string()
        };
        let bytes = B256::from_str(hex.trim()).map_err(|_| EvmSecretError::Unrecognized)?;
        let signer = PrivateKeySigner::from_bytes(&bytes)
            .map_err(|e| EvmSecretError::InvalidKey(e.to_string()))?;
        Ok(Self::new(signer))
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn address(&self) -> Address {
        *self.address.get_or_init(|| self.signer.address())
    }
}

#[async_trait]
impl SignerLike for EvmIdentity {
    fn address(&self) -> Address {
        EvmIdentity::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        self.signer.sign_hash(hash).await
    }
}

impl fmt::Debug for EvmIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmIdentity")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn expected_address() -> Address {
        PrivateKeySigner::from_str(KEY).unwrap().address()
    }

    #[test]
    fn test_raw_hex() {
        assert_eq!(EvmIdentity::from_secret(KEY).unwrap().address(), expected_address());
        let bare = KEY.trim_start_matches("0x");
        assert_eq!(EvmIdentity::from_secret(bare).unwrap().address(), expected_address());
    }

    #[test]
    fn test_json_forms() {
        for json in [
            format!(r#"{{"privateKey": "{KEY}"}}"#),
            format!(r#"{{"private_key": "{KEY}", "address": "0x0"}}"#),
            format!(r#"{{"key": "{KEY}"}}"#),
            format!(r#""{KEY}""#),
        ] {
            let identity = EvmIdentity::from_secret(&json).unwrap();
            assert_eq!(identity.address(), expected_address(), "{json}");
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            EvmIdentity::from_secret("0x1234"),
            Err(EvmSecretError::Unrecognized)
        ));
        assert!(matches!(
            EvmIdentity::from_secret(r#"{"mnemonic": "abandon"}"#),
            Err(EvmSecretError::Unrecognized)
        ));
        assert!(matches!(
            EvmIdentity::from_secret(&format!("0x{}", "00".repeat(32))),
            Err(EvmSecretError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_known_address_is_used() {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        let identity = EvmIdentity::with_address(signer, address);
        assert_eq!(identity.address(), address);
    }

    #[test]
    fn test_debug_hides_key() {
        let identity = EvmIdentity::from_secret(KEY).unwrap();
        let debug = format!("{identity:?}");
        assert!(!debug.contains(KEY.trim_start_matches("0x")));
    }
}
