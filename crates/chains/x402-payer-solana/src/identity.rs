//! The account-model signing identity: an ed25519 keypair.

use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum KeypairSecretError {
    #[error("Secret is neither a JSON byte array nor a base58 string")]
    Unrecognized,
    #[error("Secret is {0} bytes long, expected 32 or 64")]
    InvalidLength(usize),
    #[error("Secret bytes do not form a valid keypair: {0}")]
    InvalidKeypair(String),
}

/// A Solana keypair that signs payment transactions.
///
/// Cheap to clone. `Debug` shows the public key only.
#[derive(Clone)]
pub struct SolanaIdentity {
    keypair: Arc<Keypair>,
}

impl SolanaIdentity {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Parses secret material in either of the two common encodings:
    ///
    /// - a JSON array of bytes, the format of `solana-keygen` key files
    /// - a base58 string, the format wallets export
    ///
    /// Both the 64-byte keypair form and the 32-byte seed form are accepted.
    pub fn from_secret(secret: &str) -> Result<Self, KeypairSecretError> {
        let secret = secret.trim();
        let bytes = if secret.starts_with('[') {
            serde_json::from_str::<Vec<u8>>(secret).map_err(|_| KeypairSecretError::Unrecognized)?
        } else {
            bs58::decode(secret)
                .into_vec()
                .map_err(|_| KeypairSecretError::Unrecognized)?
        };
        let keypair = match bytes.len() {
            64 => Keypair::try_from(bytes.as_slice())
                .map_err(|e| KeypairSecretError::InvalidKeypair(e.to_string()))?,
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                Keypair::new_from_array(seed)
            }
            other => return Err(KeypairSecretError::InvalidLength(other)),
        };
        Ok(Self::new(keypair))
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Base58 address of the wallet.
    pub fn address(&self) -> String {
        self.pubkey().to_string()
    }
}

impl fmt::Debug for SolanaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaIdentity")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_byte_array() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        let identity = SolanaIdentity::from_secret(&json).unwrap();
        assert_eq!(identity.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_base58() {
        let keypair = Keypair::new();
        let identity = SolanaIdentity::from_secret(&keypair.to_base58_string()).unwrap();
        assert_eq!(identity.address(), keypair.pubkey().to_string());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            SolanaIdentity::from_secret("[1, 2, 3]"),
            Err(KeypairSecretError::InvalidLength(3))
        ));
        assert!(matches!(
            SolanaIdentity::from_secret("0x0O"),
            Err(KeypairSecretError::Unrecognized)
        ));
        assert!(matches!(
            SolanaIdentity::from_secret("[300]"),
            Err(KeypairSecretError::Unrecognized)
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = Keypair::new();
        let secret = keypair.to_base58_string();
        let identity = SolanaIdentity::new(keypair);
        assert!(!format!("{identity:?}").contains(&secret));
    }
}
