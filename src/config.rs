//! Client configuration, read from a JSON file.
//!
//! ```json
//! {
//!   "solanaWallet": "~/.config/solana/payer.json",
//!   "evmPrivateKey": "$EVM_PRIVATE_KEY",
//!   "solanaRpcUrl": "https://api.devnet.solana.com",
//!   "evmRpcUrls": { "base-sepolia": "https://sepolia.base.org" },
//!   "maxAmountAtomic": 1000000,
//!   "pollIntervalSeconds": 3,
//!   "maxPollAttempts": 40
//! }
//! ```
//!
//! Every string value may be written as `$VAR` or `${VAR}` to read it from the
//! environment, see [`LiteralOrEnv`].

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use x402_payer_types::chain::ChainId;
use x402_payer_types::config::LiteralOrEnv;

/// Status checks issued before a job is reported as timed out.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

const CONFIG_DIR: &str = "x402-payer";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayerConfig {
    /// Path to, or contents of, the Solana keypair.
    #[serde(default, skip_serializing)]
    pub solana_wallet: Option<LiteralOrEnv<String>>,
    /// Path to, or contents of, the EVM private key.
    #[serde(default, skip_serializing)]
    pub evm_private_key: Option<LiteralOrEnv<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solana_rpc_url: Option<LiteralOrEnv<Url>>,
    /// Keyed by network name (`base-sepolia`) or CAIP-2 id (`eip155:84532`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub evm_rpc_urls: HashMap<String, LiteralOrEnv<Url>>,
    /// Quotes above this many atomic units are refused before signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount_atomic: Option<u64>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(
        default,
        rename = "pollIntervalSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_poll_attempts: Option<u32>,
}

impl PayerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the file at `path`, or an empty configuration if there is none.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// `~/.config/x402-payer/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        config_home().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn solana_rpc_url(&self) -> Option<&Url> {
        self.solana_rpc_url.as_deref()
    }

    /// EVM RPC endpoints keyed by chain. Keys that name no known chain are skipped.
    pub fn evm_rpc_endpoints(&self) -> HashMap<ChainId, Url> {
        self.evm_rpc_urls
            .iter()
            .filter_map(|(key, url)| match ChainId::from_quoted(key) {
                Some(chain) => Some((chain, url.inner().clone())),
                None => {
                    tracing::warn!(chain = %key, "Ignoring RPC URL for unknown chain");
                    None
                }
            })
            .collect()
    }

    pub fn max_poll_attempts(&self) -> u32 {
        self.max_poll_attempts.unwrap_or(DEFAULT_MAX_POLL_ATTEMPTS)
    }
}

/// `$HOME/.config` on every platform, where wallet tooling keeps its keys.
pub(crate) fn config_home() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .map(|home| home.join(".config"))
}
