//! Locating and caching the payer's signing identities.
//!
//! For each chain family the resolver looks, in order, at:
//!
//! 1. an identity handed in explicitly ([`WalletResolver::with_solana_identity`],
//!    [`WalletResolver::with_evm_identity`]),
//! 2. the `SOLANA_PRIVATE_KEY` / `EVM_PRIVATE_KEY` environment variable,
//! 3. the `solanaWallet` / `evmPrivateKey` field of the config file,
//! 4. the default key file, `~/.config/solana/id.json` or
//!    `~/.config/x402-payer/evm-key.json`.
//!
//! A value that names an existing file is read from disk; anything else is parsed
//! as the secret itself. The first identity resolved for a family is kept for the
//! life of the resolver.

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use x402_payer_eip155::EvmIdentity;
use x402_payer_solana::SolanaIdentity;
use x402_payer_types::chain::ChainFamily;

use crate::config::{PayerConfig, config_home};

pub const SOLANA_KEY_ENV: &str = "SOLANA_PRIVATE_KEY";
pub const EVM_KEY_ENV: &str = "EVM_PRIVATE_KEY";

const SOLANA_DEFAULT_KEY: [&str; 2] = ["solana", "id.json"];
const EVM_DEFAULT_KEY: [&str; 2] = ["x402-payer", "evm-key.json"];

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("No {family} wallet found, checked: {}", checked.join(", "))]
    NotFound {
        family: ChainFamily,
        checked: Vec<String>,
    },
    #[error("Invalid {family} wallet secret from {location}: {reason}")]
    InvalidSecret {
        family: ChainFamily,
        location: String,
        reason: String,
    },
}

/// A resolved identity able to sign for one chain family.
#[derive(Debug, Clone)]
pub enum SigningIdentity {
    AccountModel(SolanaIdentity),
    Evm(EvmIdentity),
}

impl SigningIdentity {
    pub fn family(&self) -> ChainFamily {
        match self {
            SigningIdentity::AccountModel(_) => ChainFamily::AccountModel,
            SigningIdentity::Evm(_) => ChainFamily::Evm,
        }
    }

    /// The public address, in the chain's own notation.
    pub fn address(&self) -> String {
        match self {
            SigningIdentity::AccountModel(identity) => identity.address(),
            SigningIdentity::Evm(identity) => identity.address().to_string(),
        }
    }
}

/// Finds wallet secrets and caches the identities built from them.
///
/// Environment variables are read once, when the resolver is created. Safe to share
/// between tasks; concurrent first lookups of a family resolve it once.
#[derive(Debug, Default)]
pub struct WalletResolver {
    env: HashMap<String, String>,
    configured: HashMap<ChainFamily, String>,
    config_dir: Option<PathBuf>,
    solana: OnceCell<SolanaIdentity>,
    evm: OnceCell<EvmIdentity>,
}

impl WalletResolver {
    /// A resolver over the process environment and the default key files.
    pub fn new() -> Self {
        let env = [SOLANA_KEY_ENV, EVM_KEY_ENV]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
            .collect();
        Self {
            env,
            config_dir: config_home(),
            ..Default::default()
        }
    }

    /// Like [`WalletResolver::new`], also consulting the wallet fields of `config`.
    pub fn from_config(config: &PayerConfig) -> Self {
        let mut resolver = Self::new();
        if let Some(wallet) = config.solana_wallet.as_ref() {
            resolver = resolver.with_configured_secret(ChainFamily::AccountModel, wallet.inner());
        }
        if let Some(key) = config.evm_private_key.as_ref() {
            resolver = resolver.with_configured_secret(ChainFamily::Evm, key.inner());
        }
        resolver
    }

    pub fn with_solana_identity(mut self, identity: SolanaIdentity) -> Self {
        self.solana = OnceCell::with_value(identity);
        self
    }

    pub fn with_evm_identity(mut self, identity: EvmIdentity) -> Self {
        self.evm = OnceCell::with_value(identity);
        self
    }

    /// Overrides an environment variable as seen by this resolver.
    pub fn with_env_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Sets the config-file value for a family: a key file path or the secret itself.
    pub fn with_configured_secret(mut self, family: ChainFamily, value: impl Into<String>) -> Self {
        self.configured.insert(family, value.into());
        self
    }

    /// Directory holding the default key files, `~/.config` unless overridden.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn resolve(&self, family: ChainFamily) -> Result<SigningIdentity, WalletError> {
        match family {
            ChainFamily::AccountModel => self.solana().map(SigningIdentity::AccountModel),
            ChainFamily::Evm => self.evm().map(SigningIdentity::Evm),
        }
    }

    pub fn solana(&self) -> Result<SolanaIdentity, WalletError> {
        self.solana
            .get_or_try_init(|| {
                self.locate(ChainFamily::AccountModel, |secret| {
                    SolanaIdentity::from_secret(secret).map_err(|e| e.to_string())
                })
            })
            .cloned()
    }

    pub fn evm(&self) -> Result<EvmIdentity, WalletError> {
        self.evm
            .get_or_try_init(|| {
                self.locate(ChainFamily::Evm, |secret| {
                    EvmIdentity::from_secret(secret).map_err(|e| e.to_string())
                })
            })
            .cloned()
    }

    fn locate<T>(
        &self,
        family: ChainFamily,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Result<T, WalletError> {
        let (env_name, config_field, default_key) = match family {
            ChainFamily::AccountModel => (SOLANA_KEY_ENV, "solanaWallet", SOLANA_DEFAULT_KEY),
            ChainFamily::Evm => (EVM_KEY_ENV, "evmPrivateKey", EVM_DEFAULT_KEY),
        };
        let mut checked = vec!["explicit identity".to_string()];

        let env_location = format!("environment variable {env_name}");
        if let Some(value) = non_empty(self.env.get(env_name)) {
            return load(family, env_location, value, &parse);
        }
        checked.push(env_location);

        let config_location = format!("config field {config_field}");
        if let Some(value) = non_empty(self.configured.get(&family)) {
            return load(family, config_location, value, &parse);
        }
        checked.push(config_location);

        if let Some(dir) = self.config_dir.as_ref() {
            let path = default_key.iter().fold(dir.clone(), |path, part| path.join(part));
            if path.is_file() {
                let location = "default key file".to_string();
                return load(family, location, &path.display().to_string(), &parse);
            }
            checked.push(path.display().to_string());
        }

        Err(WalletError::NotFound { family, checked })
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Reads `value` as a key file if it names one, otherwise parses it as the secret.
fn load<T>(
    family: ChainFamily,
    location: String,
    value: &str,
    parse: &impl Fn(&str) -> Result<T, String>,
) -> Result<T, WalletError> {
    let invalid = |location: &str, reason: String| WalletError::InvalidSecret {
        family,
        location: location.to_string(),
        reason,
    };
    let identity = match key_file(value) {
        Some(path) => {
            let location = format!("{location} ({})", path.display());
            let contents =
                std::fs::read_to_string(&path).map_err(|e| invalid(&location, e.to_string()))?;
            let identity = parse(&contents).map_err(|reason| invalid(&location, reason))?;
            tracing::debug!(%family, %location, "Loaded wallet from key file");
            identity
        }
        None => {
            let identity = parse(value).map_err(|reason| invalid(&location, reason))?;
            tracing::debug!(%family, %location, "Loaded wallet secret");
            identity
        }
    };
    Ok(identity)
}

fn key_file(value: &str) -> Option<PathBuf> {
    let path = match value.strip_prefix("~/") {
        Some(rest) => directories::BaseDirs::new()?.home_dir().join(rest),
        None => Path::new(value).to_path_buf(),
    };
    path.is_file().then_some(path)
}
