//! Error taxonomy of the payer client.

use http::StatusCode;
use x402_payer_types::chain::ChainFamily;
use x402_payer_types::proto::QuoteError;

use crate::config::ConfigError;
use crate::proof::ProofError;
use crate::wallet::WalletError;

/// Everything that can end a call without an [`InteractionResult`](x402_payer_types::proto::InteractionResult).
///
/// No variant carries secret material.
#[derive(Debug, thiserror::Error)]
pub enum X402PayerError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("No RPC endpoint configured for {family} chain {chain}")]
    MissingRpc { family: ChainFamily, chain: String },
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    /// Non-success status on an attempt that is not a payment challenge.
    #[error("Request failed with status {status}: {body}")]
    Transport { status: StatusCode, body: String },
    /// The server answered the paid retry with another `402`.
    #[error("Payment rejected with status {status}: {body}")]
    PaymentRejected { status: StatusCode, body: String },
    #[error(transparent)]
    Http(#[from] reqwest_middleware::Error),
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Invalid {family} address {address}")]
    InvalidAddress { family: ChainFamily, address: String },
    #[error("Balance query on {chain} failed: {reason}")]
    Balance { chain: String, reason: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl X402PayerError {
    /// Errors that should be fixed in configuration rather than retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            X402PayerError::Wallet(_) | X402PayerError::Config(_) | X402PayerError::MissingRpc { .. }
        )
    }

    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        X402PayerError::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}
