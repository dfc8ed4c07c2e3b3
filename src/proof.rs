//! Building payment proofs for quotes, whatever chain they are on.

use std::sync::Arc;
use x402_payer_eip155::Eip155ExactError;
use x402_payer_solana::{RpcClientLike, SolanaExactError};
use x402_payer_types::chain::ChainFamily;
use x402_payer_types::proto::{PaymentProof, Quote};

use crate::wallet::SigningIdentity;

/// A proof could not be built. Every variant names the chain family it was for.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("Cannot pay {family} quote: {reason}")]
    InvalidQuote { family: ChainFamily, reason: String },
    #[error("Identity for {identity} chains cannot pay a {quoted} quote")]
    FamilyMismatch {
        identity: ChainFamily,
        quoted: ChainFamily,
    },
    #[error("No ledger RPC configured to build {family} payments")]
    MissingRpc { family: ChainFamily },
    #[error("solana payment failed: {0}")]
    AccountModel(#[from] SolanaExactError),
    #[error("eip155 payment failed: {0}")]
    Evm(#[from] Eip155ExactError),
}

impl ProofError {
    pub fn family(&self) -> ChainFamily {
        match self {
            ProofError::InvalidQuote { family, .. } => *family,
            ProofError::FamilyMismatch { quoted, .. } => *quoted,
            ProofError::MissingRpc { family } => *family,
            ProofError::AccountModel(_) => ChainFamily::AccountModel,
            ProofError::Evm(_) => ChainFamily::Evm,
        }
    }
}

/// Turns a quote and an identity into a signed, single-use [`PaymentProof`].
///
/// The account-model branch reads the ledger (mint, blockhash, priority fees)
/// through the configured RPC client; the EVM branch signs offline.
#[derive(Clone, Default)]
pub struct PaymentProofFactory {
    solana_rpc: Option<Arc<dyn RpcClientLike>>,
}

impl PaymentProofFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solana_rpc(mut self, rpc: Arc<dyn RpcClientLike>) -> Self {
        self.solana_rpc = Some(rpc);
        self
    }

    pub fn solana_rpc(&self) -> Option<&Arc<dyn RpcClientLike>> {
        self.solana_rpc.as_ref()
    }

    #[tracing::instrument(name = "x402.payer.build_proof", skip_all, err, fields(chain = %quote.chain))]
    pub async fn build(
        &self,
        quote: &Quote,
        identity: &SigningIdentity,
    ) -> Result<PaymentProof, ProofError> {
        let family = quote.family;
        if quote.recipient.trim().is_empty() {
            return Err(ProofError::InvalidQuote {
                family,
                reason: "no recipient".to_string(),
            });
        }
        if quote.amount.atomic == 0 {
            return Err(ProofError::InvalidQuote {
                family,
                reason: "zero amount".to_string(),
            });
        }

        let proof = match identity {
            SigningIdentity::AccountModel(identity) if family == ChainFamily::AccountModel => {
                let rpc = self
                    .solana_rpc
                    .as_ref()
                    .ok_or(ProofError::MissingRpc { family })?;
                x402_payer_solana::sign_payment(identity, &**rpc, quote).await?
            }
            SigningIdentity::Evm(identity) if family == ChainFamily::Evm => {
                x402_payer_eip155::sign_payment(identity, quote).await?
            }
            other => {
                return Err(ProofError::FamilyMismatch {
                    identity: other.family(),
                    quoted: family,
                });
            }
        };
        tracing::debug!(payer = %proof.payer, "Built payment proof");
        Ok(proof)
    }
}

impl std::fmt::Debug for PaymentProofFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentProofFactory")
            .field("solana_rpc", &self.solana_rpc.is_some())
            .finish()
    }
}
