//! Payer-side construction of Solana "exact" payments.
//!
//! The transaction carries, in order:
//!
//! 1. a compute unit limit sized for one token transfer
//! 2. a compute unit price taken from recent prioritization fees
//! 3. one SPL `TransferChecked` from the payer's token account to the recipient's
//! 4. a memo with a random nonce, so two equal payments never share a signature
//!
//! Its fee payer is the sponsor named by the quote. Only the payer signs here; the
//! sponsor's signature slot stays empty until the server side fills it.

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_message::v0::Message as MessageV0;
use solana_message::VersionedMessage;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::Instruction;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use std::str::FromStr;
use x402_payer_types::proto::{PaymentEnvelope, PaymentProof, Quote};
use x402_payer_types::util::Base64Bytes;

use crate::chain::rpc::RpcClientLike;
use crate::chain::{Address, usdc_deployment};
use crate::exact::{
    ExactSolanaPayload, MEMO_PROGRAM_PUBKEY, PartialTransaction, associated_token_address,
};
use crate::identity::SolanaIdentity;

/// Compute unit limit of a payment transaction. A checked transfer plus memo uses
/// well under this.
pub const TRANSFER_COMPUTE_UNIT_LIMIT: u32 = 40_000;

#[derive(Debug, thiserror::Error)]
pub enum SolanaExactError {
    #[error("Quote names no fee payer; Solana payments must be sponsored")]
    MissingSponsor,
    #[error("Quote names no token mint and {0} has no known USDC deployment")]
    UnknownAsset(String),
    #[error("Invalid {field} address {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("Failed to fetch mint {mint}: {reason}")]
    Mint { mint: Pubkey, reason: String },
    #[error("Ledger RPC failed: {0}")]
    Rpc(String),
    #[error("Failed to assemble transaction: {0}")]
    Assemble(String),
    #[error("Failed to sign transaction: {0}")]
    Sign(String),
    #[error("Failed to encode payment: {0}")]
    Encode(String),
}

/// Mint information for SPL tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mint {
    Token { decimals: u8, token_program: Pubkey },
    Token2022 { decimals: u8, token_program: Pubkey },
}

impl Mint {
    pub fn token_program(&self) -> &Pubkey {
        match self {
            Mint::Token { token_program, .. } => token_program,
            Mint::Token2022 { token_program, .. } => token_program,
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Mint::Token { decimals, .. } => *decimals,
            Mint::Token2022 { decimals, .. } => *decimals,
        }
    }
}

/// Fetches a mint account and tells the classic token program from Token-2022 by its owner.
pub async fn fetch_mint<R: RpcClientLike + ?Sized>(
    mint_address: &Address,
    rpc_client: &R,
) -> Result<Mint, SolanaExactError> {
    let mint_pubkey = *mint_address.pubkey();
    let mint_error = |reason: String| SolanaExactError::Mint {
        mint: mint_pubkey,
        reason,
    };
    let account = rpc_client
        .get_account(&mint_pubkey)
        .await
        .map_err(|e| mint_error(e.to_string()))?
        .ok_or_else(|| mint_error("account not found".to_string()))?;
    if account.owner == spl_token::id() {
        let mint = spl_token::state::Mint::unpack(&account.data)
            .map_err(|e| mint_error(e.to_string()))?;
        Ok(Mint::Token {
            decimals: mint.decimals,
            token_program: spl_token::id(),
        })
    } else if account.owner == spl_token_2022::id() {
        let mint = spl_token_2022::state::Mint::unpack(&account.data)
            .map_err(|e| mint_error(e.to_string()))?;
        Ok(Mint::Token2022 {
            decimals: mint.decimals,
            token_program: spl_token_2022::id(),
        })
    } else {
        Err(mint_error(format!("unknown owner {}", account.owner)))
    }
}

/// The smallest nonzero recent prioritization fee over `writeable_accounts`, or 1.
pub async fn get_priority_fee_micro_lamports<R: RpcClientLike + ?Sized>(
    rpc_client: &R,
    writeable_accounts: &[Pubkey],
) -> Result<u64, SolanaExactError> {
    let recent_fees = rpc_client
        .get_recent_prioritization_fees(writeable_accounts)
        .await
        .map_err(|e| SolanaExactError::Rpc(e.to_string()))?;
    let fee = recent_fees
        .iter()
        .map(|e| e.prioritization_fee)
        .filter(|fee| *fee > 0)
        .min()
        .unwrap_or(1);
    Ok(fee)
}

fn build_random_memo_ix() -> Instruction {
    let nonce: [u8; 16] = rand::random();
    let memo_data = Base64Bytes::encode(nonce).to_string();
    Instruction::new_with_bytes(MEMO_PROGRAM_PUBKEY, memo_data.as_bytes(), Vec::new())
}

/// A transfer transaction signed by the payer.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    /// Base64 of the bincode-serialized transaction.
    pub transaction: String,
    pub signature: Signature,
}

/// Builds and signs a sponsored token transfer of `amount` atomic units of `asset`
/// from `signer` to `pay_to`.
pub async fn build_signed_transfer_transaction<S: Signer + ?Sized, R: RpcClientLike + ?Sized>(
    signer: &S,
    rpc_client: &R,
    fee_payer: &Pubkey,
    pay_to: &Address,
    asset: &Address,
    amount: u64,
) -> Result<SignedTransfer, SolanaExactError> {
    let mint = fetch_mint(asset, rpc_client).await?;

    let client_pubkey = signer.pubkey();
    let source_ata = associated_token_address(&client_pubkey, mint.token_program(), asset.pubkey());
    let destination_ata =
        associated_token_address(pay_to.pubkey(), mint.token_program(), asset.pubkey());

    let transfer_instruction = match mint {
        Mint::Token {
            decimals,
            token_program,
        } => spl_token::instruction::transfer_checked(
            &token_program,
            &source_ata,
            asset.pubkey(),
            &destination_ata,
            &client_pubkey,
            &[],
            amount,
            decimals,
        )
        .map_err(|e| SolanaExactError::Assemble(e.to_string()))?,
        Mint::Token2022 {
            decimals,
            token_program,
        } => spl_token_2022::instruction::transfer_checked(
            &token_program,
            &source_ata,
            asset.pubkey(),
            &destination_ata,
            &client_pubkey,
            &[],
            amount,
            decimals,
        )
        .map_err(|e| SolanaExactError::Assemble(e.to_string()))?,
    };

    let recent_blockhash = rpc_client
        .get_latest_blockhash()
        .await
        .map_err(|e| SolanaExactError::Rpc(e.to_string()))?;
    let fee =
        get_priority_fee_micro_lamports(rpc_client, &[*fee_payer, destination_ata, source_ata])
            .await?;

    let instructions = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(TRANSFER_COMPUTE_UNIT_LIMIT),
        ComputeBudgetInstruction::set_compute_unit_price(fee),
        transfer_instruction,
        build_random_memo_ix(),
    ];
    let msg = MessageV0::try_compile(fee_payer, &instructions, &[], recent_blockhash)
        .map_err(|e| SolanaExactError::Assemble(format!("{e:?}")))?;

    let tx = PartialTransaction::new(VersionedTransaction {
        signatures: vec![],
        message: VersionedMessage::V0(msg),
    });
    let signed = tx
        .sign_with_keypair(signer)
        .map_err(|e| SolanaExactError::Sign(e.to_string()))?;
    let signature = signed
        .signature_of(&client_pubkey)
        .ok_or_else(|| SolanaExactError::Sign("payer signature missing".to_string()))?;
    let transaction = signed
        .as_base64()
        .map_err(|e| SolanaExactError::Encode(e.to_string()))?;

    Ok(SignedTransfer {
        transaction,
        signature,
    })
}

/// Builds the payment proof for a quote on a Solana chain.
///
/// The token is the quote's `asset`, or USDC on the quoted network. The proof's
/// settlement reference is the payer's transaction signature.
pub async fn sign_payment<R: RpcClientLike + ?Sized>(
    identity: &SolanaIdentity,
    rpc_client: &R,
    quote: &Quote,
) -> Result<PaymentProof, SolanaExactError> {
    let sponsor = quote
        .sponsor
        .as_deref()
        .ok_or(SolanaExactError::MissingSponsor)?;
    let fee_payer = parse_address("sponsor", sponsor)?;
    let pay_to = parse_address("recipient", &quote.recipient)?;
    let asset = match quote.asset.as_deref() {
        Some(asset) => parse_address("asset", asset)?,
        None => {
            usdc_deployment(&quote.chain)
                .ok_or_else(|| SolanaExactError::UnknownAsset(quote.chain.to_string()))?
                .address
        }
    };

    let signed = build_signed_transfer_transaction(
        identity.keypair(),
        rpc_client,
        fee_payer.pubkey(),
        &pay_to,
        &asset,
        quote.amount.atomic,
    )
    .await?;
    let signature = signed.signature.to_string();
    tracing::debug!(%signature, fee_payer = %fee_payer, "Signed sponsored transfer");

    let envelope = PaymentEnvelope::new(
        quote.scheme.clone(),
        quote.network.clone(),
        ExactSolanaPayload {
            transaction: signed.transaction,
            signature: signature.clone(),
        },
    );
    let header_value = envelope
        .to_header_value()
        .map_err(|e| SolanaExactError::Encode(e.to_string()))?;

    Ok(PaymentProof {
        scheme: quote.scheme.clone(),
        chain: quote.chain.clone(),
        family: quote.family,
        payer: identity.address(),
        header_value,
        settlement_reference: Some(signature),
    })
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, SolanaExactError> {
    Address::from_str(value).map_err(|_| SolanaExactError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SOLANA_DEVNET_REFERENCE;
    use crate::test_utils::{MockLedger, mint_account};
    use solana_keypair::Keypair;
    use x402_payer_types::chain::{ChainFamily, ChainId};
    use x402_payer_types::proto::DEFAULT_SCHEME;
    use x402_payer_types::util::NormalizedAmount;

    fn unique() -> Pubkey {
        Keypair::new().pubkey()
    }

    fn quote(recipient: &Pubkey, sponsor: Option<&Pubkey>, asset: Option<&Pubkey>) -> Quote {
        Quote {
            chain: ChainId::new("solana", SOLANA_DEVNET_REFERENCE),
            family: ChainFamily::AccountModel,
            network: "solana-devnet".to_string(),
            recipient: recipient.to_string(),
            amount: NormalizedAmount::from_atomic(50_000),
            scheme: DEFAULT_SCHEME.to_string(),
            sponsor: sponsor.map(|s| s.to_string()),
            resource: None,
            asset: asset.map(|a| a.to_string()),
            max_timeout_seconds: 300,
            extra: None,
        }
    }

    fn decode(proof: &PaymentProof) -> (PaymentEnvelope<ExactSolanaPayload>, VersionedTransaction) {
        let envelope: PaymentEnvelope<ExactSolanaPayload> =
            Base64Bytes::from(proof.header_value.as_bytes())
                .decode_json()
                .unwrap();
        let bytes = Base64Bytes::from(envelope.payload.transaction.as_bytes())
            .decode()
            .unwrap();
        let tx: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
        (envelope, tx)
    }

    #[tokio::test]
    async fn test_sponsored_transfer() {
        let payer = SolanaIdentity::new(Keypair::new());
        let recipient = unique();
        let sponsor = unique();
        let mint = unique();
        let ledger = MockLedger::default().with_account(mint, mint_account(spl_token::id(), 6));

        let proof = sign_payment(&payer, &ledger, &quote(&recipient, Some(&sponsor), Some(&mint)))
            .await
            .unwrap();
        assert_eq!(proof.family, ChainFamily::AccountModel);
        assert_eq!(proof.payer, payer.address());

        let (envelope, tx) = decode(&proof);
        assert_eq!(envelope.x402_version, 1);
        assert_eq!(envelope.chain, "solana-devnet");
        assert_eq!(proof.settlement_reference.as_deref(), Some(envelope.payload.signature.as_str()));

        let keys = tx.message.static_account_keys();
        assert_eq!(keys[0], sponsor, "sponsor pays the fee");
        assert_eq!(tx.message.header().num_required_signatures, 2);
        assert_eq!(tx.signatures[0], Signature::default(), "sponsor slot left empty");
        assert_eq!(tx.signatures[1].to_string(), envelope.payload.signature);

        let instructions = tx.message.instructions();
        assert_eq!(instructions.len(), 4);
        let transfer = &instructions[2];
        assert_eq!(keys[transfer.program_id_index as usize], spl_token::id());
        let destination = keys[transfer.accounts[2] as usize];
        assert_eq!(
            destination,
            associated_token_address(&recipient, &spl_token::id(), &mint)
        );
        let unpacked = spl_token::instruction::TokenInstruction::unpack(&transfer.data).unwrap();
        assert!(matches!(
            unpacked,
            spl_token::instruction::TokenInstruction::TransferChecked { amount: 50_000, decimals: 6 }
        ));
    }

    #[tokio::test]
    async fn test_two_payments_never_share_a_signature() {
        let payer = SolanaIdentity::new(Keypair::new());
        let mint = unique();
        let ledger = MockLedger::default().with_account(mint, mint_account(spl_token::id(), 6));
        let quote = quote(&unique(), Some(&unique()), Some(&mint));
        let first = sign_payment(&payer, &ledger, &quote).await.unwrap();
        let second = sign_payment(&payer, &ledger, &quote).await.unwrap();
        assert_ne!(first.settlement_reference, second.settlement_reference);
    }

    #[tokio::test]
    async fn test_token_2022_mint() {
        let payer = SolanaIdentity::new(Keypair::new());
        let mint = unique();
        let ledger =
            MockLedger::default().with_account(mint, mint_account(spl_token_2022::id(), 6));
        let proof = sign_payment(
            &payer,
            &ledger,
            &quote(&unique(), Some(&unique()), Some(&mint)),
        )
        .await
        .unwrap();
        let (_, tx) = decode(&proof);
        let keys = tx.message.static_account_keys();
        let transfer = &tx.message.instructions()[2];
        assert_eq!(keys[transfer.program_id_index as usize], spl_token_2022::id());
    }

    #[tokio::test]
    async fn test_priority_fee_is_smallest_nonzero() {
        let ledger = MockLedger::default().with_fees(&[0, 7, 3, 0]);
        assert_eq!(get_priority_fee_micro_lamports(&ledger, &[]).await.unwrap(), 3);
        let ledger = MockLedger::default().with_fees(&[0, 0]);
        assert_eq!(get_priority_fee_micro_lamports(&ledger, &[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_sponsor_fails_before_rpc() {
        let payer = SolanaIdentity::new(Keypair::new());
        let ledger = MockLedger::default();
        let err = sign_payment(&payer, &ledger, &quote(&unique(), None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, SolanaExactError::MissingSponsor));
        assert_eq!(ledger.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_mint_owner() {
        let payer = SolanaIdentity::new(Keypair::new());
        let mint = unique();
        let ledger =
            MockLedger::default().with_account(mint, mint_account(unique(), 6));
        let err = sign_payment(
            &payer,
            &ledger,
            &quote(&unique(), Some(&unique()), Some(&mint)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SolanaExactError::Mint { .. }));
    }

    #[tokio::test]
    async fn test_defaults_to_usdc_mint() {
        let payer = SolanaIdentity::new(Keypair::new());
        let usdc = usdc_deployment(&ChainId::new("solana", SOLANA_DEVNET_REFERENCE)).unwrap();
        let ledger = MockLedger::default()
            .with_account(*usdc.address.pubkey(), mint_account(spl_token::id(), 6));
        let proof = sign_payment(
            &payer,
            &ledger,
            &quote(&unique(), Some(&unique()), None),
        )
        .await
        .unwrap();
        let (_, tx) = decode(&proof);
        assert!(tx.message.static_account_keys().contains(usdc.address.pubkey()));
    }
}
