//! The "exact" scheme on Solana: a sponsored SPL `TransferChecked` transaction,
//! signed by the payer and completed by the fee payer on the server side.

pub mod client;

use serde::{Deserialize, Serialize};
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use x402_payer_types::util::Base64Bytes;

/// SPL Memo program, used to make otherwise identical transfers distinct.
pub static MEMO_PROGRAM_PUBKEY: Pubkey = pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// Associated Token Account program.
pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Payload of a Solana payment envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSolanaPayload {
    /// Base64 of the bincode-serialized, partially signed versioned transaction.
    pub transaction: String,
    /// Base58 signature of the payer; the transaction id once the fee payer lands it.
    pub signature: String,
}

/// The associated token account of `owner` for `mint` under `token_program`.
pub fn associated_token_address(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

pub struct PartialTransaction {
    inner: VersionedTransaction,
}

impl PartialTransaction {
    pub fn new(transaction: VersionedTransaction) -> Self {
        Self { inner: transaction }
    }

    pub fn inner(&self) -> &VersionedTransaction {
        &self.inner
    }

    /// Signs the message with `signer`, placing the signature at the signer's slot
    /// among the required signers. Other slots are left for their owners to fill.
    pub fn sign_with_keypair<S: Signer + ?Sized>(
        self,
        signer: &S,
    ) -> Result<Self, TransactionSignError> {
        let mut tx = self.inner;
        let msg_bytes = tx.message.serialize();
        let signature = signer
            .try_sign_message(msg_bytes.as_slice())
            .map_err(|e| TransactionSignError(format!("{e}")))?;

        let pos = Self::signer_position(&tx, &signer.pubkey()).ok_or(TransactionSignError(
            "Signer not found in required signers".to_string(),
        ))?;

        let num_required = tx.message.header().num_required_signatures as usize;
        if tx.signatures.len() < num_required {
            tx.signatures.resize(num_required, Signature::default());
        }
        tx.signatures[pos] = signature;
        Ok(Self { inner: tx })
    }

    /// The signature placed for `pubkey`, if it is a required signer and has signed.
    pub fn signature_of(&self, pubkey: &Pubkey) -> Option<Signature> {
        let pos = Self::signer_position(&self.inner, pubkey)?;
        self.inner
            .signatures
            .get(pos)
            .copied()
            .filter(|s| *s != Signature::default())
    }

    fn signer_position(tx: &VersionedTransaction, pubkey: &Pubkey) -> Option<usize> {
        let num_required = tx.message.header().num_required_signatures as usize;
        tx.message
            .static_account_keys()
            .iter()
            .take(num_required)
            .position(|k| k == pubkey)
    }

    pub fn as_base64(&self) -> Result<String, TransactionToB64Error> {
        let bytes =
            bincode::serialize(&self.inner).map_err(|e| TransactionToB64Error(format!("{e}")))?;
        Ok(Base64Bytes::encode(bytes).to_string())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Can not encode transaction to base64: {0}")]
pub struct TransactionToB64Error(String);

#[derive(Debug, thiserror::Error)]
#[error("Can not sign transaction: {0}")]
pub struct TransactionSignError(pub String);
