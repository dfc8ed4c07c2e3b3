use serde::{Deserialize, Serialize};

use crate::chain::{ChainFamily, ChainId};
use crate::proto::X402_VERSION;
use crate::util::Base64Bytes;

/// The JSON object carried, base64 encoded, in the `X-Payment` header.
///
/// ```json
/// {"x402Version": 1, "scheme": "exact", "chain": "solana-devnet", "payload": {...}}
/// ```
///
/// `payload` is family specific: a signed transaction for account-model chains,
/// a signed transfer authorization for EVM chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEnvelope<P> {
    pub x402_version: u8,
    pub scheme: String,
    #[serde(alias = "network")]
    pub chain: String,
    pub payload: P,
}

impl<P> PaymentEnvelope<P> {
    pub fn new(scheme: impl Into<String>, chain: impl Into<String>, payload: P) -> Self {
        Self {
            x402_version: X402_VERSION,
            scheme: scheme.into(),
            chain: chain.into(),
            payload,
        }
    }
}

impl<P: Serialize> PaymentEnvelope<P> {
    /// The header value: base64 of the JSON envelope.
    pub fn to_header_value(&self) -> Result<String, serde_json::Error> {
        Base64Bytes::encode_json(self).map(|b| b.to_string())
    }
}

/// A signed, ready-to-send payment for one quote.
///
/// A proof authorizes exactly one transfer and is consumed by the request that carries it.
#[derive(Debug)]
pub struct PaymentProof {
    pub scheme: String,
    pub chain: ChainId,
    pub family: ChainFamily,
    /// Address of the paying wallet.
    pub payer: String,
    /// Base64 envelope, the exact value of the `X-Payment` header.
    pub header_value: String,
    /// Settlement reference known before settlement (the transaction signature on
    /// account-model chains). EVM authorizations have none until the server settles.
    pub settlement_reference: Option<String>,
}

impl PaymentProof {
    pub fn header_value(&self) -> &str {
        &self.header_value
    }
}
