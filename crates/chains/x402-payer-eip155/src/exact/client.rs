//! Payer-side signing of EVM "exact" payments.
//!
//! Nothing is broadcast here: the payer signs an authorization and the server
//! presents it to the token contract.

use alloy_primitives::{Address, FixedBytes, U256};
use alloy_sol_types::{SolStruct, eip712_domain};
use rand::{Rng, rng};
use std::str::FromStr;
use x402_payer_types::proto::{PaymentEnvelope, PaymentProof, Quote};
use x402_payer_types::timestamp::UnixTimestamp;

use crate::chain::{TokenDeploymentEip712, chain_reference, usdc_deployment};
use crate::exact::{ExactEvmPayload, ExactEvmPayloadAuthorization, TransferWithAuthorization};
use crate::identity::{EvmIdentity, SignerLike};

/// How far `validAfter` is set in the past, to absorb clock skew between payer
/// and verifier.
pub const VALID_AFTER_SKEW_SECONDS: u64 = 10 * 60;

#[derive(Debug, thiserror::Error)]
pub enum Eip155ExactError {
    #[error("Chain {0} has no numeric EIP-155 reference")]
    InvalidChain(String),
    #[error("Invalid {field} address {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("Quote names no token contract and {0} has no known USDC deployment")]
    UnknownAsset(String),
    #[error("No EIP-712 domain name and version for token {0}")]
    MissingDomain(Address),
    #[error("Failed to sign authorization: {0}")]
    Sign(String),
    #[error("Failed to encode payment: {0}")]
    Encode(String),
}

/// EIP-712 signing parameters of one ERC-3009 authorization.
#[derive(Debug, Clone)]
pub struct Eip3009SigningParams {
    /// The EIP-155 chain ID (numeric)
    pub chain_id: u64,
    /// The token contract, also the EIP-712 verifying contract
    pub asset_address: Address,
    pub pay_to: Address,
    pub amount: U256,
    /// Length of the validity window from now
    pub max_timeout_seconds: u64,
    pub domain: TokenDeploymentEip712,
}

/// Signs an ERC-3009 `TransferWithAuthorization` with EIP-712.
///
/// `validAfter` lies [`VALID_AFTER_SKEW_SECONDS`] in the past, `validBefore`
/// `max_timeout_seconds` in the future, and the nonce is 32 fresh random bytes.
pub async fn sign_erc3009_authorization<S: SignerLike + Sync + ?Sized>(
    signer: &S,
    params: &Eip3009SigningParams,
) -> Result<ExactEvmPayload, Eip155ExactError> {
    let domain = eip712_domain! {
        name: params.domain.name.clone(),
        version: params.domain.version.clone(),
        chain_id: params.chain_id,
        verifying_contract: params.asset_address,
    };

    let now = UnixTimestamp::now();
    let nonce: [u8; 32] = rng().random();
    let authorization = ExactEvmPayloadAuthorization {
        from: signer.address(),
        to: params.pay_to,
        value: params.amount,
        valid_after: now.saturating_sub(VALID_AFTER_SKEW_SECONDS),
        valid_before: now + params.max_timeout_seconds.max(1),
        nonce: FixedBytes(nonce),
    };

    let eip712_hash = TransferWithAuthorization::from(&authorization).eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash(&eip712_hash)
        .await
        .map_err(|e| Eip155ExactError::Sign(format!("{e:?}")))?;

    Ok(ExactEvmPayload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

/// Builds the payment proof for a quote on an EVM chain.
///
/// The token is the quote's `asset`, or USDC on the quoted chain. The EIP-712 domain
/// comes from the quote's `extra`, or from the known deployment of that token.
/// The proof carries no settlement reference: the transaction hash only exists once
/// the server settles.
pub async fn sign_payment(
    identity: &EvmIdentity,
    quote: &Quote,
) -> Result<PaymentProof, Eip155ExactError> {
    let chain_id = chain_reference(&quote.chain)
        .ok_or_else(|| Eip155ExactError::InvalidChain(quote.chain.to_string()))?;
    let pay_to = parse_address("recipient", &quote.recipient)?;
    let known_usdc = usdc_deployment(&quote.chain);
    let asset_address = match quote.asset.as_deref() {
        Some(asset) => parse_address("asset", asset)?,
        None => known_usdc
            .as_ref()
            .map(|usdc| usdc.address)
            .ok_or_else(|| Eip155ExactError::UnknownAsset(quote.chain.to_string()))?,
    };
    let quoted_domain = quote.extra.as_ref().and_then(|extra| {
        Some(TokenDeploymentEip712 {
            name: extra.name.clone()?,
            version: extra.version.clone()?,
        })
    });
    let domain = quoted_domain
        .or_else(|| {
            known_usdc
                .filter(|usdc| usdc.address == asset_address)
                .and_then(|usdc| usdc.eip712)
        })
        .ok_or(Eip155ExactError::MissingDomain(asset_address))?;

    let params = Eip3009SigningParams {
        chain_id,
        asset_address,
        pay_to,
        amount: U256::from(quote.amount.atomic),
        max_timeout_seconds: quote.max_timeout_seconds,
        domain,
    };
    let payload = sign_erc3009_authorization(identity, &params).await?;
    tracing::debug!(
        from = %payload.authorization.from,
        to = %payload.authorization.to,
        valid_before = %payload.authorization.valid_before,
        "Signed transfer authorization"
    );

    let envelope = PaymentEnvelope::new(quote.scheme.clone(), quote.network.clone(), payload);
    let header_value = envelope
        .to_header_value()
        .map_err(|e| Eip155ExactError::Encode(e.to_string()))?;

    Ok(PaymentProof {
        scheme: quote.scheme.clone(),
        chain: quote.chain.clone(),
        family: quote.family,
        payer: identity.address().to_string(),
        header_value,
        settlement_reference: None,
    })
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, Eip155ExactError> {
    Address::from_str(value.trim()).map_err(|_| Eip155ExactError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Signature;
    use alloy_signer_local::PrivateKeySigner;
    use alloy_sol_types::Eip712Domain;
    use x402_payer_types::chain::{ChainFamily, ChainId};
    use x402_payer_types::proto::{DEFAULT_SCHEME, PriceOptionExtra};
    use x402_payer_types::util::{Base64Bytes, NormalizedAmount};

    const RECIPIENT: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn quote(asset: Option<&str>, extra: Option<PriceOptionExtra>) -> Quote {
        Quote {
            chain: ChainId::new("eip155", "84532"),
            family: ChainFamily::Evm,
            network: "base-sepolia".to_string(),
            recipient: RECIPIENT.to_string(),
            amount: NormalizedAmount::from_atomic(30_000),
            scheme: DEFAULT_SCHEME.to_string(),
            sponsor: None,
            resource: None,
            asset: asset.map(str::to_string),
            max_timeout_seconds: 120,
            extra,
        }
    }

    fn decode(proof: &PaymentProof) -> PaymentEnvelope<ExactEvmPayload> {
        Base64Bytes::from(proof.header_value.as_bytes())
            .decode_json()
            .unwrap()
    }

    fn recover(payload: &ExactEvmPayload, domain: &Eip712Domain) -> Address {
        let hash = TransferWithAuthorization::from(&payload.authorization).eip712_signing_hash(domain);
        let signature = Signature::try_from(payload.signature.as_ref()).unwrap();
        signature.recover_address_from_prehash(&hash).unwrap()
    }

    #[tokio::test]
    async fn test_validity_window() {
        let identity = EvmIdentity::new(PrivateKeySigner::random());
        let before = UnixTimestamp::now();
        let proof = sign_payment(&identity, &quote(None, None)).await.unwrap();
        let after = UnixTimestamp::now();

        let authorization = decode(&proof).payload.authorization;
        assert!(authorization.valid_after.as_secs() + 60 <= before.as_secs());
        assert!(authorization.valid_before > after);
        assert!(authorization.valid_before.as_secs() >= before.as_secs() + 120);
        assert!(authorization.valid_before.as_secs() <= after.as_secs() + 120);
    }

    #[tokio::test]
    async fn test_signature_recovers_payer_with_known_usdc_domain() {
        let identity = EvmIdentity::new(PrivateKeySigner::random());
        let proof = sign_payment(&identity, &quote(None, None)).await.unwrap();
        assert!(proof.settlement_reference.is_none());
        assert_eq!(proof.payer, identity.address().to_string());

        let envelope = decode(&proof);
        assert_eq!(envelope.chain, "base-sepolia");
        assert_eq!(envelope.scheme, "exact");
        let payload = envelope.payload;
        assert_eq!(payload.authorization.from, identity.address());
        assert_eq!(payload.authorization.to, Address::from_str(RECIPIENT).unwrap());
        assert_eq!(payload.authorization.value, U256::from(30_000u64));

        let usdc = usdc_deployment(&ChainId::new("eip155", "84532")).unwrap();
        let domain = eip712_domain! {
            name: "USDC".to_string(),
            version: "2".to_string(),
            chain_id: 84532,
            verifying_contract: usdc.address,
        };
        assert_eq!(recover(&payload, &domain), identity.address());
    }

    #[tokio::test]
    async fn test_quoted_domain_wins() {
        let identity = EvmIdentity::new(PrivateKeySigner::random());
        let asset = "0x1111111111111111111111111111111111111111";
        let extra = PriceOptionExtra {
            name: Some("Token".to_string()),
            version: Some("1".to_string()),
            fee_payer: None,
        };
        let proof = sign_payment(&identity, &quote(Some(asset), Some(extra)))
            .await
            .unwrap();
        let domain = eip712_domain! {
            name: "Token".to_string(),
            version: "1".to_string(),
            chain_id: 84532,
            verifying_contract: Address::from_str(asset).unwrap(),
        };
        assert_eq!(recover(&decode(&proof).payload, &domain), identity.address());
    }

    #[tokio::test]
    async fn test_unknown_token_without_domain() {
        let identity = EvmIdentity::new(PrivateKeySigner::random());
        let err = sign_payment(
            &identity,
            &quote(Some("0x1111111111111111111111111111111111111111"), None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Eip155ExactError::MissingDomain(_)));
    }

    #[tokio::test]
    async fn test_wire_shape() {
        let identity = EvmIdentity::new(PrivateKeySigner::random());
        let proof = sign_payment(&identity, &quote(None, None)).await.unwrap();
        let json: serde_json::Value = Base64Bytes::from(proof.header_value.as_bytes())
            .decode_json()
            .unwrap();
        let authorization = &json["payload"]["authorization"];
        assert_eq!(json["x402Version"], 1);
        assert_eq!(authorization["value"], "30000");
        assert!(authorization["validAfter"].is_string());
        assert_eq!(authorization["nonce"].as_str().unwrap().len(), 66);
        assert!(json["payload"]["signature"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn test_fresh_nonce_per_proof() {
        let identity = EvmIdentity::new(PrivateKeySigner::random());
        let first = decode(&sign_payment(&identity, &quote(None, None)).await.unwrap());
        let second = decode(&sign_payment(&identity, &quote(None, None)).await.unwrap());
        assert_ne!(first.payload.authorization.nonce, second.payload.authorization.nonce);
    }
}
