//! The "exact" scheme on EVM chains: an ERC-3009 `transferWithAuthorization`
//! signed off-chain with EIP-712 and settled by the server.

pub mod client;

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use x402_payer_types::timestamp::UnixTimestamp;

/// Payload of an EVM payment envelope: the signature and the struct it signs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: Bytes,
    pub authorization: ExactEvmPayloadAuthorization,
}

/// Who may move how many tokens to whom, and when.
#[serde_as]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayloadAuthorization {
    pub from: Address,
    pub to: Address,
    /// Atomic units, as a decimal string on the wire.
    #[serde_as(as = "DisplayFromStr")]
    pub value: U256,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

sol!(
    /// ERC-3009 `TransferWithAuthorization` as typed data.
    ///
    /// The verifier rebuilds this struct from [`ExactEvmPayloadAuthorization`], so the
    /// two must agree field for field.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

impl From<&ExactEvmPayloadAuthorization> for TransferWithAuthorization {
    fn from(authorization: &ExactEvmPayloadAuthorization) -> Self {
        TransferWithAuthorization {
            from: authorization.from,
            to: authorization.to,
            value: authorization.value,
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        }
    }
}
