//! EVM chain references and well-known USDC deployments.

pub mod erc20;

use alloy_primitives::{Address, address};
use x402_payer_types::chain::{ChainId, EIP155_NAMESPACE};
use x402_payer_types::networks::USDC;

/// The numeric EIP-155 chain id of a CAIP-2 `eip155:<id>` chain.
///
/// ```
/// use x402_payer_eip155::chain::chain_reference;
/// use x402_payer_types::chain::ChainId;
///
/// assert_eq!(chain_reference(&ChainId::new("eip155", "8453")), Some(8453));
/// assert_eq!(chain_reference(&ChainId::new("solana", "8453")), None);
/// ```
pub fn chain_reference(chain_id: &ChainId) -> Option<u64> {
    if chain_id.namespace != EIP155_NAMESPACE {
        return None;
    }
    chain_id.reference.parse().ok()
}

/// EIP-712 domain name and version of a token contract.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TokenDeploymentEip712 {
    pub name: String,
    pub version: String,
}

/// An ERC-20 token on a specific EVM chain.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Eip155TokenDeployment {
    pub chain_reference: u64,
    pub address: Address,
    pub decimals: u8,
    /// Present for tokens that implement ERC-3009.
    pub eip712: Option<TokenDeploymentEip712>,
}

const USDC_DEPLOYMENTS: &[(u64, Address, &str)] = &[
    (8453, address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"), "USD Coin"),
    (84532, address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"), "USDC"),
    (137, address!("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"), "USDC"),
    (80002, address!("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"), "USDC"),
    (43114, address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"), "USD Coin"),
    (43113, address!("0x5425890298aed601595a70AB815c96711a31Bc65"), "USD Coin"),
    (1329, address!("0xe15fC38F6D8c56aF07bbCBe3BAf5708A2Bf42392"), "USDC"),
    (1328, address!("0x4fCF1784B31630811181f670Aea7A7bEF803eaED"), "USDC"),
    (42220, address!("0xcebA9300f2b948710d2653dD7B07f33A8B32118C"), "USDC"),
];

/// USDC on the given EVM chain, if it is a known network.
pub fn usdc_deployment(chain_id: &ChainId) -> Option<Eip155TokenDeployment> {
    let reference = chain_reference(chain_id)?;
    USDC_DEPLOYMENTS
        .iter()
        .find(|(chain, _, _)| *chain == reference)
        .map(|(chain, address, name)| Eip155TokenDeployment {
            chain_reference: *chain,
            address: *address,
            decimals: USDC::DECIMALS as u8,
            eip712: Some(TokenDeploymentEip712 {
                name: name.to_string(),
                version: "2".to_string(),
            }),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_evm_network_has_usdc() {
        for network in x402_payer_types::networks::KNOWN_NETWORKS
            .iter()
            .filter(|n| n.namespace == EIP155_NAMESPACE)
        {
            assert!(
                usdc_deployment(&network.chain_id()).is_some(),
                "no USDC on {}",
                network.name
            );
        }
    }

    #[test]
    fn test_base_domain() {
        let usdc = usdc_deployment(&ChainId::new("eip155", "8453")).unwrap();
        let eip712 = usdc.eip712.unwrap();
        assert_eq!(eip712.name, "USD Coin");
        assert_eq!(eip712.version, "2");
        assert!(usdc_deployment(&ChainId::new("eip155", "1")).is_none());
    }
}
