use alloy_primitives::{Address, U256};
use alloy_provider::ProviderBuilder;
use alloy_sol_types::sol;
use url::Url;

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
);

#[derive(Debug, thiserror::Error)]
#[error("ERC-20 balance query failed: {0}")]
pub struct BalanceError(String);

/// `balanceOf(owner)` on `token`, read over the JSON-RPC endpoint at `rpc_url`.
pub async fn token_balance(rpc_url: &Url, token: Address, owner: Address) -> Result<U256, BalanceError> {
    let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
    let contract = IERC20::new(token, &provider);
    contract
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| BalanceError(e.to_string()))
}
