//! Token balance of a wallet, read from its associated token account.

use solana_pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use spl_token_2022::extension::StateWithExtensions;

use crate::chain::Address;
use crate::chain::rpc::RpcClientLike;
use crate::exact::associated_token_address;
use crate::exact::client::{Mint, SolanaExactError, fetch_mint};

/// A token amount together with the mint's decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub amount: u64,
    pub decimals: u8,
}

/// Balance of `owner` in `mint`. A wallet without a token account holds zero.
pub async fn token_balance<R: RpcClientLike + ?Sized>(
    rpc_client: &R,
    owner: &Pubkey,
    mint: &Address,
) -> Result<TokenBalance, SolanaExactError> {
    let mint_info = fetch_mint(mint, rpc_client).await?;
    let ata = associated_token_address(owner, mint_info.token_program(), mint.pubkey());
    let account = rpc_client
        .get_account(&ata)
        .await
        .map_err(|e| SolanaExactError::Rpc(e.to_string()))?;
    let Some(account) = account else {
        return Ok(TokenBalance {
            amount: 0,
            decimals: mint_info.decimals(),
        });
    };
    let amount = match mint_info {
        Mint::Token { .. } => spl_token::state::Account::unpack(&account.data)
            .map(|a| a.amount)
            .map_err(|e| SolanaExactError::Rpc(format!("token account {ata}: {e}")))?,
        Mint::Token2022 { .. } => {
            StateWithExtensions::<spl_token_2022::state::Account>::unpack(&account.data)
                .map(|a| a.base.amount)
                .map_err(|e| SolanaExactError::Rpc(format!("token account {ata}: {e}")))?
        }
    };
    Ok(TokenBalance {
        amount,
        decimals: mint_info.decimals(),
    })
}
