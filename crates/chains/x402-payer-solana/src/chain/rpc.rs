use async_trait::async_trait;
use solana_account::Account;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_response::RpcPrioritizationFee;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use std::sync::Arc;

/// The ledger reads a payer needs: mint and token accounts, the latest blockhash and
/// recent priority fees.
///
/// `get_account` answers `Ok(None)` for an account that does not exist; `Err` is
/// reserved for the RPC itself failing.
///
/// Object safe, so a client can hold `Arc<dyn RpcClientLike>` and tests can swap in
/// an in-memory ledger.
#[async_trait]
pub trait RpcClientLike: Send + Sync {
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, ClientError>;
    async fn get_recent_prioritization_fees(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<RpcPrioritizationFee>, ClientError>;
    async fn get_latest_blockhash(&self) -> Result<Hash, ClientError>;
}

#[async_trait]
impl RpcClientLike for RpcClient {
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, ClientError> {
        let response = self.get_account_with_commitment(pubkey, self.commitment()).await?;
        Ok(response.value)
    }

    async fn get_recent_prioritization_fees(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<RpcPrioritizationFee>, ClientError> {
        RpcClient::get_recent_prioritization_fees(self, addresses).await
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ClientError> {
        RpcClient::get_latest_blockhash(self).await
    }
}

#[async_trait]
impl<T: RpcClientLike + ?Sized> RpcClientLike for Arc<T> {
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, ClientError> {
        self.as_ref().get_account(pubkey).await
    }

    async fn get_recent_prioritization_fees(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<RpcPrioritizationFee>, ClientError> {
        self.as_ref().get_recent_prioritization_fees(addresses).await
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ClientError> {
        self.as_ref().get_latest_blockhash().await
    }
}
