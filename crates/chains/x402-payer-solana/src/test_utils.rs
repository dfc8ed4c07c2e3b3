//! An in-memory ledger implementing [`RpcClientLike`], for tests.

use async_trait::async_trait;
use solana_account::Account;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_response::RpcPrioritizationFee;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use spl_token::solana_program::program_option::COption;
use spl_token::solana_program::program_pack::Pack;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::chain::rpc::RpcClientLike;

#[derive(Default)]
pub struct MockLedger {
    accounts: HashMap<Pubkey, Account>,
    fees: Vec<u64>,
    calls: AtomicUsize,
    failing: HashSet<Pubkey>,
}

impl MockLedger {
    pub fn with_account(mut self, pubkey: Pubkey, account: Account) -> Self {
        self.accounts.insert(pubkey, account);
        self
    }

    pub fn with_fees(mut self, fees: &[u64]) -> Self {
        self.fees = fees.to_vec();
        self
    }

    /// Reads of `pubkey` fail as if the node were unreachable.
    pub fn with_failing_account(mut self, pubkey: Pubkey) -> Self {
        self.failing.insert(pubkey);
        self
    }

    /// Number of RPC calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcClientLike for MockLedger {
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(pubkey) {
            return Err(ClientErrorKind::Custom("connection refused".to_string()).into());
        }
        Ok(self.accounts.get(pubkey).cloned())
    }

    async fn get_recent_prioritization_fees(
        &self,
        _addresses: &[Pubkey],
    ) -> Result<Vec<RpcPrioritizationFee>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .fees
            .iter()
            .enumerate()
            .map(|(slot, fee)| RpcPrioritizationFee {
                slot: slot as u64,
                prioritization_fee: *fee,
            })
            .collect())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Hash::new_from_array([42u8; 32]))
    }
}

/// An initialized mint account owned by `token_program`.
pub fn mint_account(token_program: Pubkey, decimals: u8) -> Account {
    let mint = spl_token::state::Mint {
        mint_authority: COption::None,
        supply: 1_000_000_000_000,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let mut data = vec![0u8; spl_token::state::Mint::LEN];
    spl_token::state::Mint::pack(mint, &mut data).unwrap();
    Account {
        lamports: 1_461_600,
        data,
        owner: token_program,
        executable: false,
        rent_epoch: 0,
    }
}

/// An initialized classic token account holding `amount` of `mint`.
pub fn token_account(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Account {
    let account = spl_token::state::Account {
        mint: *mint,
        owner: *owner,
        amount,
        delegate: COption::None,
        state: spl_token::state::AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; spl_token::state::Account::LEN];
    spl_token::state::Account::pack(account, &mut data).unwrap();
    Account {
        lamports: 2_039_280,
        data,
        owner: spl_token::id(),
        executable: false,
        rent_epoch: 0,
    }
}
