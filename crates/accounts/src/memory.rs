use std::collections::HashMap;

use {async_trait::async_trait, tokio::sync::RwLock};

use crate::{
    account::{Account, AccountId},
    repository::{AccountError, AccountRepository},
};

/// Process-local account store, keyed by username.
#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|a| (a.username.clone(), a))
            .collect();
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    pub async fn get(&self, username: &str) -> Option<Account> {
        self.accounts.read().await.get(username).cloned()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.get(username).await)
    }

    async fn clear_ban(&self, account_id: AccountId) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.values_mut().find(|a| a.account_id == account_id) {
            account.ban_expiry = None;
        }
        Ok(())
    }
}
