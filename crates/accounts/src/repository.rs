use async_trait::async_trait;

use crate::account::{Account, AccountId};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("account store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("account {account_id} has invalid sex code {code:?}")]
    InvalidSex { account_id: AccountId, code: String },
}

/// Query/update contract of the persisted account store.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Short backend name for logs (`mysql`, `sqlite`, `memory`).
    fn backend(&self) -> &'static str;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError>;

    /// Drop the ban expiry of `account_id` and persist the change.
    ///
    /// Clearing an account that has no ban, or does not exist, is not an error.
    async fn clear_ban(&self, account_id: AccountId) -> Result<(), AccountError>;

    /// Release pooled connections. Called once at shutdown.
    async fn close(&self) {}
}
