use async_trait::async_trait;

use crate::{
    account::{Account, AccountId},
    repository::{AccountError, AccountRepository},
    sqlite::AccountRow,
};

/// MySQL-backed account store (the production `rhea_logindb`).
pub struct MySqlAccountRepository {
    pool: sqlx::MySqlPool,
}

impl MySqlAccountRepository {
    pub fn new(pool: sqlx::MySqlPool) -> Self {
        Self { pool }
    }

    /// Create the `accounts` table if it doesn't exist.
    pub async fn init(pool: &sqlx::MySqlPool) -> Result<(), AccountError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS accounts (
                account_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                username   VARCHAR(64) NOT NULL UNIQUE,
                password   VARCHAR(64) NOT NULL,
                state      INT NOT NULL DEFAULT 0,
                ban_expiry DATETIME NULL,
                sex        CHAR(1) NOT NULL DEFAULT 'F'
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for MySqlAccountRepository {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT account_id, username, password, state, ban_expiry, sex
             FROM accounts WHERE username = ? LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Account::try_from).transpose()
    }

    async fn clear_ban(&self, account_id: AccountId) -> Result<(), AccountError> {
        sqlx::query("UPDATE accounts SET ban_expiry = NULL WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
