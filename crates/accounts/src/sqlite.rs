use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    rhea_protocol::Sex,
};

use crate::{
    account::{Account, AccountId},
    repository::{AccountError, AccountRepository},
};

/// SQLite-backed account store, for local deployments and tests.
pub struct SqliteAccountRepository {
    pool: sqlx::SqlitePool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct AccountRow {
    pub account_id: i64,
    pub username: String,
    pub password: String,
    pub state: i32,
    pub ban_expiry: Option<DateTime<Utc>>,
    pub sex: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = AccountError;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        let sex = r
            .sex
            .chars()
            .next()
            .and_then(Sex::from_char)
            .ok_or_else(|| AccountError::InvalidSex {
                account_id: r.account_id,
                code: r.sex.clone(),
            })?;
        Ok(Self {
            account_id: r.account_id,
            username: r.username,
            password: r.password,
            state: r.state,
            ban_expiry: r.ban_expiry,
            sex,
        })
    }
}

impl SqliteAccountRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `accounts` table if it doesn't exist.
    pub async fn init(pool: &sqlx::SqlitePool) -> Result<(), AccountError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS accounts (
                account_id INTEGER PRIMARY KEY AUTOINCREMENT,
                username   TEXT NOT NULL UNIQUE,
                password   TEXT NOT NULL,
                state      INTEGER NOT NULL DEFAULT 0,
                ban_expiry TEXT,
                sex        TEXT NOT NULL DEFAULT 'F'
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert an account record. Store-side tooling only; the gateway
    /// itself never creates accounts.
    pub async fn insert(&self, account: &Account) -> Result<(), AccountError> {
        sqlx::query(
            r#"INSERT INTO accounts (account_id, username, password, state, ban_expiry, sex)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(account.account_id)
        .bind(&account.username)
        .bind(&account.password)
        .bind(account.state)
        .bind(account.ban_expiry)
        .bind(account.sex.as_char().to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    fn backend(&self) -> &'static str {
        "sqlite"
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
