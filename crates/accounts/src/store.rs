use std::{sync::Arc, time::Duration};

use {
    rhea_config::{DatabaseConfig, DatabaseDriver},
    secrecy::ExposeSecret,
    sqlx::{
        mysql::{MySqlConnectOptions, MySqlPoolOptions},
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::debug,
};

use crate::{
    mysql::MySqlAccountRepository,
    repository::{AccountError, AccountRepository},
    sqlite::SqliteAccountRepository,
};

/// Open a pooled connection to the configured account store.
///
/// The first connection is established eagerly so an unreachable store is
/// reported here rather than on the first login.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn AccountRepository>, AccountError> {
    let timeout = Duration::from_secs(config.connect_timeout_secs);
    match config.driver {
        DatabaseDriver::Mysql => {
            debug!(
                server = %config.server,
                port = config.port,
                dbname = %config.dbname,
                "connecting to mysql account store"
            );
            let options = MySqlConnectOptions::new()
                .host(&config.server)
                .port(config.port)
                .database(&config.dbname)
                .username(&config.username)
                .password(config.password.expose_secret());
            let pool = MySqlPoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .acquire_timeout(timeout)
                .connect_with(options)
                .await?;
            MySqlAccountRepository::init(&pool).await?;
            Ok(Arc::new(MySqlAccountRepository::new(pool)))
        },
        DatabaseDriver::Sqlite => {
            debug!(path = %config.dbname, "opening sqlite account store");
            let in_memory = config.dbname == ":memory:";
            let options = if in_memory {
                SqliteConnectOptions::new().in_memory(true)
            } else {
                SqliteConnectOptions::new()
                    .filename(&config.dbname)
                    .create_if_missing(true)
            };
            // A second `:memory:` connection would see an empty database.
            let max = if in_memory {
                1
            } else {
                config.max_connections.max(1)
            };
            let pool = SqlitePoolOptions::new()
                .max_connections(max)
                .acquire_timeout(timeout)
                .connect_with(options)
                .await?;
            SqliteAccountRepository::init(&pool).await?;
            Ok(Arc::new(SqliteAccountRepository::new(pool)))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_config(dbname: String) -> DatabaseConfig {
        DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            dbname,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sqlite_file_store_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logindb.sqlite");
        let repo = connect(&sqlite_config(path.display().to_string()))
            .await
            .unwrap();
        assert_eq!(repo.backend(), "sqlite");
        assert!(repo.find_by_username("alice").await.unwrap().is_none());
        repo.close().await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn sqlite_memory_store() {
        let repo = connect(&sqlite_config(":memory:".into())).await.unwrap();
        assert!(repo.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_mysql_fails_fast() {
        let config = DatabaseConfig {
            server: "127.0.0.1".into(),
            // Reserved port; nothing listens there.
            port: 1,
            connect_timeout_secs: 1,
            ..Default::default()
        };
        assert!(matches!(connect(&config).await, Err(AccountError::Store(_))));
    }
}
