//! Account store access and the authentication decision procedure.
//!
//! The store is reached only through [`AccountRepository`], so the
//! [`Authenticator`] runs unchanged against MySQL, SQLite or the in-memory
//! repository used in tests.

pub mod account;
pub mod authenticator;
pub mod memory;
pub mod mysql;
pub mod repository;
pub mod sqlite;
pub mod store;

pub use {
    account::{Account, AccountId},
    authenticator::{AuthFailure, AuthOutcome, AuthPolicy, Authenticator},
    memory::MemoryAccountRepository,
    mysql::MySqlAccountRepository,
    repository::{AccountError, AccountRepository},
    sqlite::SqliteAccountRepository,
    store::connect,
};
