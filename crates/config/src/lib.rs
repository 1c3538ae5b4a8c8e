//! Account gateway configuration: schema with defaults, discovery and loading.
//!
//! Every key has a default, so a missing file or key is never an error.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        discover_and_load, discover_config_file, find_config_file, load_config, lookup,
    },
    schema::{
        AuthConfig, DatabaseConfig, DatabaseDriver, InterConfig, InterfaceConfig, NetworkConfig,
        RheaConfig, StatusConfig,
    },
};
