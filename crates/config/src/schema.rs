//! Config schema. Section and field names form the dotted keys operators
//! already know (`inter.uri`, `network.interface.port`, `database.dbname`).

use std::net::{IpAddr, Ipv4Addr};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RheaConfig {
    pub inter: InterConfig,
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub status: StatusConfig,
}

/// Inter-server registration endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterConfig {
    /// Base address shard processes connect to, e.g. `net.tcp://localhost:5401/`.
    pub uri: String,
}

impl Default for InterConfig {
    fn default() -> Self {
        Self {
            uri: "net.tcp://localhost:5401/".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub interface: InterfaceConfig,
}

/// Client-facing listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5500,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Mysql,
    Sqlite,
}

impl std::fmt::Display for DatabaseDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DatabaseDriver::Mysql => "mysql",
            DatabaseDriver::Sqlite => "sqlite",
        })
    }
}

/// Account store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub driver: DatabaseDriver,
    pub server: String,
    pub port: u16,
    /// Database name; for `sqlite` this is the file path (or `:memory:`).
    pub dbname: String,
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: Secret<String>,
    /// Upper bound on pooled store connections.
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::Mysql,
            server: "127.0.0.1".into(),
            port: 3306,
            dbname: "rhea_logindb".into(),
            username: "rhea".into(),
            password: Secret::new("rhea".into()),
            max_connections: 8,
            connect_timeout_secs: 5,
        }
    }
}

/// Authentication policy knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Clients reporting a lower version are refused. 0 disables the check.
    pub min_client_version: u32,
}

/// Optional HTTP status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5480,
        }
    }
}

fn serialize_secret<S: Serializer>(secret: &Secret<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(secret.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_keys() {
        let cfg = RheaConfig::default();
        assert_eq!(cfg.inter.uri, "net.tcp://localhost:5401/");
        assert_eq!(cfg.network.interface.ip.to_string(), "0.0.0.0");
        assert_eq!(cfg.network.interface.port, 5500);
        assert_eq!(cfg.database.server, "127.0.0.1");
        assert_eq!(cfg.database.dbname, "rhea_logindb");
        assert_eq!(cfg.database.username, "rhea");
        assert_eq!(cfg.database.password.expose_secret(), "rhea");
        assert_eq!(cfg.auth.min_client_version, 0);
        assert!(!cfg.status.enabled);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: RheaConfig = toml::from_str(
            r#"
            [network.interface]
            port = 6900

            [database]
            driver = "sqlite"
            dbname = ":memory:"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network.interface.port, 6900);
        assert_eq!(cfg.network.interface.ip.to_string(), "0.0.0.0");
        assert_eq!(cfg.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(cfg.database.dbname, ":memory:");
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.inter.uri, "net.tcp://localhost:5401/");
    }

    #[test]
    fn password_serializes_in_clear() {
        let raw = toml::to_string(&RheaConfig::default()).unwrap();
        assert!(raw.contains("password = \"rhea\""));
    }
}
