use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    clap::{Subcommand, ValueEnum},
    rhea_config::RheaConfig,
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one key of the effective config (defaults applied).
    Get {
        /// Dotted key, e.g. `network.interface.port`.
        key: String,
    },
    /// Print the whole effective config.
    Show {
        #[arg(long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },
    /// Print the path of the config file in use.
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

pub fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = rhea_config::discover_and_load(config_path);
            println!("{}", get(&config, &key)?);
        },
        ConfigAction::Show { format } => {
            let config = rhea_config::discover_and_load(config_path);
            print!("{}", render(&config, format)?);
        },
        ConfigAction::Path => match resolve_path(config_path) {
            Some(path) => println!("{}", path.display()),
            None => println!("(none, using defaults)"),
        },
    }
    Ok(())
}

fn get(config: &RheaConfig, key: &str) -> Result<String> {
    let Some(value) = rhea_config::lookup(config, key)? else {
        bail!("unknown config key: {key}");
    };
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Render the config with `database.password` masked.
fn render(config: &RheaConfig, format: Format) -> Result<String> {
    let mut value = serde_json::to_value(config)?;
    if let Some(password) = value.pointer_mut("/database/password") {
        *password = serde_json::Value::String("[REDACTED]".into());
    }
    Ok(match format {
        Format::Toml => toml::to_string_pretty(&value).context("failed to render config as toml")?,
        Format::Yaml => serde_yaml::to_string(&value).context("failed to render config as yaml")?,
        Format::Json => {
            let mut out = serde_json::to_string_pretty(&value)?;
            out.push('\n');
            out
        },
    })
}

fn resolve_path(config_path: Option<&Path>) -> Option<PathBuf> {
    match config_path {
        Some(p) => Some(p.to_path_buf()),
        None => rhea_config::discover_config_file(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reads_defaults_and_nested_keys() {
        let config = RheaConfig::default();
        assert_eq!(get(&config, "inter.uri").unwrap(), "net.tcp://localhost:5401/");
        assert_eq!(get(&config, "network.interface.port").unwrap(), "5500");
        assert_eq!(get(&config, "status.enabled").unwrap(), "false");
        assert!(get(&config, "network.nope").is_err());
    }

    #[test]
    fn show_masks_the_password() {
        let config = RheaConfig::default();
        let out = render(&config, Format::Toml).unwrap();
        assert!(out.contains("dbname = \"rhea_logindb\""));
        assert!(!out.contains("password = \"rhea\""));
        let json: serde_json::Value =
            serde_json::from_str(&render(&config, Format::Json).unwrap()).unwrap();
        assert_eq!(json["database"]["password"], "[REDACTED]");
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        assert_eq!(resolve_path(Some(&path)), Some(path));
    }
}
