use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::RheaConfig};

/// Config file stems, checked in order, relative to each search directory.
const CONFIG_STEMS: &[&str] = &["rhea", "Config/AccountServer"];

/// Supported extensions, checked in order for each stem. `cfg` files are
/// read as TOML.
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json", "cfg"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<RheaConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Resolve the effective configuration.
///
/// An explicit `path` is used as-is. Otherwise the search order is:
/// 1. `./rhea.{toml,yaml,yml,json,cfg}`
/// 2. `./Config/AccountServer.{toml,yaml,yml,json,cfg}`
/// 3. `~/.config/rhea/rhea.{toml,yaml,yml,json,cfg}`
///
/// Never fails: a missing file yields defaults, and an unreadable or
/// malformed one is logged and replaced by defaults.
pub fn discover_and_load(path: Option<&Path>) -> RheaConfig {
    let found = match path {
        Some(p) => Some(p.to_path_buf()),
        None => discover_config_file(),
    };

    let Some(path) = found else {
        debug!("no config file found, using defaults");
        return RheaConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            RheaConfig::default()
        },
    }
}

/// The file [`discover_and_load`] would pick without an explicit path.
pub fn discover_config_file() -> Option<PathBuf> {
    find_config_file(&search_dirs())
}

/// Find the first config file under `dirs`, honouring stem and extension order.
pub fn find_config_file(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter().find_map(|dir| {
        CONFIG_STEMS.iter().find_map(|stem| {
            CONFIG_EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{stem}.{ext}")))
                .find(|p| p.exists())
        })
    })
}

/// Look up a dotted key (`network.interface.port`) in the effective config.
pub fn lookup(config: &RheaConfig, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let value = serde_json::to_value(config)?;
    let pointer = format!("/{}", key.trim().replace('.', "/"));
    Ok(value.pointer(&pointer).cloned())
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
        dirs.push(home.join(".config").join("rhea"));
    }
    dirs
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<RheaConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" | "cfg" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
