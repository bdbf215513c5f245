#![forbid(unsafe_code)]

//! Runtime settings for the downloader: where files land and whether
//! requests go through a SOCKS5 proxy.
//!
//! Each key resolves as programmatic override → process environment →
//! `.env` file, so scripted callers, shell users, and checked-in local
//! setups all compose predictably.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";

const DOWNLOAD_DIR_KEY: &str = "DOWNLOAD_DIR";
const PROXY_KEY: &str = "SOCKS5_PROXY";

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Directory downloads are written into. Required.
    pub download_dir: PathBuf,
    /// SOCKS5 proxy address. `None` (or the `"0"` sentinel, resolved by the
    /// transport) means direct requests.
    pub socks5_proxy: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub download_dir: Option<PathBuf>,
    pub socks5_proxy: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn load_runtime_settings() -> Result<RuntimeSettings> {
    resolve_runtime_settings(RuntimeOverrides::default())
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_settings(&file_vars, env_var_string, overrides)
}

fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeSettings> {
    let download_dir = overrides
        .download_dir
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value(DOWNLOAD_DIR_KEY, file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("{DOWNLOAD_DIR_KEY} not set"))?;

    let socks5_proxy = overrides
        .socks5_proxy
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        })
        .or_else(|| lookup_value(PROXY_KEY, file_vars, &env_lookup))
        .filter(|value| !value.trim().is_empty());

    Ok(RuntimeSettings {
        download_dir: PathBuf::from(download_dir),
        socks5_proxy,
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

/// Parses a `.env` file into a key/value map. Tolerates comments, blank
/// lines, `export` prefixes, and single- or double-quoted values. A missing
/// file is not an error.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
