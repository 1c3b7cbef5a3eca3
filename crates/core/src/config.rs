use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpanviewError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub tempo_url: String,
    pub tempo_headers: Vec<(String, String)>,
    pub tempo_timeout: Duration,
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tempo_url: "http://127.0.0.1:3200".to_string(),
            tempo_headers: Vec::new(),
            tempo_timeout: Duration::from_secs(10),
            listen_addr: "127.0.0.1:3210".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides();
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    tempo_url: Option<String>,
    tempo_headers: Option<String>,
    tempo_timeout: Option<String>,
    listen_addr: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("SPANVIEW_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("spanview/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| SpanviewError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed = parse_file_overrides(&raw)
        .map_err(|e| SpanviewError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn parse_file_overrides(raw: &str) -> std::result::Result<ConfigOverrides, toml::de::Error> {
    toml::from_str(raw)
}

fn load_env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        tempo_url: env::var("SPANVIEW_TEMPO_URL").ok(),
        tempo_headers: env::var("SPANVIEW_TEMPO_HEADERS").ok(),
        tempo_timeout: env::var("SPANVIEW_TEMPO_TIMEOUT").ok(),
        listen_addr: env::var("SPANVIEW_LISTEN_ADDR").ok(),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.tempo_url {
        cfg.tempo_url = v;
    }
    if let Some(v) = overrides.tempo_headers {
        cfg.tempo_headers = parse_headers(&v).map_err(|e| {
            SpanviewError::Config(format!("bad tempo_headers in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.tempo_timeout {
        cfg.tempo_timeout = humantime::parse_duration(&v).map_err(|e| {
            SpanviewError::Config(format!("bad tempo_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.listen_addr {
        cfg.listen_addr = v;
    }
    Ok(())
}

pub fn parse_headers(raw: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for entry in raw.split(',') {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(SpanviewError::Config(
                "header entries must use key=value syntax".to_string(),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(SpanviewError::Config("header key cannot be empty".to_string()));
        }
        out.push((key.to_string(), value.trim().to_string()));
    }
    Ok(out)
}
