use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::filter::ExcludeTerms;

/// Upper bound on the per-subscriber queue; every slot is allocated up front.
pub const MAX_CHANNEL_CAPACITY: usize = 65_536;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub ingest_addr: String,
    pub grpc_addr: Option<String>,
    pub allowed_origin: String,
    pub exclude_terms: ExcludeTerms,
    pub channel_capacity: usize,
    pub keep_alive: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ingest_addr: "127.0.0.1:4000".to_string(),
            grpc_addr: None,
            allowed_origin: "http://localhost:3000".to_string(),
            exclude_terms: ExcludeTerms::default(),
            channel_capacity: 256,
            keep_alive: Duration::from_secs(15),
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
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    ingest_addr: Option<String>,
    grpc_addr: Option<String>,
    allowed_origin: Option<String>,
    exclude_terms: Option<ExcludeTerms>,
    channel_capacity: Option<usize>,
    keep_alive: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACEFALL_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracefall/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| RelayError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let channel_capacity = match env::var("TRACEFALL_CHANNEL_CAPACITY") {
        Ok(v) => Some(v.parse::<usize>().map_err(|e| {
            RelayError::Config(format!("bad TRACEFALL_CHANNEL_CAPACITY in environment: {e}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        ingest_addr: env::var("TRACEFALL_INGEST_ADDR").ok(),
        grpc_addr: env::var("TRACEFALL_GRPC_ADDR").ok(),
        allowed_origin: env::var("TRACEFALL_ALLOWED_ORIGIN").ok(),
        exclude_terms: env::var("TRACEFALL_EXCLUDE_TERMS")
            .ok()
            .map(|v| ExcludeTerms::parse_list(&v)),
        channel_capacity,
        keep_alive: env::var("TRACEFALL_KEEP_ALIVE").ok(),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.ingest_addr {
        cfg.ingest_addr = v;
    }
    if let Some(v) = overrides.grpc_addr {
        let v = v.trim();
        cfg.grpc_addr = (!v.is_empty()).then(|| v.to_string());
    }
    if let Some(v) = overrides.allowed_origin {
        cfg.allowed_origin = v;
    }
    if let Some(v) = overrides.exclude_terms {
        cfg.exclude_terms = v;
    }
    if let Some(v) = overrides.channel_capacity {
        if v == 0 || v > MAX_CHANNEL_CAPACITY {
            return Err(RelayError::Config(format!(
                "bad channel_capacity in {source}: must be between 1 and {MAX_CHANNEL_CAPACITY} (value={v})"
            )));
        }
        cfg.channel_capacity = v;
    }
    if let Some(v) = overrides.keep_alive {
        cfg.keep_alive = humantime::parse_duration(&v).map_err(|e| {
            RelayError::Config(format!("bad keep_alive in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}
