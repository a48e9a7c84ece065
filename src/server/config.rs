//! Configuration types and constants for the trust-o-meter server.
//!
//! Precedence: CLI arguments, then environment variables, then
//! `{data_dir}/config.toml`, then built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::auth::generate_secret;

pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub(crate) const DEFAULT_TOKEN_TTL_SECS: u64 = 30 * 24 * 3600;
pub(crate) const WS_CHANNEL_CAPACITY: usize = 64;
pub(crate) const MAX_WS_CONNECTIONS: usize = 1024;
pub(crate) const MAX_CUSTOM_NAME_LEN: usize = 64;

/// Social trust tracking server.
///
/// Provides a REST API and a WebSocket push channel, and persists state
/// in SQLite.
#[derive(Parser, Debug, Default)]
#[command(name = "trust-o-meter", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: TRUST_BIND] [default: 127.0.0.1:3000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database and config.toml [env: TRUST_HOME] [default: ~/.trust-o-meter]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,

    /// Secret used to sign bearer tokens [env: TRUST_TOKEN_SECRET]
    #[arg(long)]
    pub token_secret: Option<String>,

    /// Comma separated identificators that become admins on registration [env: TRUST_ADMINS]
    #[arg(long)]
    pub admins: Option<String>,

    /// Bearer token lifetime in seconds [env: TRUST_TOKEN_TTL] [default: 30 days]
    #[arg(long)]
    pub token_ttl: Option<u64>,
}

/// Contents of `{data_dir}/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub token_secret: Option<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "io error: {e}"),
            ConfigError::Toml(e) => write!(f, "config error: {e}"),
            ConfigError::Invalid(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Load `config.toml`, returning defaults if it doesn't exist.
pub fn load_file_config(data_dir: &Path) -> Result<FileConfig, ConfigError> {
    let path = config_path(data_dir);
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = fs::read_to_string(&path)?;
    toml::from_str(&contents).map_err(|e| ConfigError::Toml(e.to_string()))
}

pub fn save_file_config(data_dir: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    fs::create_dir_all(data_dir)?;
    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::Toml(e.to_string()))?;
    fs::write(config_path(data_dir), contents)?;
    Ok(())
}

fn parse_admins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub token_secret: String,
    pub admins: Vec<String>,
    pub token_ttl_secs: u64,
}

impl Config {
    /// Resolve the effective configuration. `env` looks up environment
    /// variables. A token secret is generated and written to `config.toml`
    /// when no source provides one.
    pub fn resolve(
        cli: Cli,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let data_dir = cli
            .data_dir
            .or_else(|| env("TRUST_HOME").map(PathBuf::from))
            .unwrap_or_else(|| {
                env("HOME")
                    .map(|h| PathBuf::from(h).join(".trust-o-meter"))
                    .unwrap_or_else(|| PathBuf::from(".trust-o-meter"))
            });

        let mut file = load_file_config(&data_dir)?;

        let bind_addr = cli
            .bind
            .or_else(|| env("TRUST_BIND"))
            .or_else(|| file.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let admins = match cli.admins.or_else(|| env("TRUST_ADMINS")) {
            Some(raw) => parse_admins(&raw),
            None => file.admins.clone(),
        };

        let token_ttl_secs = match cli.token_ttl {
            Some(ttl) => ttl,
            None => match env("TRUST_TOKEN_TTL") {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("TRUST_TOKEN_TTL is not a number: {raw}"))
                })?,
                None => file.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            },
        };
        if token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("token ttl must be positive".to_string()));
        }

        let token_secret = match cli
            .token_secret
            .or_else(|| env("TRUST_TOKEN_SECRET"))
            .or_else(|| file.token_secret.clone())
        {
            Some(secret) if !secret.is_empty() => secret,
            Some(_) => return Err(ConfigError::Invalid("token secret is empty".to_string())),
            None => {
                let secret = generate_secret();
                file.token_secret = Some(secret.clone());
                save_file_config(&data_dir, &file)?;
                crate::tlog!("config: generated token secret in {}", config_path(&data_dir).display());
                secret
            }
        };

        Ok(Self {
            bind_addr,
            data_dir,
            token_secret,
            admins,
            token_ttl_secs,
        })
    }
}
