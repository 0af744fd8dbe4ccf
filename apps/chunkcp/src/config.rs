//! Optional defaults file and CLI merging.
//!
//! Configuration is read from TOML, never written:
//! - `--config PATH` when given (must exist)
//! - `$XDG_CONFIG_HOME/chunkcp/config.toml`
//! - `~/.config/chunkcp/config.toml`
//!
//! Command-line flags override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chunkcp_pipeline::{DEFAULT_RETRIES, DEFAULT_WORKERS, TransferConfig};
use chunkcp_remote::{DEFAULT_CALL_TIMEOUT, DEFAULT_CIPHER};
use chunkcp_transfer::DEFAULT_CHUNK_PREFIX;
use serde::Deserialize;

use crate::cli::Cli;
use crate::size::parse_size;

/// Defaults loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    /// Chunk size in human form, e.g. `"500M"`.
    #[serde(default = "default_size")]
    pub size: String,

    #[serde(default = "default_threads")]
    pub threads: usize,

    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Empty string keeps the ssh default cipher.
    #[serde(default = "default_cipher")]
    pub cipher: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_size() -> String {
    "500M".into()
}

fn default_threads() -> usize {
    DEFAULT_WORKERS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_cipher() -> String {
    DEFAULT_CIPHER.into()
}

fn default_timeout() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_secs()
}

fn default_prefix() -> String {
    DEFAULT_CHUNK_PREFIX.into()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            threads: default_threads(),
            retries: default_retries(),
            cipher: default_cipher(),
            timeout: default_timeout(),
            port: None,
            prefix: default_prefix(),
        }
    }
}

impl FileConfig {
    /// Loads `explicit`, or the default location if it exists, or built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match config_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Default config file location.
fn config_path() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(std::env::var_os("HOME")?).join(".config"),
    };
    Some(base.join("chunkcp").join("config.toml"))
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub transfer: TransferConfig,
    pub cipher: Option<String>,
    pub timeout: Duration,
    pub port: Option<u16>,
    pub identity: Option<PathBuf>,
    pub local: bool,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: &FileConfig) -> anyhow::Result<Self> {
        let chunk_size = match cli.size {
            Some(size) => size,
            None => parse_size(&file.size).context("invalid size in config file")?,
        };
        let cipher = cli.cipher.clone().unwrap_or_else(|| file.cipher.clone());
        let timeout = cli.timeout.unwrap_or(file.timeout);
        if timeout == 0 {
            anyhow::bail!("timeout must be at least 1 second");
        }

        let mut transfer = TransferConfig::new(&cli.source, &cli.remote, &cli.dest);
        transfer.chunk_size = chunk_size;
        transfer.workers = cli.threads.unwrap_or(file.threads);
        transfer.retries = cli.retries.unwrap_or(file.retries);
        transfer.prefix = cli.prefix.clone().unwrap_or_else(|| file.prefix.clone());
        transfer.work_dir = cli.work_dir.clone();

        Ok(Self {
            transfer,
            cipher: (!cipher.is_empty()).then_some(cipher),
            timeout: Duration::from_secs(timeout),
            port: cli.port.or(file.port),
            identity: cli.identity.clone(),
            local: cli.local,
        })
    }
}
