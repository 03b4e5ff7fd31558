use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per file (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/tordl/config.toml` or `--config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TordlConfig {
    /// Host of the Tor SOCKS5 proxy.
    pub socks_host: String,
    /// Port of the Tor SOCKS5 proxy.
    pub socks_port: u16,
    /// Maximum number of downloads running at once.
    pub max_downloads: usize,
    /// How many times the Tor check is attempted before giving up.
    pub max_tor_checks: u32,
    /// Path to a `tor` executable to launch; `None` means an already running proxy is used.
    #[serde(default)]
    pub tor_path: Option<PathBuf>,
    /// File with the URLs to download (JSON array or one URL per line).
    #[serde(default)]
    pub links_file: Option<PathBuf>,
    /// Directory downloads are written into.
    pub output_dir: PathBuf,
    /// Log file; `None` uses the XDG state directory.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Streaming and progress chunk size in bytes.
    pub chunk_size: usize,
    /// How often one URL may be handed a fresh session after the proxy was unavailable.
    pub max_session_requeues: u32,
    /// How often the unresolved part of a batch is restarted after an unexpected worker failure.
    pub max_batch_restarts: u32,
    /// Skip TLS certificate verification. The Tor exit or onion service terminates
    /// the real connection, and onion services commonly use self-signed certificates.
    pub accept_invalid_certs: bool,
    /// Connect timeout in seconds (Tor circuits are slow to build).
    pub connect_timeout_secs: u64,
    /// Abort a transfer whose throughput stays below 1 byte/s for this many seconds.
    pub low_speed_time_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for TordlConfig {
    fn default() -> Self {
        Self {
            socks_host: "127.0.0.1".to_string(),
            socks_port: 9050,
            max_downloads: 7,
            max_tor_checks: 5,
            tor_path: None,
            links_file: None,
            output_dir: PathBuf::from("downloads"),
            log_file: None,
            chunk_size: 1024,
            max_session_requeues: 10,
            max_batch_restarts: 1,
            accept_invalid_certs: true,
            connect_timeout_secs: 60,
            low_speed_time_secs: 120,
            retry: None,
        }
    }
}

impl TordlConfig {
    /// Retry settings, falling back to defaults when the section is absent.
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than zero");
        }
        if self.max_downloads == 0 {
            anyhow::bail!("max_downloads must be greater than zero");
        }
        if self.retry_config().max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be greater than zero");
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tordl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TordlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TordlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. Missing keys take their defaults.
pub fn load_from_path(path: &Path) -> Result<TordlConfig> {
    let data = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;
    let cfg: TordlConfig = toml::from_str(&merge_with_defaults(&data)?)?;
    Ok(cfg)
}

/// Overlay a partial TOML document on the serialized defaults so users only
/// need to write the keys they change.
fn merge_with_defaults(data: &str) -> Result<String> {
    let mut base: toml::Table = toml::from_str(&toml::to_string(&TordlConfig::default())?)?;
    let user: toml::Table = toml::from_str(data)?;
    for (k, v) in user {
        base.insert(k, v);
    }
    Ok(toml::to_string(&base)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = TordlConfig::default();
        assert_eq!(cfg.socks_port, 9050);
        assert_eq!(cfg.max_downloads, 7);
        assert_eq!(cfg.max_tor_checks, 5);
        assert_eq!(cfg.chunk_size, 1024);
        assert!(cfg.accept_invalid_certs);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = TordlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TordlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.socks_host, cfg.socks_host);
        assert_eq!(parsed.output_dir, cfg.output_dir);
        assert_eq!(parsed.max_session_requeues, cfg.max_session_requeues);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
                socks_port = 9150
                max_downloads = 3
                links_file = "links.json"

                [retry]
                max_attempts = 3
                base_delay_secs = 0.5
                max_delay_secs = 15
            "#,
        )
        .unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.socks_port, 9150);
        assert_eq!(cfg.max_downloads, 3);
        assert_eq!(cfg.links_file.as_deref(), Some(Path::new("links.json")));
        assert_eq!(cfg.socks_host, "127.0.0.1");
        assert_eq!(cfg.chunk_size, 1024);
        let policy = cfg.retry_config().to_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let mut cfg = TordlConfig::default();
        cfg.chunk_size = 0;
        assert!(cfg.validate().is_err());
        cfg.chunk_size = 512;
        cfg.max_downloads = 0;
        assert!(cfg.validate().is_err());
    }
}
