//! Load config from file and environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

/// Client configuration. File: ~/.config/btirc/config.toml or /etc/btirc/config.toml.
/// Env overrides: BTIRC_BACKEND, BTIRC_ADAPTER, BTIRC_INQUIRY_SECS, BTIRC_READ_CHUNK_SIZE,
/// BTIRC_READ_RETRY_BACKOFF_MS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Transport backend (default bluez when built with it, else tcp).
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// BlueZ adapter name, e.g. "hci0". Default adapter when unset.
    #[serde(default)]
    pub adapter: Option<String>,
    /// Length of one inquiry round in seconds (default 10.24, the GIAC inquiry length).
    #[serde(default = "default_inquiry_secs")]
    pub inquiry_secs: f64,
    /// Read chunk and retry backoff for the incoming side of a session.
    #[serde(default)]
    pub session: btirc_core::Config,
    #[serde(default)]
    pub tcp: TcpConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Bluez,
    Tcp,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bluez" => Ok(Backend::Bluez),
            "tcp" => Ok(Backend::Tcp),
            other => Err(format!("unknown backend {:?}", other)),
        }
    }
}

/// TCP backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpConfig {
    /// Address printed as the local device address.
    #[serde(default = "default_local_address")]
    pub local_address: String,
    /// Name printed as the local device name.
    #[serde(default = "default_local_name")]
    pub local_name: String,
    /// `tcp://host:port` addresses probed during discovery.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Probe connect timeout in milliseconds (default 2000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_backend() -> Backend {
    if cfg!(feature = "bluez") {
        Backend::Bluez
    } else {
        Backend::Tcp
    }
}
fn default_inquiry_secs() -> f64 {
    10.24
}
fn default_local_address() -> String {
    "127.0.0.1".to_string()
}
fn default_local_name() -> String {
    "btirc".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            adapter: None,
            inquiry_secs: default_inquiry_secs(),
            session: btirc_core::Config::default(),
            tcp: TcpConfig::default(),
        }
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            local_address: default_local_address(),
            local_name: default_local_name(),
            peers: Vec::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Config {
    /// Inquiry length; non-positive or non-finite values fall back to the default.
    pub fn inquiry_duration(&self) -> Duration {
        let secs = if self.inquiry_secs.is_finite() && self.inquiry_secs > 0.0 {
            self.inquiry_secs
        } else {
            default_inquiry_secs()
        };
        Duration::from_secs_f64(secs)
    }
}

impl TcpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

/// Apply environment overrides. Unparseable values are ignored.
fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("BTIRC_BACKEND") {
        match s.parse::<Backend>() {
            Ok(b) => c.backend = b,
            Err(e) => warn!("BTIRC_BACKEND ignored: {}", e),
        }
    }
    if let Some(s) = var("BTIRC_ADAPTER") {
        if !s.is_empty() {
            c.adapter = Some(s);
        }
    }
    if let Some(s) = var("BTIRC_INQUIRY_SECS") {
        if let Ok(v) = s.parse::<f64>() {
            c.inquiry_secs = v;
        }
    }
    if let Some(s) = var("BTIRC_READ_CHUNK_SIZE") {
        if let Ok(v) = s.parse::<usize>() {
            c.session.read_chunk_size = v;
        }
    }
    if let Some(s) = var("BTIRC_READ_RETRY_BACKOFF_MS") {
        if let Ok(v) = s.parse::<u64>() {
            c.session.read_retry_backoff_ms = v;
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/btirc/config.toml"));
    }
    out.push(PathBuf::from("/etc/btirc/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => {
                        debug!(path = %p.display(), "loaded config");
                        return Some(c);
                    }
                    Err(e) => warn!(path = %p.display(), error = %e, "invalid config, using defaults"),
                },
                Err(e) => warn!(path = %p.display(), error = %e, "unreadable config, using defaults"),
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c.backend, default_backend());
        assert_eq!(c.session.read_chunk_size, 1024);
        assert_eq!(c.tcp.local_name, "btirc");
        assert_eq!(c.inquiry_duration(), Duration::from_millis(10_240));
    }

    #[test]
    fn parses_full_file() {
        let c: Config = toml::from_str(
            r#"
            backend = "tcp"
            adapter = "hci1"
            inquiry_secs = 5.0

            [session]
            read_chunk_size = 256
            read_retry_backoff_ms = 0

            [tcp]
            local_name = "bench"
            peers = ["tcp://127.0.0.1:7000"]
            "#,
        )
        .unwrap();
        assert_eq!(c.backend, Backend::Tcp);
        assert_eq!(c.adapter.as_deref(), Some("hci1"));
        assert_eq!(c.inquiry_duration(), Duration::from_secs(5));
        assert_eq!(c.session.read_chunk_size, 256);
        assert_eq!(c.session.read_retry_backoff_ms, 0);
        assert_eq!(c.tcp.local_name, "bench");
        assert_eq!(c.tcp.local_address, "127.0.0.1");
        assert_eq!(c.tcp.peers, vec!["tcp://127.0.0.1:7000"]);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<Config>("colour = true").is_err());
        assert!(toml::from_str::<Config>("[session]\nbuffer = 3").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("BTIRC_BACKEND", "TCP"),
            ("BTIRC_ADAPTER", "hci2"),
            ("BTIRC_READ_CHUNK_SIZE", "64"),
            ("BTIRC_READ_RETRY_BACKOFF_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        apply_env(&mut c, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.backend, Backend::Tcp);
        assert_eq!(c.adapter.as_deref(), Some("hci2"));
        assert_eq!(c.session.read_chunk_size, 64);
        assert_eq!(c.session.read_retry_backoff_ms, 100);
    }

    #[test]
    fn bad_inquiry_length_falls_back() {
        let c = Config {
            inquiry_secs: -1.0,
            ..Config::default()
        };
        assert_eq!(c.inquiry_duration(), Duration::from_millis(10_240));
    }
}
