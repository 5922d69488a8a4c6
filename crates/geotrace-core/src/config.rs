//! Configuration types for geotrace.
//!
//! [`Config::load`] layers, lowest precedence first: the embedded defaults,
//! a TOML file (the explicit `--config` path, else
//! `$XDG_CONFIG_HOME/geotrace/config.toml` when it exists), then
//! `GEOTRACE__SECTION__KEY` environment variables. [`Config::defaults`]
//! returns the embedded defaults without touching the filesystem or the
//! environment (useful in tests).

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[logging]
level = "info"

[tcp_echo]
listen = "0.0.0.0:8080"

[http_echo]
listen = "0.0.0.0:3000"

[request_log]
listen         = "0.0.0.0:3001"
max_body_bytes = 4096

[telemetry]
listen                = "0.0.0.0:8081"
api_key               = ""
history_default_limit = 100
history_max_limit     = 1000

[telemetry.store]
kind = "memory"
path = "geotrace-telemetry.jsonl"
"#;

const ENV_PREFIX: &str = "GEOTRACE";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration shared by every server subcommand.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tcp_echo: ListenConfig,
    #[serde(default)]
    pub http_echo: ListenConfig,
    #[serde(default)]
    pub request_log: RequestLogConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// `[logging]` section. `RUST_LOG`, when set, wins over `level`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

/// A section that only carries a listen address.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String { "0.0.0.0:8080".to_string() }

impl Default for ListenConfig {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

/// `[request_log]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestLogConfig {
    #[serde(default = "default_request_log_listen")]
    pub listen: String,
    /// Bodies longer than this are truncated in the log line.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_request_log_listen() -> String { "0.0.0.0:3001".to_string() }
fn default_max_body_bytes() -> usize { 4096 }

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            listen: default_request_log_listen(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// `[telemetry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_listen")]
    pub listen: String,
    /// Shared secret expected in the `x-api-key` header. Empty disables the check.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_history_default_limit")]
    pub history_default_limit: usize,
    #[serde(default = "default_history_max_limit")]
    pub history_max_limit: usize,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_telemetry_listen() -> String { "0.0.0.0:8081".to_string() }
fn default_history_default_limit() -> usize { 100 }
fn default_history_max_limit() -> usize { 1000 }

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            listen: default_telemetry_listen(),
            api_key: String::new(),
            history_default_limit: default_history_default_limit(),
            history_max_limit: default_history_max_limit(),
            store: StoreConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// The configured API key, or `None` when authentication is disabled.
    pub fn api_key(&self) -> Option<&str> {
        Some(self.api_key.trim()).filter(|k| !k.is_empty())
    }
}

/// Which [`TelemetryStore`](crate::store::TelemetryStore) backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Jsonl,
}

/// `[telemetry.store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// File used by the `jsonl` backend; ignored by `memory`.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf { PathBuf::from("geotrace-telemetry.jsonl") }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load configuration. An explicit `path` must exist; the per-user file
    /// is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::from(user_config_path().as_path()).required(false),
        };

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn user_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("geotrace")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `Config::load` reads the process environment; tests that call it
    // serialise on this so env overrides never leak into another test.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets environment variables and removes them again on drop.
    struct EnvVars(&'static [(&'static str, &'static str)]);

    impl EnvVars {
        fn set(vars: &'static [(&'static str, &'static str)]) -> Self {
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            Self(vars)
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for (key, _) in self.0 {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn defaults_load() {
        let cfg = Config::defaults();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.tcp_echo.listen, "0.0.0.0:8080");
        assert_eq!(cfg.http_echo.listen, "0.0.0.0:3000");
        assert_eq!(cfg.request_log.max_body_bytes, 4096);
        assert_eq!(cfg.telemetry.history_max_limit, 1000);
        assert_eq!(cfg.telemetry.store.kind, StoreKind::Memory);
        assert_eq!(cfg.telemetry.api_key(), None);
    }

    #[test]
    fn file_overrides_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geotrace.toml");
        std::fs::write(
            &path,
            r#"
[telemetry]
api_key = "s3cret"
history_default_limit = 25

[telemetry.store]
kind = "jsonl"
path = "/var/lib/geotrace/records.jsonl"
"#,
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.telemetry.api_key(), Some("s3cret"));
        assert_eq!(cfg.telemetry.history_default_limit, 25);
        assert_eq!(cfg.telemetry.history_max_limit, 1000);
        assert_eq!(cfg.telemetry.store.kind, StoreKind::Jsonl);
        assert_eq!(
            cfg.telemetry.store.path,
            PathBuf::from("/var/lib/geotrace/records.jsonl")
        );
        assert_eq!(cfg.tcp_echo.listen, "0.0.0.0:8080");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn env_overrides_file_and_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geotrace.toml");
        std::fs::write(
            &path,
            r#"
[telemetry]
api_key = "from-file"
history_max_limit = 200
history_default_limit = 20
"#,
        )
        .unwrap();

        let _vars = EnvVars::set(&[
            ("GEOTRACE__TELEMETRY__API_KEY", "from-env"),
            ("GEOTRACE__TELEMETRY__HISTORY_MAX_LIMIT", "500"),
        ]);
        let cfg = Config::load(Some(&path)).unwrap();

        assert_eq!(cfg.telemetry.api_key(), Some("from-env"));
        assert_eq!(cfg.telemetry.history_max_limit, 500);
        assert_eq!(cfg.telemetry.history_default_limit, 20);
        assert_eq!(cfg.telemetry.listen, "0.0.0.0:8081");
    }
}
