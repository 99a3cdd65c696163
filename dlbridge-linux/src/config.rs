//! Load config from file and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use dlbridge_core::{DEFAULT_CHANNEL, DEFAULT_QUEUE_CAPACITY};

/// Daemon configuration. File: ~/.config/dlbridge/config.toml or /etc/dlbridge/config.toml.
/// Env overrides: DLBRIDGE_LISTEN_PORT, DLBRIDGE_CHANNEL, DLBRIDGE_ENGINE_LIBRARY,
/// DLBRIDGE_ENGINE_SYMBOL, DLBRIDGE_QUEUE_CAPACITY, DLBRIDGE_LOG.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Local channel server TCP port (default 45680).
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Channel name calls must be addressed to.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Shared library exporting the engine vtable.
    #[serde(default = "default_engine_library")]
    pub engine_library: PathBuf,
    /// Symbol returning `*const EngineVTable`.
    #[serde(default = "default_engine_symbol")]
    pub engine_symbol: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// tracing EnvFilter directive used when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    45680
}
fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}
fn default_engine_library() -> PathBuf {
    PathBuf::from("libgopeed.so")
}
fn default_engine_symbol() -> String {
    "dlbridge_engine_vtable".to_string()
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            channel: default_channel(),
            engine_library: default_engine_library(),
            engine_symbol: default_engine_symbol(),
            queue_capacity: default_queue_capacity(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Apply overrides from `var` (normally `std::env::var`). Unparsable numbers are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(p) = var("DLBRIDGE_LISTEN_PORT").and_then(|s| s.parse::<u16>().ok()) {
            self.listen_port = p;
        }
        if let Some(s) = var("DLBRIDGE_CHANNEL").filter(|s| !s.is_empty()) {
            self.channel = s;
        }
        if let Some(s) = var("DLBRIDGE_ENGINE_LIBRARY").filter(|s| !s.is_empty()) {
            self.engine_library = PathBuf::from(s);
        }
        if let Some(s) = var("DLBRIDGE_ENGINE_SYMBOL").filter(|s| !s.is_empty()) {
            self.engine_symbol = s;
        }
        if let Some(n) = var("DLBRIDGE_QUEUE_CAPACITY").and_then(|s| s.parse::<usize>().ok()) {
            self.queue_capacity = n.max(1);
        }
        if let Some(s) = var("DLBRIDGE_LOG").filter(|s| !s.is_empty()) {
            self.log_level = s;
        }
    }
}

/// Load config: merge default, then the first config file found (if any), then env vars.
/// A file that exists but cannot be read or parsed is skipped; its error is returned
/// alongside so the caller can report it once logging is up.
pub fn load() -> (Config, Option<ConfigError>) {
    let (file, skipped) = match load_file() {
        Some(Ok(c)) => (c, None),
        Some(Err(err)) => (Config::default(), Some(err)),
        None => (Config::default(), None),
    };
    let mut c = file;
    c.apply_env(env_var);
    (c, skipped)
}

/// Load config from an explicit path, then env vars. Errors if the file is unusable.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let mut c = read_file(path)?;
    c.apply_env(env_var);
    Ok(c)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/dlbridge/config.toml"));
    }
    out.push(PathBuf::from("/etc/dlbridge/config.toml"));
    out
}

fn load_file() -> Option<Result<Config, ConfigError>> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    Some(read_file(&path))
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(s)
}
