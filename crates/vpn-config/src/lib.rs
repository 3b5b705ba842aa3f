//! # vpn-config
//!
//! Configuration management for the VPN socket redirector.
//!
//! Loads configuration from:
//! 1. `~/.vpn/config.toml` (global)
//! 2. `.vpn/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod logging;
pub mod testing;

/// Environment variable naming the remote host (placeholder for real
/// address-based resolution)
pub const ENV_REMOTE_HOST: &str = "APPSERVER_VPN";
pub const ENV_SOCKET_DIR: &str = "VPN_SOCKET_DIR";
pub const ENV_LOG: &str = "VPN_LOG";
pub const ENV_LOG_FILE: &str = "VPN_LOG_FILE";

/// Floor for the virtual descriptor offset
pub const DEFAULT_MIN_OFFSET: i32 = 1024;

/// Process-wide config, loaded on first use; load errors fall back to defaults
static CONFIG: Lazy<Config> = Lazy::new(|| Config::load().unwrap_or_default());

/// Get global config (read-only)
pub fn config() -> &'static Config {
    &CONFIG
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub transport: TransportConfig,
    pub descriptors: DescriptorConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Load global config (~/.vpn/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::load_file(&global_path)?;
            }
        }

        // 2. Load project config (.vpn/config.toml) - overrides global
        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            let project_config = Self::load_file(&project_path)?;
            config.merge(project_config);
        }

        // 3. Apply environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.vpn/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".vpn/config.toml"))
    }

    /// Project config path: .vpn/config.toml
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".vpn/config.toml")
    }

    /// Merge another config (project overrides)
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.remote.host.is_some() {
            self.remote.host = other.remote.host;
        }
        if other.remote.interface != defaults.remote.interface {
            self.remote.interface = other.remote.interface;
        }
        if !other.remote.networks.is_empty() {
            self.remote.networks = other.remote.networks;
        }
        if other.transport.socket_dir != defaults.transport.socket_dir {
            self.transport.socket_dir = other.transport.socket_dir;
        }
        if other.descriptors.min_offset != defaults.descriptors.min_offset {
            self.descriptors.min_offset = other.descriptors.min_offset;
        }
        if other.log.level != defaults.log.level {
            self.log.level = other.log.level;
        }
        if other.log.file.is_some() {
            self.log.file = other.log.file;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_REMOTE_HOST) {
            self.remote.host = if host.is_empty() { None } else { Some(host) };
        }
        if let Some(dir) = lookup(ENV_SOCKET_DIR) {
            self.transport.socket_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log.level = level;
        }
        if let Some(file) = lookup(ENV_LOG_FILE) {
            self.log.file = Some(PathBuf::from(file));
        }
    }

    /// Environment a preloaded child needs to see this configuration
    pub fn preload_env(&self) -> Vec<(String, String)> {
        let mut env = vec![(
            ENV_SOCKET_DIR.to_string(),
            self.transport.socket_dir.to_string_lossy().to_string(),
        )];
        if let Some(host) = &self.remote.host {
            env.push((ENV_REMOTE_HOST.to_string(), host.clone()));
        }
        env.push((ENV_LOG.to_string(), self.log.level.clone()));
        if let Some(file) = &self.log.file {
            env.push((ENV_LOG_FILE.to_string(), file.to_string_lossy().to_string()));
        }
        env
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Remote endpoint selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Host every remote destination is routed to
    pub host: Option<String>,
    /// Interface name the endpoint is registered under
    pub interface: String,
    /// IP or CIDR patterns treated as remote; empty means all inet addresses
    pub networks: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            interface: vpn_ipc::APP_INTERFACE.to_string(),
            networks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Directory holding `vpn-<host>.sock` endpoint sockets
    pub socket_dir: PathBuf,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from(vpn_ipc::DEFAULT_SOCKET_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Lowest virtual descriptor; raised to the open-files hard limit, never
    /// below [`DEFAULT_MIN_OFFSET`]
    pub min_offset: i32,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            min_offset: DEFAULT_MIN_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive
    pub level: String,
    /// Log destination for the preload library; no logging when unset
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}
