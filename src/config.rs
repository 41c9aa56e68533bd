//! Client and proxy configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file at
//! `<config dir>/adk-chat/config.json`, then environment variables, then
//! command-line flags (applied by the binary through the `with_*` setters).

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AdkError, AdkResult};
use crate::models::DEFAULT_ALLOWED_APPS;

pub const ENV_SERVER_URL: &str = "ADK_SERVER_URL";
pub const ENV_BIND: &str = "ADK_CHAT_BIND";
pub const ENV_USER: &str = "ADK_CHAT_USER";
pub const ENV_APPS: &str = "ADK_CHAT_APPS";

const CONFIG_DIR: &str = "adk-chat";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8090";
pub const DEFAULT_USER: &str = "demo";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Resolved configuration.
///
/// ```ignore
/// use adk_chat::config::ChatConfig;
///
/// let config = ChatConfig::load(None)?
///     .with_server_url("http://localhost:8000")
///     .with_user("alice");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the ADK server
    pub server_url: String,
    /// Address the proxy listens on
    pub bind_addr: SocketAddr,
    /// User id sent with every session and run request
    pub user: String,
    /// Apps preferred when filtering `/list-apps`
    pub allowed_apps: Vec<String>,
    pub connect_timeout_secs: u64,
}

/// Partial configuration as read from the JSON file. Missing keys keep the
/// previous layer's value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server_url: Option<String>,
    pub bind_addr: Option<SocketAddr>,
    pub user: Option<String>,
    pub allowed_apps: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8090)),
            user: DEFAULT_USER.to_string(),
            allowed_apps: DEFAULT_ALLOWED_APPS.iter().map(|s| s.to_string()).collect(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ChatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Defaults, then the file at `path` (or the default location), then env.
    pub fn load(path: Option<&Path>) -> AdkResult<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = Self::default();
        if let Some(path) = path {
            if let Some(file) = FileConfig::read(&path)? {
                debug!(path = %path.display(), "Loaded config file");
                config = config.with_file(file);
            }
        }
        config.with_env()
    }

    /// Defaults overridden by the environment only.
    pub fn from_env() -> AdkResult<Self> {
        Self::default().with_env()
    }

    pub fn with_file(mut self, file: FileConfig) -> Self {
        if let Some(url) = file.server_url {
            self.server_url = url;
        }
        if let Some(addr) = file.bind_addr {
            self.bind_addr = addr;
        }
        if let Some(user) = file.user {
            self.user = user;
        }
        if let Some(apps) = file.allowed_apps {
            self.allowed_apps = apps;
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        self
    }

    /// Apply `ADK_SERVER_URL`, `ADK_CHAT_BIND`, `ADK_CHAT_USER` and
    /// `ADK_CHAT_APPS` (comma-separated). Empty values are ignored.
    pub fn with_env(mut self) -> AdkResult<Self> {
        if let Some(url) = env_value(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(bind) = env_value(ENV_BIND) {
            self.bind_addr = parse_bind_addr(&bind)?;
        }
        if let Some(user) = env_value(ENV_USER) {
            self.user = user;
        }
        if let Some(apps) = env_value(ENV_APPS) {
            self.allowed_apps = apps
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(self)
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_allowed_apps(mut self, apps: Vec<String>) -> Self {
        self.allowed_apps = apps;
        self
    }

    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Server URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl FileConfig {
    /// Read a config file. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> AdkResult<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file = serde_json::from_str(&contents).map_err(|e| {
            AdkError::Config(format!("invalid config file {}: {}", path.display(), e))
        })?;
        Ok(Some(file))
    }
}

pub fn parse_bind_addr(value: &str) -> AdkResult<SocketAddr> {
    value
        .trim()
        .parse()
        .map_err(|_| AdkError::Config(format!("invalid bind address: {}", value)))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
