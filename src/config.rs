//! Server configuration, loaded from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// How the acceptor hands connections to the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Wait for each connection to finish before accepting the next one.
    #[default]
    Serialized,
    /// Keep accepting; the pool size bounds concurrency.
    Parallel,
}

/// What the fallback route does for a request no route matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    /// Serve `.css` and `.js` paths from the static root, 404 otherwise.
    #[default]
    ServeStaticAssets,
    Always404,
}

/// Which routes contribute path params to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamBinding {
    #[default]
    MatchedRoute,
    /// Every parameterized route in the table, matched or not.
    AllParameterizedRoutes,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub app_name: String,
    pub static_root: PathBuf,
    pub workers: usize,
    pub read_timeout_ms: u64,
    pub max_request_bytes: usize,
    pub admission: AdmissionPolicy,
    pub not_found: NotFoundPolicy,
    pub param_binding: ParamBinding,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            app_name: "http-pipeline".to_string(),
            static_root: PathBuf::from("./www"),
            workers: 3,
            read_timeout_ms: 200,
            max_request_bytes: 1024 * 1024,
            admission: AdmissionPolicy::default(),
            not_found: NotFoundPolicy::default(),
            param_binding: ParamBinding::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid { reason: "workers must be at least 1".to_string() });
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::Invalid { reason: "max_request_bytes must be at least 1".to_string() });
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid { reason: "read_timeout_ms must be at least 1".to_string() });
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
