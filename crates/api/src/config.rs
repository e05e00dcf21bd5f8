//! Application configuration.
//!
//! Loaded from a YAML file, then overridden from the environment:
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//!   mode: debug
//!   base_path: /api/v1
//!   api_secret: change-me
//!   token_hour_lifetime: 24
//! database:
//!   url: postgres://localhost/f1api
//! seed:
//!   admin_username: admin
//!   admin_password: admin
//!   admin_email: admin@localhost
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use f1api_auth::TokenConfig;
use f1api_infra::SeedConfig;

pub const DEFAULT_CONFIG_PATH: &str = "app-config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("server.api_secret is empty and JWT_SECRET is not set")]
    MissingSecret,

    #[error("server.base_path must start with '/' (got {0:?})")]
    InvalidBasePath(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub seed: SeedConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `debug` lowers the default log level.
    pub mode: String,
    pub base_path: String,
    pub api_secret: String,
    pub token_hour_lifetime: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mode: "release".to_string(),
            base_path: "/api/v1".to_string(),
            api_secret: String::new(),
            token_hour_lifetime: 24,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mode", &self.mode)
            .field("base_path", &self.base_path)
            .field("api_secret", &"<redacted>")
            .field("token_hour_lifetime", &self.token_hour_lifetime)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Only read when built with the `postgres` feature.
    pub url: Option<String>,
}

impl AppConfig {
    /// Read `path`, apply environment overrides and validate.
    ///
    /// A missing file yields defaults (and a warning); the secret must then
    /// come from `JWT_SECRET`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found; using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// `JWT_SECRET` replaces `server.api_secret`; `DATABASE_URL` replaces `database.url`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            self.server.api_secret = secret;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
            self.database.url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.api_secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        let base = &self.server.base_path;
        if !base.is_empty() && !base.starts_with('/') {
            return Err(ConfigError::InvalidBasePath(base.clone()));
        }
        Ok(())
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.server.api_secret.clone(), self.server.token_hour_lifetime)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Base path without a trailing slash; empty means routes sit at the root.
    pub fn base_path(&self) -> &str {
        self.server.base_path.trim_end_matches('/')
    }
}
