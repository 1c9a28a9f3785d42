//! Configuration for kvgate
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{KvError, Result};
use crate::repository::DEFAULT_SPACE;

/// Main configuration for a kvgate instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Engine address (host:port)
    pub storage_addr: String,

    /// User for chap-sha1 authentication; empty means guest
    pub user: String,

    /// Password for `user`
    pub password: String,

    /// Name of the `[key, value]` space
    pub space: String,

    /// Bound on connect + greeting + auth
    pub connect_timeout: Duration,

    /// Bound on each request round trip, `None` waits forever
    pub request_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // HTTP Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_addr: "127.0.0.1:3301".to_string(),
            user: String::new(),
            password: String::new(),
            space: DEFAULT_SPACE.to_string(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Some(Duration::from_secs(1)),
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<()> {
        if self.storage_addr.trim().is_empty() {
            return Err(KvError::Config("storage address is empty".to_string()));
        }
        if self.space.trim().is_empty() {
            return Err(KvError::Config("space name is empty".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(KvError::Config("connect timeout must be positive".to_string()));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(KvError::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the engine address
    pub fn storage_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.storage_addr = addr.into();
        self
    }

    /// Set the user and password
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.user = user.into();
        self.config.password = password.into();
        self
    }

    /// Set the space name
    pub fn space(mut self, space: impl Into<String>) -> Self {
        self.config.space = space.into();
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-request timeout (`None` disables it)
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
