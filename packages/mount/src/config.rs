//! Mount configuration.
//!
//! Configurations are JSON objects like:
//! ```json
//! {
//!   "remote_url": "http://localhost:4502",
//!   "mount_root": "/mnt/remote",
//!   "username": "admin",
//!   "password": "admin",
//!   "preemptive_auth": true,
//!   "extra_headers": ["X-Forwarded-Proto=https"]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use remount_core::{PathTranslator, ResourcePath, SELF_MOUNT_PATTERN};
use serde::{Deserialize, Serialize};

use crate::Error;

pub const DEFAULT_CACHE_SIZE: usize = 200;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_ignore_patterns() -> Vec<String> {
    vec![SELF_MOUNT_PATTERN.to_string()]
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Configuration of one remote mount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    /// Base URL of the remote repository.
    pub remote_url: String,
    /// Local path the remote tree appears under.
    pub mount_root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Send credentials with every request instead of waiting for a 401.
    #[serde(default)]
    pub preemptive_auth: bool,
    /// `Name=Value` headers added to every request.
    #[serde(default)]
    pub extra_headers: Vec<String>,
    /// Regular expressions of local paths to hide. `${mount_root}` expands
    /// to the escaped mount root.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl MountConfig {
    pub fn new(remote_url: impl Into<String>, mount_root: impl Into<String>) -> Self {
        Self {
            remote_url: remote_url.into(),
            mount_root: mount_root.into(),
            username: None,
            password: None,
            preemptive_auth: false,
            extra_headers: Vec::new(),
            ignore_patterns: default_ignore_patterns(),
            cache_size: DEFAULT_CACHE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_preemptive_auth(mut self, preemptive: bool) -> Self {
        self.preemptive_auth = preemptive;
        self
    }

    pub fn with_extra_header(mut self, entry: impl Into<String>) -> Self {
        self.extra_headers.push(entry.into());
        self
    }

    /// Add an ignore pattern to the existing ones.
    pub fn with_ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_patterns.push(pattern.into());
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("cannot parse mount configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn mount_root_path(&self) -> Result<ResourcePath, Error> {
        if !self.mount_root.starts_with('/') {
            return Err(Error::config(format!(
                "mount root '{}' is not absolute",
                self.mount_root
            )));
        }
        if self.mount_root.len() > 1 && self.mount_root.ends_with('/') {
            return Err(Error::config(format!(
                "mount root '{}' has a trailing slash",
                self.mount_root
            )));
        }
        let root = ResourcePath::parse(&self.mount_root)?;
        if root.is_root() {
            return Err(Error::config("mount root cannot be the repository root"));
        }
        Ok(root)
    }

    /// Path translator with the ignore patterns compiled.
    pub fn translator(&self) -> Result<PathTranslator, Error> {
        PathTranslator::new(self.mount_root_path()?, &self.ignore_patterns)
            .map_err(|e| Error::config(format!("invalid ignore pattern: {}", e)))
    }

    pub fn validate(&self) -> Result<(), Error> {
        let url = url::Url::parse(&self.remote_url).map_err(|e| {
            Error::config(format!("invalid remote_url '{}': {}", self.remote_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "remote_url '{}' is not an http(s) URL",
                self.remote_url
            )));
        }
        if self.cache_size == 0 {
            return Err(Error::config("cache_size must be at least 1"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::config("password given without username"));
        }
        self.translator()?;
        Ok(())
    }
}
