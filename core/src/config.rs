//! Client configuration.
//!
//! A `ClientConfig` carries everything that was a module-level constant in a
//! typical browser helper: the API origin, the storage key for the token, the
//! authorization scheme and what to do on a 401.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TOKEN_KEY: &str = "__api_client_token__";
pub const DEFAULT_AUTH_SCHEME: &str = "Bearer";

pub const ENV_BASE_URL: &str = "FETCH_BASE_URL";
pub const ENV_TOKEN_KEY: &str = "FETCH_TOKEN_KEY";
pub const ENV_AUTH_SCHEME: &str = "FETCH_AUTH_SCHEME";

/// What the pipeline does when a response comes back with status 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedPolicy {
    /// Clear the token, trigger a reload and return `Outcome::Unauthorized`.
    #[default]
    ClearAndReload,
    /// Treat 401 like any other status.
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_token_key")]
    pub token_key: String,
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
    #[serde(default)]
    pub unauthorized_policy: UnauthorizedPolicy,
}

fn default_token_key() -> String {
    DEFAULT_TOKEN_KEY.to_string()
}

fn default_auth_scheme() -> String {
    DEFAULT_AUTH_SCHEME.to_string()
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token_key: default_token_key(),
            auth_scheme: default_auth_scheme(),
            unauthorized_policy: UnauthorizedPolicy::default(),
        }
    }

    pub fn with_token_key(mut self, key: &str) -> Self {
        self.token_key = key.to_string();
        self
    }

    pub fn with_auth_scheme(mut self, scheme: &str) -> Self {
        self.auth_scheme = scheme.to_string();
        self
    }

    pub fn with_unauthorized_policy(mut self, policy: UnauthorizedPolicy) -> Self {
        self.unauthorized_policy = policy;
        self
    }

    /// Load from `FETCH_BASE_URL`, `FETCH_TOKEN_KEY` and `FETCH_AUTH_SCHEME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL).ok_or(ConfigError::MissingVar(ENV_BASE_URL))?;
        if base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: ENV_BASE_URL,
                reason: "must not be empty".to_string(),
            });
        }

        let mut config = Self::new(base_url.trim());
        if let Some(key) = lookup(ENV_TOKEN_KEY).filter(|k| !k.is_empty()) {
            config.token_key = key;
        }
        if let Some(scheme) = lookup(ENV_AUTH_SCHEME) {
            if scheme.contains(char::is_whitespace) || scheme.is_empty() {
                return Err(ConfigError::Invalid {
                    name: ENV_AUTH_SCHEME,
                    reason: format!("`{scheme}` is not a single token"),
                });
            }
            config.auth_scheme = scheme;
        }
        Ok(config)
    }
}
