//! Client configuration.
//!
//! Credentials are required; host, port and API version default to the
//! public service. A config file may carry a full `[schema]` table to talk to
//! an API version the crate has no built-in schema for.
//!
//! ```toml
//! key = "consumer-key"
//! secret = "consumer-secret"
//! api_version = "1.0"
//! host = "api.simplegeo.com"
//! port = 80
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ApiError;
use crate::schema::{Schema, PLACES_VERSION};

pub const DEFAULT_HOST: &str = "api.simplegeo.com";
pub const DEFAULT_PORT: u16 = 80;

#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub key: String,
    pub secret: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Overrides the built-in schema for `api_version`.
    #[serde(default)]
    pub schema: Option<Schema>,
}

fn default_api_version() -> String {
    PLACES_VERSION.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("key", &self.key)
            .field("api_version", &self.api_version)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("schema", &self.schema.as_ref().map(|s| &s.version))
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(key: &str, secret: &str) -> Self {
        Self {
            key: key.to_string(),
            secret: secret.to_string(),
            api_version: default_api_version(),
            host: default_host(),
            port: default_port(),
            schema: None,
        }
    }

    pub fn api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ApiError> {
        toml::from_str(text).map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ApiError::ConfigError(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// The schema in effect: the explicit one, else the built-in schema for
    /// `api_version`. An explicit schema's version must match.
    pub fn resolve_schema(&self) -> Result<Schema, ApiError> {
        match &self.schema {
            Some(schema) if schema.version != self.api_version => Err(ApiError::ConfigError(format!(
                "schema version {} does not match api_version {}",
                schema.version, self.api_version
            ))),
            Some(schema) => Ok(schema.clone()),
            None => Schema::for_version(&self.api_version),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        if self.key.is_empty() || self.secret.is_empty() {
            return Err(ApiError::ConfigError("consumer key and secret are required".to_string()));
        }
        if self.host.is_empty() {
            return Err(ApiError::ConfigError("host must not be empty".to_string()));
        }
        Ok(())
    }
}
