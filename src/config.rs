//! Service configuration
//!
//! Read once at start-up from the process environment. Outbound proxy and
//! timeout settings are collected in [`NetworkConfig`] and handed to each
//! client constructor.

use reqwest::{Client, ClientBuilder, Proxy};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::types::{LabError, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_EXECUTION_SERVICE_URL: &str = "http://localhost:5001";
pub const DEFAULT_PORT: u16 = 3001;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Only needed by the generation endpoints
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub yahoo_base_url: String,
    pub execution_service_url: String,
    #[serde(default)]
    pub outbound_proxy_url: Option<String>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    pub port: u16,
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    /// Load from an explicit environment source (keys as env var names)
    pub fn from_environment(env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("gemini_model", DEFAULT_GEMINI_MODEL)?
            .set_default("gemini_base_url", DEFAULT_GEMINI_BASE_URL)?
            .set_default("yahoo_base_url", DEFAULT_YAHOO_BASE_URL)?
            .set_default("execution_service_url", DEFAULT_EXECUTION_SERVICE_URL)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .add_source(env.try_parsing(true))
            .build()?;

        let mut config: AppConfig = settings.try_deserialize()?;
        config.gemini_api_key = config.gemini_api_key.filter(|key| !key.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_base_url("GEMINI_BASE_URL", &self.gemini_base_url)?;
        validate_base_url("YAHOO_BASE_URL", &self.yahoo_base_url)?;
        validate_base_url("EXECUTION_SERVICE_URL", &self.execution_service_url)?;

        if let Some(proxy) = &self.outbound_proxy_url {
            Url::parse(proxy).map_err(|e| {
                LabError::Config(format!("Invalid OUTBOUND_PROXY_URL '{}': {}", proxy, e))
            })?;
        }

        Ok(())
    }

    /// Network settings shared by the outbound clients
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            proxy_url: self.outbound_proxy_url.clone(),
            timeout: self.http_timeout_secs.map(Duration::from_secs),
        }
    }
}

fn validate_base_url(key: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| LabError::Config(format!("Invalid {} '{}': {}", key, value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(LabError::Config(format!(
            "Invalid {}: must be http:// or https://, got scheme '{}'",
            key, other
        ))),
    }
}

/// Outbound network settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkConfig {
    /// Forward proxy for third-party provider calls
    pub proxy_url: Option<String>,
    /// Client timeout; `None` keeps the HTTP client default
    pub timeout: Option<Duration>,
}

impl NetworkConfig {
    /// No proxy, default timeouts
    pub fn direct() -> Self {
        Self::default()
    }

    /// Builder for clients that reach third-party providers through the proxy
    pub fn proxied_builder(&self) -> Result<ClientBuilder> {
        let mut builder = self.base_builder();

        if let Some(proxy_url) = &self.proxy_url {
            let proxy = Proxy::all(proxy_url.as_str())
                .map_err(|e| LabError::Config(format!("Invalid proxy '{}': {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder)
    }

    /// Client for local services, never routed through a proxy
    pub fn direct_client(&self) -> Result<Client> {
        self.base_builder()
            .no_proxy()
            .build()
            .map_err(|e| LabError::Config(format!("Failed to create HTTP client: {}", e)))
    }

    fn base_builder(&self) -> ClientBuilder {
        let builder = Client::builder();
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_environment(env(&[("GEMINI_API_KEY", "key")])).unwrap();

        assert_eq!(config.gemini_api_key.as_deref(), Some("key"));
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.yahoo_base_url, DEFAULT_YAHOO_BASE_URL);
        assert_eq!(config.execution_service_url, DEFAULT_EXECUTION_SERVICE_URL);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.network(), NetworkConfig::direct());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_environment(env(&[
            ("GEMINI_API_KEY", "key"),
            ("OUTBOUND_PROXY_URL", "http://localhost:4780"),
            ("HTTP_TIMEOUT_SECS", "45"),
            ("PORT", "8081"),
            ("EXECUTION_SERVICE_URL", "http://python:5001"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.execution_service_url, "http://python:5001");

        let network = config.network();
        assert_eq!(network.proxy_url.as_deref(), Some("http://localhost:4780"));
        assert_eq!(network.timeout, Some(Duration::from_secs(45)));
        assert!(network.proxied_builder().is_ok());
    }

    #[test]
    fn test_api_key_optional() {
        let config = AppConfig::from_environment(env(&[])).unwrap();
        assert!(config.gemini_api_key.is_none());

        let config = AppConfig::from_environment(env(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = AppConfig::from_environment(env(&[
            ("GEMINI_API_KEY", "key"),
            ("YAHOO_BASE_URL", "ftp://example.com"),
        ]))
        .unwrap_err();

        assert!(err.to_string().contains("YAHOO_BASE_URL"));
    }
}
