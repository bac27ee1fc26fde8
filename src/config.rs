//! Controller configuration read from the environment

use std::time::Duration;

use crate::{Error, Result};

/// Default namespace watched by the controller
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default timeout for fetching website content
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay before resubscribing a terminated watch
pub const DEFAULT_WATCH_BACKOFF: Duration = Duration::from_secs(5);

/// Runtime configuration, built once at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace whose DummySites are reconciled
    pub namespace: String,
    /// Prefix of `status.url`; empty yields `/<name>`
    pub public_base_url: String,
    /// Port of the metrics and health server
    pub metrics_port: u16,
    /// Timeout for a single content fetch
    pub fetch_timeout: Duration,
    /// Fixed delay between watch subscriptions
    pub watch_backoff: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            public_base_url: String::new(),
            metrics_port: DEFAULT_METRICS_PORT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            watch_backoff: DEFAULT_WATCH_BACKOFF,
        }
    }
}

impl ControllerConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let namespace = get("NAMESPACE").unwrap_or(defaults.namespace);
        let public_base_url = get("PUBLIC_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.public_base_url);

        let metrics_port = match get("METRICS_PORT") {
            Some(v) => parse_number::<u16>("METRICS_PORT", &v)?,
            None => defaults.metrics_port,
        };
        let fetch_timeout = match get("FETCH_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("FETCH_TIMEOUT_SECS", &v)?),
            None => defaults.fetch_timeout,
        };
        let watch_backoff = match get("WATCH_BACKOFF_SECS") {
            Some(v) => Duration::from_secs(parse_number("WATCH_BACKOFF_SECS", &v)?),
            None => defaults.watch_backoff,
        };

        Ok(Self {
            namespace,
            public_base_url,
            metrics_port,
            fetch_timeout,
            watch_backoff,
        })
    }

    /// Externally reachable URL of a ready DummySite
    pub fn site_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base_url, name)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{} must be a number, got '{}': {}", key, value, e)))
}
