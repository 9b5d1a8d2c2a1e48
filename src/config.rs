//! Runtime configuration.
//!
//! Credentials and connection settings are parsed once at startup from CLI
//! flags (falling back to environment variables) into an immutable
//! [`Config`] that is handed to the client.

use std::fmt;
use std::time::Duration;

use clap::ValueEnum;

use crate::error::{AmplitudeError, Result};

pub const US_BASE_URL: &str = "https://amplitude.com";
pub const EU_BASE_URL: &str = "https://analytics.eu.amplitude.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Amplitude data residency region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    pub fn base_url(self) -> &'static str {
        match self {
            Region::Us => US_BASE_URL,
            Region::Eu => EU_BASE_URL,
        }
    }
}

/// Connection flags shared by the stdio and HTTP servers.
///
/// A flag given on the command line wins over its environment variable.
#[derive(clap::Args, Clone)]
pub struct AmplitudeArgs {
    /// Amplitude project API key
    #[arg(long, env = "AMPLITUDE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Amplitude project secret key
    #[arg(long, env = "AMPLITUDE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Data residency region (selects the default API host)
    #[arg(long, env = "AMPLITUDE_REGION", value_enum, default_value = "us")]
    pub region: Region,

    /// Override the API host entirely (e.g. a proxy)
    #[arg(long, env = "AMPLITUDE_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds (0 disables the timeout)
    #[arg(long, env = "AMPLITUDE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

/// API key / secret key pair used for Basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let secret_key = secret_key.into();
        if api_key.trim().is_empty() {
            return Err(AmplitudeError::config(
                "API key is required (--api-key or AMPLITUDE_API_KEY)",
            ));
        }
        if secret_key.trim().is_empty() {
            return Err(AmplitudeError::config(
                "secret key is required (--secret-key or AMPLITUDE_SECRET_KEY)",
            ));
        }
        Ok(Self {
            api_key,
            secret_key,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

// Never print the keys themselves.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn new(credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_args(args: &AmplitudeArgs) -> Result<Self> {
        let credentials = Credentials::new(
            args.api_key.clone().unwrap_or_default(),
            args.secret_key.clone().unwrap_or_default(),
        )?;

        let base_url = match args.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(AmplitudeError::config(format!(
                        "base URL must start with http:// or https://, got '{}'",
                        url
                    )));
                }
                url.to_string()
            }
            _ => args.region.base_url().to_string(),
        };

        let timeout = match args.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Config::new(credentials, base_url).with_timeout(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> AmplitudeArgs {
        AmplitudeArgs {
            api_key: Some("key".to_string()),
            secret_key: Some("secret".to_string()),
            region: Region::Us,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    #[test]
    fn test_region_selects_host() {
        let mut a = args();
        assert_eq!(Config::from_args(&a).unwrap().base_url, US_BASE_URL);

        a.region = Region::Eu;
        assert_eq!(Config::from_args(&a).unwrap().base_url, EU_BASE_URL);
    }

    #[test]
    fn test_base_url_override_wins() {
        let mut a = args();
        a.region = Region::Eu;
        a.base_url = Some("http://localhost:9999/".to_string());
        let config = Config::from_args(&a).unwrap();
        assert_eq!(config.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut a = args();
        a.secret_key = None;
        let err = Config::from_args(&a).unwrap_err();
        assert!(err.to_string().contains("secret key is required"));

        let mut a = args();
        a.api_key = Some("  ".to_string());
        assert!(Config::from_args(&a).is_err());
    }

    #[test]
    fn test_zero_timeout_disables() {
        let mut a = args();
        a.timeout_secs = 0;
        assert!(Config::from_args(&a).unwrap().timeout.is_none());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("visible-key", "visible-secret").unwrap();
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("visible-key"));
        assert!(!printed.contains("visible-secret"));
    }
}
