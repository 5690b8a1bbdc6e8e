pub use config::ConfigError;

use crate::proxy::types::{LogLimit, ProxyConfig};
use crate::proxy::url_resolver::Target;
use crate::{Error, Result};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const ENV_PREFIX: &str = "PEEPHOLE";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub proxy: ProxySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    /// Absolute URL used when a request names no target
    pub default_target: Option<String>,
    pub log_limit: i64,
    /// Zero disables the explicit upstream timeout
    pub upstream_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Settings {
    pub fn new() -> std::result::Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Self::with_defaults(&environment)?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults plus explicit overrides, without touching files or the
    /// process environment
    pub fn from_overrides(overrides: &[(&str, &str)]) -> std::result::Result<Self, ConfigError> {
        let mut builder = Self::with_defaults("test")?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize()
    }

    fn with_defaults(
        environment: &str,
    ) -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Start with default values
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 8080)?
            .set_default("application.environment", environment)?
            .set_default("proxy.log_limit", 1000)?
            .set_default("proxy.upstream_timeout_ms", 30_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")
    }

    /// Proxy settings validated into the proxy's own configuration
    pub fn proxy_config(&self) -> Result<ProxyConfig> {
        let default_target = match self.proxy.default_target.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                Target::parse(raw).map_err(|e| Error::invalid_default_target(raw, e))?,
            ),
        };

        Ok(ProxyConfig {
            default_target,
            log_limit: LogLimit::from_configured(self.proxy.log_limit),
            upstream_timeout: match self.proxy.upstream_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.application.host, self.application.port);
        addr.parse()
            .map_err(|_| Error::InvalidListenAddress(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_overrides(&[]).unwrap();
        assert_eq!(settings.application.host, "0.0.0.0");
        assert_eq!(settings.application.port, 8080);
        assert_eq!(settings.proxy.log_limit, 1000);
        assert!(settings.proxy.default_target.is_none());
        assert_eq!(settings.logging.level, "info");

        let proxy = settings.proxy_config().unwrap();
        assert!(proxy.default_target.is_none());
        assert_eq!(*proxy.log_limit.as_ref(), 1000);
        assert_eq!(proxy.upstream_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_listen_addr() {
        let settings =
            Settings::from_overrides(&[("application.host", "127.0.0.1"), ("application.port", "9090")])
                .unwrap();
        assert_eq!(settings.listen_addr().unwrap(), "127.0.0.1:9090".parse().unwrap());
    }

    #[test]
    fn test_invalid_listen_host() {
        let settings = Settings::from_overrides(&[("application.host", "not a host")]).unwrap();
        assert!(matches!(
            settings.listen_addr(),
            Err(Error::InvalidListenAddress(_))
        ));
    }

    #[test]
    fn test_non_positive_log_limit_falls_back() {
        for value in ["0", "-5"] {
            let settings = Settings::from_overrides(&[("proxy.log_limit", value)]).unwrap();
            assert_eq!(*settings.proxy_config().unwrap().log_limit.as_ref(), 1000);
        }
        let settings = Settings::from_overrides(&[("proxy.log_limit", "25")]).unwrap();
        assert_eq!(*settings.proxy_config().unwrap().log_limit.as_ref(), 25);
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let settings = Settings::from_overrides(&[("proxy.upstream_timeout_ms", "0")]).unwrap();
        assert_eq!(settings.proxy_config().unwrap().upstream_timeout, None);
    }

    #[test]
    fn test_default_target_is_validated() {
        let settings =
            Settings::from_overrides(&[("proxy.default_target", "http://api.internal:9000/v1")])
                .unwrap();
        let target = settings.proxy_config().unwrap().default_target.unwrap();
        assert_eq!(target.as_str(), "http://api.internal:9000/v1");

        let settings = Settings::from_overrides(&[("proxy.default_target", "api.internal")]).unwrap();
        assert!(matches!(
            settings.proxy_config(),
            Err(Error::InvalidDefaultTarget { .. })
        ));
    }
}
