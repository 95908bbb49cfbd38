//! Connection settings for the tool.
//!
//! Every flag can also be supplied through the environment (after `.env` is
//! loaded); flags win over the environment.

mod dependencies;

pub use dependencies::Dependencies;

use std::str::FromStr;
use std::time::Duration;

use clap::Args;
use es_repository::config::DEFAULT_ENDPOINT;
use es_repository::{ElasticClientConfig, RetryPolicy};

/// How session construction reacts to an unreachable cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection every retry interval until it succeeds.
    Retry,
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(Self::FailFast),
            "retry" => Ok(Self::Retry),
            other => Err(format!(
                "invalid connection mode '{}', expected 'fail-fast' or 'retry'",
                other
            )),
        }
    }
}

/// Cluster connection flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Cluster endpoint.
    #[arg(long = "url", env = "ES_URL", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Basic-auth username. Credentials are only sent when this is set.
    #[arg(long, env = "ES_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Seconds between health checks. Zero disables them.
    #[arg(long, env = "ES_HEALTH_CHECK_INTERVAL_SECS", default_value_t = 60)]
    pub health_check_interval_secs: u64,

    /// Discover cluster nodes and round-robin between them.
    #[arg(long, env = "ES_SNIFF")]
    pub sniff: bool,

    #[arg(long, env = "ES_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Retries for transient request failures.
    #[arg(long, env = "ES_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: usize,

    /// `fail-fast` or `retry`.
    #[arg(long, env = "ES_CONNECTION_MODE", default_value = "fail-fast")]
    pub connection_mode: ConnectionMode,

    #[arg(long, env = "ES_RETRY_INTERVAL_SECS", default_value_t = 15)]
    pub retry_interval_secs: u64,
}

impl ConnectionArgs {
    /// Library configuration for these settings.
    pub fn client_config(&self) -> ElasticClientConfig {
        let mut config = ElasticClientConfig::new(self.endpoint.clone())
            .with_sniff(self.sniff)
            .with_health_check_interval(Duration::from_secs(self.health_check_interval_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_retry(RetryPolicy::with_max_retries(self.max_retries));

        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            config = config.with_basic_auth(username, self.password.clone().unwrap_or_default());
        }

        config
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConnectionArgs {
        ConnectionArgs {
            endpoint: "http://search:9200".to_string(),
            username: None,
            password: None,
            health_check_interval_secs: 10,
            sniff: true,
            request_timeout_secs: 5,
            max_retries: 2,
            connection_mode: ConnectionMode::FailFast,
            retry_interval_secs: 1,
        }
    }

    #[test]
    fn test_connection_mode_parsing() {
        assert_eq!("fail-fast".parse::<ConnectionMode>(), Ok(ConnectionMode::FailFast));
        assert_eq!("FAIL_FAST".parse::<ConnectionMode>(), Ok(ConnectionMode::FailFast));
        assert_eq!("Retry".parse::<ConnectionMode>(), Ok(ConnectionMode::Retry));
        assert!("sometimes".parse::<ConnectionMode>().is_err());
    }

    #[test]
    fn test_client_config_from_args() {
        let config = args().client_config();

        assert_eq!(config.endpoint, "http://search:9200");
        assert!(config.sniff);
        assert_eq!(config.health_check_interval, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_credentials_require_username() {
        let mut with_user = args();
        with_user.username = Some("elastic".to_string());
        with_user.password = Some("secret".to_string());
        assert_eq!(
            with_user.client_config().credentials(),
            Some(("elastic".to_string(), "secret".to_string()))
        );

        let mut password_only = args();
        password_only.password = Some("secret".to_string());
        assert!(password_only.client_config().credentials().is_none());
    }
}
