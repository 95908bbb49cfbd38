//! Configuration types for the Elasticsearch session.

use std::fmt;
use std::time::Duration;

/// Default cluster endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9200";

/// Default interval between health checks (and node reseeding when sniffing).
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backoff policy for transient failures.
///
/// Delays grow exponentially from `initial_delay` and are capped at
/// `max_delay`; each delay is jittered. Only transient failures (network
/// errors, throttling and gateway statuses) are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Number of retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(128),
            max_delay: Duration::from_millis(513),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Default delays with a custom number of retries.
    pub fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Connection settings for an [`OpenSearchClient`](crate::OpenSearchClient) session.
///
/// The session is built once per process from this config and then shared.
#[derive(Clone)]
pub struct ElasticClientConfig {
    /// Cluster URL including scheme and port.
    pub endpoint: String,
    /// Basic auth username. Credentials are only sent when this is set and non-empty.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Interval for the background health check and, when sniffing, node reseeding.
    pub health_check_interval: Duration,
    /// Discover cluster nodes and round-robin between them.
    pub sniff: bool,
    /// Timeout applied to every request.
    pub request_timeout: Duration,
    /// Backoff policy for transient failures.
    pub retry: RetryPolicy,
}

impl Default for ElasticClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            username: None,
            password: None,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            sniff: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl ElasticClientConfig {
    /// Default settings against the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_sniff(mut self, sniff: bool) -> Self {
        self.sniff = sniff;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Username and password when basic auth is configured.
    pub fn credentials(&self) -> Option<(String, String)> {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => Some((
                username.to_string(),
                self.password.clone().unwrap_or_default(),
            )),
            _ => None,
        }
    }
}

impl fmt::Debug for ElasticClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticClientConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("health_check_interval", &self.health_check_interval)
            .field("sniff", &self.sniff)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
