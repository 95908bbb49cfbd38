//! Session construction for the tool.

use std::sync::Arc;
use std::time::Duration;

use es_repository::{ElasticClientConfig, OpenSearchClient};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{ConnectionArgs, ConnectionMode};
use crate::ToolError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The cluster session, shared by every consumer.
    pub client: Arc<OpenSearchClient>,
}

impl Dependencies {
    /// Connect to the cluster described by `args`.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(ToolError)` - If the cluster is unreachable (only in fail-fast mode)
    pub async fn new(args: &ConnectionArgs) -> Result<Self, ToolError> {
        let config = args.client_config();

        info!(
            endpoint = %config.endpoint,
            sniff = config.sniff,
            connection_mode = ?args.connection_mode,
            retry_interval_secs = args.retry_interval_secs,
            "Initializing dependencies"
        );

        let client =
            Self::connect(&config, args.connection_mode, args.retry_interval()).await?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Connect with retry logic based on connection mode.
    async fn connect(
        config: &ElasticClientConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchClient, ToolError> {
        loop {
            match OpenSearchClient::connect(config).await {
                Ok(client) => return Ok(client),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(ToolError::config(format!(
                            "Failed to connect to {}: {}",
                            config.endpoint, e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            endpoint = %config.endpoint,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to cluster, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}
