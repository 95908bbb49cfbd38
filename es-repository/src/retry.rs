//! Retry helper for transient transport failures.

use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::errors::ElasticError;

/// Jittered exponential delays for a policy.
///
/// `ExponentialBackoff::from_millis(2)` doubles on every step, so scaling by
/// half the initial delay yields `initial, 2 * initial, 4 * initial, ...`.
pub fn backoff(policy: &RetryPolicy) -> impl Iterator<Item = Duration> + Send {
    let factor = (policy.initial_delay.as_millis() as u64 / 2).max(1);
    ExponentialBackoff::from_millis(2)
        .factor(factor)
        .max_delay(policy.max_delay)
        .map(jitter)
        .take(policy.max_retries)
}

/// Run `action`, retrying failures accepted by `retry_on` according to `policy`.
pub(crate) async fn retry_when<A, F, T, C>(
    policy: &RetryPolicy,
    operation: &'static str,
    action: A,
    mut retry_on: C,
) -> Result<T, ElasticError>
where
    A: FnMut() -> F,
    F: Future<Output = Result<T, ElasticError>>,
    C: FnMut(&ElasticError) -> bool,
{
    RetryIf::start(backoff(policy), action, move |err: &ElasticError| {
        let retry = retry_on(err);
        if retry {
            warn!(operation, error = %err, "Transient failure, retrying");
        }
        retry
    })
    .await
}

/// Run `action`, retrying transient failures according to `policy`.
pub(crate) async fn retry_transient<A, F, T>(
    policy: &RetryPolicy,
    operation: &'static str,
    action: A,
) -> Result<T, ElasticError>
where
    A: FnMut() -> F,
    F: Future<Output = Result<T, ElasticError>>,
{
    retry_when(policy, operation, action, ElasticError::is_transient).await
}
