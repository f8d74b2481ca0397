use crate::peer::PeerError;
use std::future::Future;
use tokio::time::Duration;

#[derive(Copy, Clone, Debug)]
pub(crate) struct RetryPolicy {
    pub attempts: usize,
    pub backoff: Duration,
}

/// Run `call` until it succeeds, fails with a non-retryable error, or `policy.attempts` is used
/// up. The backoff doubles after each failed attempt.
pub(crate) async fn with_retry<T, F, Fut>(
    logger: &slog::Logger,
    policy: RetryPolicy,
    what: &str,
    mut call: F,
) -> Result<T, PeerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PeerError>>,
{
    let mut backoff = policy.backoff;
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts && e.is_retryable() => {
                slog::debug!(logger, "{} failed on attempt {}: {}. Retrying.", what, attempt, e);
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
