//! Polling helpers for eventually consistent resources

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::error::{Result, ScwError};

/// How long to wait and how often to poll
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl WaitOptions {
    pub fn new(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            timeout,
            retry_interval,
        }
    }
}

/// Poll `fetch` until `done` accepts the returned value.
///
/// Errors from `fetch` abort the wait immediately.
pub async fn wait_for<T, F, Fut>(
    what: &str,
    options: WaitOptions,
    mut fetch: F,
    done: impl Fn(&T) -> bool,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + options.timeout;

    loop {
        let value = fetch().await?;
        if done(&value) {
            return Ok(value);
        }

        if Instant::now() + options.retry_interval > deadline {
            return Err(ScwError::Timeout {
                what: what.to_string(),
                seconds: options.timeout.as_secs(),
            });
        }

        tracing::debug!("waiting for {}", what);
        tokio::time::sleep(options.retry_interval).await;
    }
}

/// Poll `fetch` until it fails with a 404
pub async fn wait_for_deletion<T, F, Fut>(
    what: &str,
    options: WaitOptions,
    mut fetch: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let result = wait_for(
        what,
        options,
        || {
            let fut = fetch();
            async move {
                match fut.await {
                    Ok(_) => Ok(false),
                    Err(e) if e.is_not_found() => Ok(true),
                    Err(e) => Err(e),
                }
            }
        },
        |gone| *gone,
    )
    .await;

    result.map(|_| ())
}
