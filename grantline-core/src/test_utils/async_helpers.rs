//! Async test helpers

use std::future::Future;
use tokio::time::{sleep, timeout, Duration};

/// Poll interval for `eventually`
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default bound for conditions that depend on background tasks
pub const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Wait until `condition` holds, panicking after `EVENTUALLY_TIMEOUT`
pub async fn eventually<F, Fut>(condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    eventually_within(EVENTUALLY_TIMEOUT, condition).await
}

pub async fn eventually_within<F, Fut>(duration: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = timeout(duration, async {
        while !condition().await {
            sleep(POLL_INTERVAL).await;
        }
    })
    .await;

    if waited.is_err() {
        panic!("Condition not met within {:?}", duration);
    }
}

/// Assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}
