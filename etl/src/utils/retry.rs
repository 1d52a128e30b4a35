use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Sleeps for `base_ms` plus a random jitter of up to `max_jitter_ms`.
pub async fn sleep_with_jitter(base_ms: u64, max_jitter_ms: u64) {
    let jitter = if max_jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=max_jitter_ms)
    };
    tokio::time::sleep(Duration::from_millis(base_ms + jitter)).await;
}

pub async fn retry_with_backoff<T, F, Fut>(
    mut retries: u32,
    base_delay_ms: u64,
    operation: F,
) -> common::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = common::Result<T>>,
{
    let mut delay = base_delay_ms;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if retries == 0 {
                    return Err(e);
                }

                warn!(error = %e, retries_left = retries, delay_ms = delay, "Retrying after failure");
                retries -= 1;
                sleep_with_jitter(delay, delay / 2).await;
                delay *= 2;
            }
        }
    }
}
