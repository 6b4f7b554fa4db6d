//! Bounded readiness polling
//!
//! Polls on a fixed interval until a condition holds, failing with
//! `ProvisionError::Timeout` once the bound is exceeded.

use crate::error::ProvisionError;
use aws_client::{CloudProvider, ResourceRef};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Fixed-interval polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Delay between checks
    pub interval: Duration,
    /// Maximum total time to wait
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll `check` until it returns `Ok(true)`.
///
/// Errors from `check` end the wait immediately.
pub async fn wait_for<F, Fut>(config: WaitConfig, what: &str, mut check: F) -> Result<(), ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ProvisionError>>,
{
    let poll = async {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if check().await? {
                debug!(resource = %what, attempts, "Resource ready");
                return Ok(());
            }
            debug!(resource = %what, attempt = attempts, "Resource not ready, retrying");
            tokio::time::sleep(config.interval).await;
        }
    };

    match tokio::time::timeout(config.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(ProvisionError::Timeout {
            what: what.to_string(),
            timeout: config.timeout,
        }),
    }
}

/// Block until an instance reports terminated (or has vanished entirely)
pub async fn wait_until_terminated<P>(
    provider: &P,
    instance: &ResourceRef,
    config: WaitConfig,
) -> Result<(), ProvisionError>
where
    P: CloudProvider + ?Sized,
{
    let what = format!("{instance} to terminate");
    wait_for(config, &what, move || async move {
        match provider.describe(instance).await {
            Ok(status) => Ok(status.is_terminated()),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e.into()),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> WaitConfig {
        WaitConfig {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_once_ready() {
        let counter = AtomicU32::new(0);
        let checks = &counter;
        wait_for(config(), "thing", move || async move {
            Ok(checks.fetch_add(1, Ordering::SeqCst) >= 2)
        })
        .await
        .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let err = wait_for(config(), "never", || async { Ok(false) })
            .await
            .unwrap_err();
        match err {
            ProvisionError::Timeout { what, timeout } => {
                assert_eq!(what, "never");
                assert_eq!(timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_ends_wait() {
        let err = wait_for(config(), "broken", || async {
            Err(ProvisionError::InvalidConfig("boom".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfig(_)));
    }
}
