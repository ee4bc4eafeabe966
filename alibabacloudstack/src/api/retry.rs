//! Constant-backoff retry around a single API call

use std::future::Future;
use std::time::Duration;
use tfplug::Context;
use tokio::time::{self, Instant};

use super::error::{ApiError, Result};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Re-invokes an action while it fails with a retryable error.
///
/// An error is retryable when [`ApiError::need_retry`] says so, or when its
/// code is one of the extra codes given through [`Retry::retry_on_codes`].
/// Anything else is returned at once, wrapped with the resource and action.
/// The loop never runs past the timeout or the context deadline, whichever
/// comes first.
#[derive(Debug, Clone)]
pub struct Retry {
    resource: String,
    action: String,
    timeout: Duration,
    interval: Duration,
    extra_codes: Vec<String>,
}

impl Retry {
    pub fn new(resource: &str, action: &str) -> Self {
        Self {
            resource: resource.to_string(),
            action: action.to_string(),
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            extra_codes: Vec::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn retry_on_codes(mut self, codes: &[&str]) -> Self {
        self.extra_codes.extend(codes.iter().map(|code| code.to_string()));
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    fn is_retryable(&self, err: &ApiError) -> bool {
        err.need_retry()
            || err
                .code()
                .map(|code| self.extra_codes.iter().any(|c| c == code))
                .unwrap_or(false)
    }

    pub async fn run<T, F, Fut>(&self, ctx: &Context, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut deadline = Instant::now() + self.timeout;
        if let Some(ctx_deadline) = ctx.deadline() {
            deadline = deadline.min(ctx_deadline);
        }

        let mut attempt: u32 = 0;
        let mut last: Option<ApiError> = None;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                outcome = time::timeout_at(deadline, op()) => outcome,
                _ = ctx.cancelled() => return Err(ApiError::Cancelled),
            };

            match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if self.is_retryable(&err) => {
                    tracing::debug!(
                        resource = %self.resource,
                        action = %self.action,
                        attempt,
                        "retryable error: {}",
                        err
                    );
                    last = Some(err);
                }
                Ok(Err(err)) => return Err(err.wrap(&self.resource, &self.action)),
                Err(_) => return Err(self.timed_out(last)),
            }

            let wake = Instant::now() + self.interval;
            if wake >= deadline {
                return Err(self.timed_out(last));
            }

            tokio::select! {
                biased;
                _ = time::sleep_until(wake) => {}
                _ = ctx.cancelled() => return Err(ApiError::Cancelled),
            }
        }
    }

    fn timed_out(&self, last: Option<ApiError>) -> ApiError {
        ApiError::Timeout {
            action: self.action.clone(),
            timeout: self.timeout,
            last: last.map(Box::new),
        }
        .wrap(&self.resource, &self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn service(code: &str, status: u16) -> ApiError {
        ApiError::Service {
            status,
            code: code.to_string(),
            message: "test".to_string(),
            request_id: "r-0".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_throttling_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = Retry::new("alibabacloudstack_nas_file_system", "CreateFileSystem")
            .run(&Context::new(), || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(service("Throttling.User", 400))
                    } else {
                        Ok("31a8e4")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "31a8e4");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // two constant 3s waits
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_returns_immediately_wrapped() {
        let calls = Arc::new(AtomicU32::new(0));

        let err = Retry::new("alibabacloudstack_quick_bi_user", "AddUser")
            .run(&Context::new(), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(service("InvalidParameter", 400))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.code(), Some("InvalidParameter"));
        assert_eq!(err.action(), Some("AddUser"));
        assert!(err.to_string().contains("alibabacloudstack_quick_bi_user"));
    }

    #[tokio::test(start_paused = true)]
    async fn extra_codes_are_retryable() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = Retry::new("alibabacloudstack_nas_file_system", "CreateFileSystem")
            .retry_on_codes(&["InvalidFileSystemStatus.Ordering"])
            .run(&Context::new(), || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(service("InvalidFileSystemStatus.Ordering", 400))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_within_the_timeout() {
        let started = Instant::now();

        let err = Retry::new("alibabacloudstack_arms_alert_contact_group", "CreateAlertContactGroup")
            .timeout(Duration::from_secs(10))
            .interval(Duration::from_secs(3))
            .run(&Context::new(), || async {
                Err::<(), _>(service("ServiceUnavailable", 503))
            })
            .await
            .unwrap_err();

        assert!(started.elapsed() <= Duration::from_secs(10));
        let text = err.to_string();
        assert!(text.contains("timed out after 10s"), "{}", text);
        assert!(text.contains("ServiceUnavailable"), "{}", text);
    }

    #[tokio::test(start_paused = true)]
    async fn context_deadline_bounds_the_loop() {
        let ctx = Context::new().with_timeout(Duration::from_secs(4));
        let started = Instant::now();

        let err = Retry::new("alibabacloudstack_ecs_ebs_storage_set", "CreateStorageSet")
            .run(&ctx, || async { Err::<(), _>(service("InternalError", 500)) })
            .await
            .unwrap_err();

        assert!(started.elapsed() <= Duration::from_secs(4));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_waiting() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = Retry::new("alibabacloudstack_nas_mount_target", "CreateMountTarget")
            .run(&ctx, || async { Err::<(), _>(service("Throttling", 400)) })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Cancelled));
    }
}
