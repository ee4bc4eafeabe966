//! Wait for an asynchronous operation to reach a target status

use std::future::Future;
use std::time::Duration;
use tfplug::Context;
use tokio::time::{self, Instant};

use super::error::{ApiError, Result};

/// What a refresh observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    Found(String),
    Gone,
}

/// Polls a refresh function at a fixed interval.
///
/// An empty target set means "wait until the object is gone".
#[derive(Debug, Clone)]
pub struct StateConf {
    target: Vec<String>,
    pending: Vec<String>,
    fail: Vec<String>,
    timeout: Duration,
    interval: Duration,
    delay: Duration,
}

impl StateConf {
    pub fn new(target: &[&str]) -> Self {
        Self {
            target: to_strings(target),
            pending: Vec::new(),
            fail: Vec::new(),
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(3),
            delay: Duration::ZERO,
        }
    }

    pub fn pending(mut self, pending: &[&str]) -> Self {
        self.pending = to_strings(pending);
        self
    }

    pub fn fail(mut self, fail: &[&str]) -> Self {
        self.fail = to_strings(fail);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the terminal status, or an empty string when the object is gone
    pub async fn wait<F, Fut>(&self, ctx: &Context, mut refresh: F) -> Result<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refresh>>,
    {
        let mut deadline = Instant::now() + self.timeout;
        if let Some(ctx_deadline) = ctx.deadline() {
            deadline = deadline.min(ctx_deadline);
        }

        if !self.delay.is_zero() {
            self.sleep(ctx, Instant::now() + self.delay, deadline).await?;
        }

        loop {
            let observed = tokio::select! {
                biased;
                observed = time::timeout_at(deadline, refresh()) => observed,
                _ = ctx.cancelled() => return Err(ApiError::Cancelled),
            };

            match observed {
                Err(_) => return Err(self.timed_out()),
                Ok(Err(err)) => return Err(err),
                Ok(Ok(Refresh::Gone)) => {
                    if self.target.is_empty() {
                        return Ok(String::new());
                    }
                    tracing::debug!(target_states = ?self.target, "object not found yet");
                }
                Ok(Ok(Refresh::Found(state))) => {
                    if self.target.contains(&state) {
                        return Ok(state);
                    }
                    if self.fail.contains(&state)
                        || (!self.pending.is_empty() && !self.pending.contains(&state))
                    {
                        return Err(ApiError::UnexpectedState {
                            state,
                            target: self.target.clone(),
                        });
                    }
                    tracing::debug!(state = %state, target_states = ?self.target, "still waiting");
                }
            }

            self.sleep(ctx, Instant::now() + self.interval, deadline).await?;
        }
    }

    async fn sleep(&self, ctx: &Context, wake: Instant, deadline: Instant) -> Result<()> {
        if wake >= deadline {
            return Err(self.timed_out());
        }
        tokio::select! {
            biased;
            _ = time::sleep_until(wake) => Ok(()),
            _ = ctx.cancelled() => Err(ApiError::Cancelled),
        }
    }

    fn timed_out(&self) -> ApiError {
        let action = if self.target.is_empty() {
            "waiting for deletion".to_string()
        } else {
            format!("waiting for status {}", self.target.join("|"))
        };
        ApiError::Timeout {
            action,
            timeout: self.timeout,
            last: None,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
