//! Context implementation for request-scoped data and cancellation
//!
//! A Context carries a deadline, a cancellation signal and typed values across
//! async boundaries. Contexts form a tree: a child derived with
//! [`Context::with_timeout`] is cancelled when its parent is, and never outlives
//! the parent's deadline. The gRPC layer derives one child per RPC from a root
//! that StopProvider cancels.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};

/// Context carries request-scoped values like cancellation signals, timeouts, and metadata
/// Pass this as first parameter to all async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
    cancel_tx: watch::Sender<bool>,
    parent: Option<Context>,
}

impl Context {
    pub fn new() -> Self {
        let (cancel_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                values: HashMap::new(),
                cancel_tx,
                parent: None,
            }),
        }
    }

    /// Derive a child that expires after `timeout`, or at the parent's
    /// deadline if that comes first
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut deadline = Instant::now() + timeout;
        if let Some(parent_deadline) = self.inner.deadline {
            deadline = deadline.min(parent_deadline);
        }

        let (cancel_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                values: self.inner.values.clone(),
                cancel_tx,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Derive a child carrying an additional value
    pub fn with_value<T: Send + Sync + 'static>(&self, key: &str, value: T) -> Self {
        let mut values = self.inner.values.clone();
        values.insert(key.to_string(), Arc::new(value));

        let (cancel_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: self.inner.deadline,
                values,
                cancel_tx,
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn get_value<T>(&self, key: &str) -> Option<T>
    where
        T: Send + Sync + Clone + 'static,
    {
        self.inner
            .values
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn is_cancelled(&self) -> bool {
        if *self.inner.cancel_tx.borrow() {
            return true;
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        self.inner
            .parent
            .as_ref()
            .map(|p| p.is_cancelled())
            .unwrap_or(false)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Resolves once this context, or any ancestor, is cancelled or expires
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let ctx = self.clone();

        Box::pin(async move {
            let mut rx = ctx.inner.cancel_tx.subscribe();
            let deadline = ctx.inner.deadline;
            let parent = ctx.inner.parent.clone();

            let own = async move {
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            };
            let expiry = async move {
                match deadline {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let upstream = async move {
                match parent {
                    Some(parent) => parent.cancelled().await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = own => {}
                _ = expiry => {}
                _ = upstream => {}
            }
        })
    }

    pub fn cancel(&self) {
        self.inner.cancel_tx.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("values", &self.inner.values.len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_stores_and_retrieves_values() {
        let ctx = Context::new().with_value("region", "cn-qingdao-env66-d01".to_string());

        let value: Option<String> = ctx.get_value("region");
        assert_eq!(value, Some("cn-qingdao-env66-d01".to_string()));

        let child = ctx.with_timeout(Duration::from_secs(5));
        let inherited: Option<String> = child.get_value("region");
        assert_eq!(inherited, Some("cn-qingdao-env66-d01".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(100));

        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(150)).await;

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();

        assert!(!ctx.is_cancelled());

        ctx.cancel();

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancel_reaches_children() {
        let root = Context::new();
        let child = root.with_timeout(Duration::from_secs(60));

        let waiter = tokio::spawn({
            let child = child.clone();
            async move { child.cancelled().await }
        });

        root.cancel();
        waiter.await.unwrap();
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn child_deadline_never_exceeds_parent() {
        let parent = Context::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(10));

        assert_eq!(child.deadline(), parent.deadline());
        assert!(child.remaining().unwrap() <= Duration::from_secs(1));

        child.cancelled().await;
        assert!(parent.is_cancelled());
    }

    #[tokio::test]
    async fn context_deadline() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());

        let ctx_with_timeout = ctx.with_timeout(Duration::from_secs(1));
        assert!(ctx_with_timeout.deadline().is_some());
    }
}
