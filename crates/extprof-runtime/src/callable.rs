//! Type-erased async callables stored in host registration tables

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What every handler, command and tool executor settles to
pub type HandlerResult = anyhow::Result<Value>;

/// Boxed future returned by a [`Callable`]
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

type HandlerFn = dyn Fn(Value) -> HandlerFuture + Send + Sync;

/// A cloneable async callable.
///
/// Clones share the same underlying function, so identity survives being
/// copied in and out of registration tables. Callables produced by
/// [`crate::TimingWrapper`] carry a timed marker that makes re-wrapping a
/// no-op.
#[derive(Clone)]
pub struct Callable {
    func: Arc<HandlerFn>,
    timed: bool,
}

impl Callable {
    /// Build a callable from an async function or closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            func: Arc::new(move |args| Box::pin(f(args)) as HandlerFuture),
            timed: false,
        }
    }

    /// Build a callable from a function that already returns a boxed future.
    ///
    /// Work done before the future is returned runs at call time.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Value) -> HandlerFuture + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            timed: false,
        }
    }

    pub(crate) fn timed<F>(f: F) -> Self
    where
        F: Fn(Value) -> HandlerFuture + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            timed: true,
        }
    }

    /// Invoke the callable
    pub fn call(&self, args: Value) -> HandlerFuture {
        (self.func)(args)
    }

    /// Whether this callable was produced by the timing wrapper
    #[must_use]
    pub fn is_timed(&self) -> bool {
        self.timed
    }

    /// Whether both handles point at the same function
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.func, &b.func)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("timed", &self.timed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_call_forwards_arguments() {
        let echo = Callable::new(|args| async move { Ok(args) });
        let out = echo.call(json!({"k": 1})).await.unwrap();
        assert_eq!(out, json!({"k": 1}));
        assert!(!echo.is_timed());
    }

    #[test]
    fn test_clones_share_identity() {
        let a = Callable::new(|_| async { Ok(Value::Null) });
        let b = a.clone();
        let c = Callable::new(|_| async { Ok(Value::Null) });
        assert!(Callable::ptr_eq(&a, &b));
        assert!(!Callable::ptr_eq(&a, &c));
    }
}
