//! Deferred Completion
//!
//! A deserialization call may finish immediately or have to wait on a
//! caller-supplied hook. Internally every step is a future; at the API
//! boundary the future is polled once and handed back as
//! [`Deferred::Ready`] if it already finished, or as [`Deferred::Pending`]
//! for the caller to await.
//!
//! # How It Works
//!
//! ```rust,ignore
//! match deserializer.deserialize(json) {
//!     Deferred::Ready(result) => use_now(result?),
//!     pending => use_later(pending.await?),
//! }
//! ```
//!
//! Both variants can be awaited, so async callers never need to match.

use std::future::{Future, IntoFuture};
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::task::noop_waker_ref;

/// A result that is either available now or still being computed.
pub enum Deferred<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Deferred<T> {
    /// Wrap a future that still has to be awaited.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    /// Poll `future` once, collapsing it to [`Deferred::Ready`] if it
    /// completed.
    pub fn settle<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut future = future.boxed();
        let mut cx = Context::from_waker(noop_waker_ref());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => Self::Ready(value),
            Poll::Pending => Self::Pending(future),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The value, if it is already available.
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    /// Transform the eventual value.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Self::Ready(value) => Deferred::Ready(f(value)),
            Self::Pending(future) => Deferred::Pending(future.map(f).boxed()),
        }
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Self::Ready(value)
    }
}

impl<T: Send + 'static> IntoFuture for Deferred<T> {
    type Output = T;
    type IntoFuture = BoxFuture<'static, T>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Ready(value) => future::ready(value).boxed(),
            Self::Pending(future) => future,
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Deferred::Ready(..)"),
            Self::Pending(_) => f.write_str("Deferred::Pending(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pending on the first poll, ready on the second.
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    #[test]
    fn immediate_futures_settle_ready() {
        let deferred = Deferred::settle(async { 42 });
        assert!(deferred.is_ready());
        assert_eq!(deferred.ready(), Some(42));
    }

    #[tokio::test]
    async fn waiting_futures_stay_pending() {
        let deferred = Deferred::settle(async {
            YieldOnce(false).await;
            7
        });
        assert!(!deferred.is_ready());
        assert_eq!(deferred.map(|n| n * 2).await, 14);
    }

    #[tokio::test]
    async fn both_variants_can_be_awaited() {
        assert_eq!(Deferred::Ready(1).await, 1);
        assert_eq!(Deferred::pending(async { 2 }).await, 2);
        assert_eq!(Deferred::from(3).into_future().await, 3);
    }
}
