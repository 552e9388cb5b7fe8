//! Caller-supplied cancellation: an explicit token plus an optional deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Why a [`Context`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// The token was cancelled explicitly.
    Cancelled,
    /// The context deadline passed.
    DeadlineExceeded,
}

impl From<Cancellation> for Error {
    fn from(c: Cancellation) -> Self {
        match c {
            Cancellation::Cancelled => Error::Cancelled,
            Cancellation::DeadlineExceeded => Error::DeadlineExceeded,
        }
    }
}

/// Cancellation context threaded through every blocking operation.
///
/// Cloning shares the same token; [`Context::child`] derives a token that is
/// cancelled with its parent but can also be cancelled on its own.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that only ends when [`Context::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Add a deadline. An existing earlier deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Some` once the context has ended. Explicit cancellation wins over an
    /// expired deadline when both hold.
    pub fn err(&self) -> Option<Cancellation> {
        if self.token.is_cancelled() {
            return Some(Cancellation::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancellation::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve when the context ends.
    pub async fn done(&self) -> Cancellation {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Cancellation::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Cancellation::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Cancellation::Cancelled
            }
        }
    }

    /// Sleep for `duration` unless the context ends first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancellation> {
        self.run(tokio::time::sleep(duration)).await
    }

    /// Drive `fut` to completion unless the context ends first.
    ///
    /// An already-ended context returns immediately without polling `fut`.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancellation> {
        if let Some(cause) = self.err() {
            return Err(cause);
        }
        tokio::select! {
            biased;
            cause = self.done() => Err(cause),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_context_is_live() {
        let ctx = Context::new();
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn cancelled_context_skips_future() {
        let ctx = Context::new();
        ctx.cancel();
        let polled = std::sync::atomic::AtomicBool::new(false);
        let res = ctx
            .run(async { polled.store(true, std::sync::atomic::Ordering::SeqCst) })
            .await;
        assert_eq!(res, Err(Cancellation::Cancelled));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_sleep() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        let start = Instant::now();
        let res = ctx.sleep(Duration::from_secs(60)).await;
        assert_eq!(res, Err(Cancellation::DeadlineExceeded));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(ctx.err(), Some(Cancellation::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let res = ctx.sleep(Duration::from_secs(60)).await;
        assert_eq!(res, Err(Cancellation::Cancelled));
    }

    #[tokio::test]
    async fn external_token_ends_context() {
        let token = CancellationToken::new();
        let ctx = Context::from_token(token.clone());
        assert!(!ctx.token().is_cancelled());
        assert_eq!(ctx.deadline(), None);

        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        };
        token.cancel();
        assert_eq!(waiter.await.unwrap(), Cancellation::Cancelled);
        assert!(ctx.token().is_cancelled());
        assert_eq!(ctx.err(), Some(Cancellation::Cancelled));
    }

    #[test]
    fn earlier_deadline_is_kept() {
        let now = Instant::now();
        let ctx = Context::new()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }

    #[test]
    fn child_follows_parent_but_not_vice_versa() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert_eq!(parent.err(), None);

        let child = parent.child();
        parent.cancel();
        assert_eq!(child.err(), Some(Cancellation::Cancelled));
    }

    #[test]
    fn cancellation_maps_to_error() {
        assert!(matches!(Error::from(Cancellation::Cancelled), Error::Cancelled));
        assert!(matches!(
            Error::from(Cancellation::DeadlineExceeded),
            Error::DeadlineExceeded
        ));
    }
}
