use super::error::{MqError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Cancellation scope for blocking operations.
///
/// Wraps a cancellation token and an optional deadline. Cancelling a context
/// cancels every context derived from it, never its parent.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a child that can be cancelled independently of this context.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a child that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child that expires at `deadline`, or earlier if this context does.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<MqError> {
        if self.token.is_cancelled() {
            return Some(MqError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(MqError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> MqError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => MqError::Canceled,
                _ = sleep_until(deadline) => MqError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                MqError::Canceled
            }
        }
    }

    /// Runs `fut` bounded by this context.
    ///
    /// A result that is ready at the same time the context ends wins.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            result = fut => result,
            err = self.done() => Err(err),
        }
    }
}
