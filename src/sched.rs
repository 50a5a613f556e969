//! Cancellable delayed-task scheduling.
//!
//! The session store arms a refresh timer after every token acquisition and
//! must be able to cancel and re-arm it at any time. Platform timer handles
//! are hidden behind [`Scheduler`] so the core works the same under tokio,
//! in tests with a manual scheduler, or in a browser host.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;

/// Opaque handle to a scheduled task. Cancelling a handle whose task already
/// ran is a no-op.
pub struct TaskHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TaskHandle {
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Handle that cancels nothing. Useful for schedulers that run tasks
    /// inline.
    #[must_use]
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Runs a task once after a delay, returning a cancellation handle.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TaskHandle;
}

/// [`Scheduler`] backed by `tokio::time`. Must be used from within a tokio
/// runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> TaskHandle {
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        TaskHandle::new(move || join.abort())
    }
}

#[cfg(test)]
#[path = "sched_test.rs"]
mod tests;
