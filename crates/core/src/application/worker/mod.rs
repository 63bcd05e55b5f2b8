// Worker - Background task harness (one-shot and interval tasks)

pub mod constants;
mod panic_guard;
mod shutdown;

pub use panic_guard::{execute_guarded, panic_message, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::lifecycle::{CloseStack, Closer};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of a single task invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// Handler returned a non-cancellation error (logged, not fatal)
    Failed,
    /// Handler reported cancellation; repeating tasks stop
    Cancelled,
    Panicked,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tracker {
    in_flight: usize,
    closed: bool,
}

/// Decrements the in-flight counter when the execution unit ends,
/// whatever the way it ends
struct InFlightGuard {
    tracker: Arc<watch::Sender<Tracker>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.send_modify(|state| state.in_flight -= 1);
    }
}

/// Worker runs named background tasks with uniform logging, panic isolation
/// and shutdown tracking
///
/// `close` waits for every execution unit launched through `run` or
/// `run_with_interval`. It does not cancel anything: the owner cancels the
/// shared `ShutdownToken` before or while closing.
pub struct Worker {
    tracker: Arc<watch::Sender<Tracker>>,
}

impl Worker {
    /// Create a worker and register it for ordered teardown
    pub fn new(closers: &CloseStack) -> Arc<Self> {
        let (tracker, _) = watch::channel(Tracker::default());
        let worker = Arc::new(Self {
            tracker: Arc::new(tracker),
        });
        closers.push("background worker", worker.clone());
        worker
    }

    /// Number of execution units that have not completed yet
    pub fn in_flight(&self) -> usize {
        self.tracker.borrow().in_flight
    }

    /// Launch `handler` once on a new task
    ///
    /// # Errors
    /// - AppError::InvalidState if the worker is closing or closed
    pub fn run<F, Fut>(&self, shutdown: &ShutdownToken, name: impl Into<String>, handler: F) -> Result<()>
    where
        F: FnOnce(ShutdownToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let guard = self.enter(&name)?;
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            let _guard = guard;
            Self::invoke(&name, async move { handler(shutdown).await }).await;
        });

        Ok(())
    }

    /// Launch `handler` repeatedly: immediately, then `interval` after each
    /// invocation completes, until shutdown
    ///
    /// A panic or a non-cancellation error is logged and the loop goes on.
    /// An `AppError::Cancelled` returned by the handler stops the loop.
    ///
    /// # Errors
    /// - AppError::InvalidState if the worker is closing or closed
    pub fn run_with_interval<F, Fut>(
        &self,
        shutdown: &ShutdownToken,
        name: impl Into<String>,
        interval: Duration,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(ShutdownToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let guard = self.enter(&name)?;
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            let _guard = guard;
            info!(
                worker = %name,
                interval_ms = interval.as_millis() as u64,
                "Interval worker started"
            );

            loop {
                let token = shutdown.clone();
                let outcome = Self::invoke(&name, async { handler(token).await }).await;
                if outcome == TaskOutcome::Cancelled {
                    info!(worker = %name, "Interval worker stopped by cancellation");
                    break;
                }

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!(worker = %name, "Interval worker stopped");
                        break;
                    }
                    _ = sleep(interval) => {}
                }
            }
        });

        Ok(())
    }

    /// Wait until every launched execution unit has completed
    ///
    /// Idempotent; once called, `run` and `run_with_interval` are refused.
    pub async fn close(&self) -> Result<()> {
        self.tracker.send_modify(|state| state.closed = true);

        let pending = self.in_flight();
        if pending > 0 {
            debug!(in_flight = pending, "Waiting for background tasks");
        }

        let mut rx = self.tracker.subscribe();
        rx.wait_for(|state| state.in_flight == 0)
            .await
            .map_err(|e| AppError::Internal(format!("worker tracker dropped: {}", e)))?;

        debug!("Background worker closed");
        Ok(())
    }

    fn enter(&self, name: &str) -> Result<InFlightGuard> {
        let mut accepted = false;
        self.tracker.send_modify(|state| {
            if !state.closed {
                state.in_flight += 1;
                accepted = true;
            }
        });

        if !accepted {
            warn!(worker = %name, "Refusing task: worker is closed");
            return Err(AppError::InvalidState(format!(
                "worker closed, cannot run '{}'",
                name
            )));
        }

        Ok(InFlightGuard {
            tracker: Arc::clone(&self.tracker),
        })
    }

    /// Run one invocation inside the panic guard and log its outcome
    async fn invoke<Fut>(name: &str, task: Fut) -> TaskOutcome
    where
        Fut: Future<Output = Result<()>>,
    {
        let start = Instant::now();
        debug!(worker = %name, "Worker task started");

        let outcome = match execute_guarded(name, task).await {
            PanicGuardResult::Success(Ok(())) => TaskOutcome::Completed,
            PanicGuardResult::Success(Err(e)) if e.is_cancelled() => {
                info!(worker = %name, "Worker task cancelled");
                TaskOutcome::Cancelled
            }
            PanicGuardResult::Success(Err(e)) => {
                error!(worker = %name, error = %e, "Worker task error");
                TaskOutcome::Failed
            }
            PanicGuardResult::Panicked(_) => TaskOutcome::Panicked,
        };

        debug!(
            worker = %name,
            outcome = ?outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "Worker task finished"
        );
        outcome
    }
}

#[async_trait]
impl Closer for Worker {
    async fn close(&self) -> Result<()> {
        Worker::close(self).await
    }
}
