//! Fixed-interval background tasks
//!
//! Each task runs its job, waits for the next tick, and repeats. The job is
//! awaited before the next tick is taken, so a task never overlaps itself, and
//! ticks missed while a slow run was in progress are skipped.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a scheduled task. Dropping it stops the task.
pub struct ScheduledTask {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Stop scheduling new ticks; a run in progress sees the token cancelled.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(task = self.name, error = %e, "scheduled task ended abnormally");
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `job` every `interval` until cancelled.
///
/// The first run happens one interval after scheduling. `job` receives the
/// task's token so long runs can stop at an item boundary.
pub fn schedule<F, Fut>(name: &'static str, interval: Duration, job: F) -> ScheduledTask
where
    F: Fn(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;
        tracing::debug!(task = name, ?interval, "scheduled task started");

        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                _ = ticker.tick() => {
                    job(task_token.clone()).await;
                }
            }
        }

        tracing::debug!(task = name, "scheduled task stopped");
    });

    ScheduledTask {
        name,
        token,
        handle: Some(handle),
    }
}
