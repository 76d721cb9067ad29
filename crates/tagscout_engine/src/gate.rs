use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Minimum spacing between two home-instance known-entity checks.
pub const KNOWN_CHECK_SPACING: Duration = Duration::from_millis(220);

/// Runs one task at a time, in arrival order, keeping at least `spacing`
/// between the end of one task and the start of the next.
///
/// Waiters queue on a fair mutex, so the order is first-in first-out. A task
/// that fails, panics or is dropped still releases the gate.
#[derive(Debug)]
pub struct ThrottleGate {
    spacing: Duration,
    last_finished: Mutex<Option<Instant>>,
}

impl ThrottleGate {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_finished: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    pub async fn run<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        self.run_unless(|| None, task).await
    }

    /// Like [`run`](Self::run), but asks `settled` first once the gate is
    /// held. An answer from `settled` is returned at once: nothing waits and
    /// the spacing of the next task still counts from the last task that ran.
    pub async fn run_unless<S, F>(&self, settled: S, task: F) -> F::Output
    where
        S: FnOnce() -> Option<F::Output>,
        F: Future,
    {
        let mut last_finished = self.last_finished.lock().await;
        if let Some(output) = settled() {
            return output;
        }
        if let Some(finished) = *last_finished {
            sleep_until(finished + self.spacing).await;
        }
        let output = task.await;
        *last_finished = Some(Instant::now());
        output
    }
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(KNOWN_CHECK_SPACING)
    }
}
