//! Tracked fire-and-forget work.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn, Instrument};

/// Background tasks spawned by the orchestrators.
///
/// Callers never await these directly, but every task is held in a
/// `JoinSet` so shutdown and tests can wait for (or cancel) all of them.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task inside a span named after it. Finished tasks are
    /// reaped first so a session that never joins stays bounded.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("background", task = name);
        let mut set = self.set.lock();
        Self::reap(&mut set);
        set.spawn(task.instrument(span));
    }

    /// Tasks not yet reaped; finished ones are dropped from the count.
    pub fn pending(&self) -> usize {
        let mut set = self.set.lock();
        Self::reap(&mut set);
        set.len()
    }

    fn reap(set: &mut JoinSet<()>) {
        while let Some(result) = set.try_join_next() {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    warn!(error = %e, "Background task failed");
                }
            }
        }
    }

    /// Wait for every task, including tasks spawned while waiting.
    pub async fn join_all(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.set.lock());
            if batch.is_empty() {
                break;
            }
            debug!(tasks = batch.len(), "Joining background tasks");
            while let Some(result) = batch.join_next().await {
                if let Err(e) = result {
                    if !e.is_cancelled() {
                        warn!(error = %e, "Background task failed");
                    }
                }
            }
        }
    }

    pub fn abort_all(&self) {
        self.set.lock().abort_all();
    }
}
