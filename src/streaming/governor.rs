//! Process-wide limit on concurrent translation jobs.
//!
//! Every translator call goes through [`ConcurrencyGovernor::run`], which
//! waits for a slot on a FIFO-fair semaphore, runs the job on tokio's blocking
//! pool and enforces a time limit measured from when the slot was granted.
//!
//! A timed-out job's slot is released immediately. The blocking thread itself
//! cannot be interrupted and runs to completion in the background; its result
//! is discarded.

use crate::config::GovernorSettings;
use crate::error::{Result, TalkGlobeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Bounds how many translation jobs run at once and how long each may take.
#[derive(Debug)]
pub struct ConcurrencyGovernor {
    semaphore: Arc<Semaphore>,
    max_jobs: usize,
    time_limit: Duration,
    running: AtomicUsize,
}

impl ConcurrencyGovernor {
    /// Creates a governor allowing `max_jobs` concurrent jobs of at most `time_limit` each.
    pub fn new(max_jobs: usize, time_limit: Duration) -> Self {
        let max_jobs = max_jobs.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_jobs)),
            max_jobs,
            time_limit,
            running: AtomicUsize::new(0),
        }
    }

    pub fn from_config(settings: &GovernorSettings) -> Self {
        Self::new(
            settings.max_concurrent_jobs,
            Duration::from_millis(settings.time_limit_ms),
        )
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Slots currently free.
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Jobs currently holding a slot.
    pub fn running_jobs(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs a blocking job once a slot is free.
    ///
    /// Waits in FIFO order for a slot. The time limit starts once the slot is
    /// held, so queueing time never counts against a job. Dropping the returned
    /// future (for example when a session is torn down) releases the slot.
    ///
    /// # Errors
    /// - `TranslationTimeout` if the job did not finish within the time limit
    /// - `TranslationFailed` if the job panicked
    /// - whatever error the job itself returned
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self.semaphore.clone().acquire_owned().await.map_err(|_| {
            TalkGlobeError::TranslationFailed {
                message: "job governor is closed".to_string(),
            }
        })?;
        let _running = RunningGuard::enter(&self.running);

        let handle = tokio::task::spawn_blocking(job);

        match tokio::time::timeout(self.time_limit, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(TalkGlobeError::TranslationFailed {
                message: format!("translation task panicked: {}", e),
            }),
            Err(_) => {
                let limit_ms = self.time_limit.as_millis() as u64;
                tracing::warn!(limit_ms, "translation job timed out, releasing its slot");
                Err(TalkGlobeError::TranslationTimeout { limit_ms })
            }
        }
    }
}

impl Default for ConcurrencyGovernor {
    fn default() -> Self {
        Self::from_config(&GovernorSettings::default())
    }
}

/// Counts a job as running for as long as it is alive.
struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
