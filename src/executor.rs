//! Background execution of processors.
//!
//! The executor owns one tokio task per dispatched job. Each task waits for
//! a concurrency permit, moves its job to `Processing`, runs the processor
//! under a timeout with panic capture, and records exactly one terminal
//! state. Nothing a processor does can escape the task.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{FailureKind, JobError};
use crate::processing::{JobContext, Processor};
use crate::state_machine::{Job, JobFailure, JobInput, JobState, Transition};
use crate::store::JobStore;

/// Limits applied to every dispatched job.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Jobs allowed in `Processing` at the same time.
    pub max_concurrent_jobs: usize,
    /// Processing time after which a job is failed with a timeout.
    pub job_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_timeout: Duration::from_secs(600),
        }
    }
}

/// Runs processors for jobs without blocking the caller.
pub struct JobExecutor {
    store: Arc<JobStore>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
    /// Handles of dispatched tasks, for cancellation.
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobExecutor {
    pub fn new(store: Arc<JobStore>, config: ExecutorConfig) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            job_timeout: config.job_timeout,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `processor` for `job_id` and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, job_id: String, processor: Arc<dyn Processor>, input: JobInput) {
        let task = run_job(
            Arc::clone(&self.store),
            Arc::clone(&self.permits),
            self.job_timeout,
            job_id.clone(),
            processor,
            input,
        );

        // Held across the spawn so a concurrent cancel always finds the handle.
        let mut handles = self.lock_handles();
        handles.retain(|_, h| !h.is_finished());
        handles.insert(job_id, tokio::spawn(task));
    }

    /// Stop handing out permits. Jobs still waiting for one, and any
    /// dispatched afterwards, fail instead of starting; running jobs finish.
    pub fn shutdown(&self) {
        if !self.permits.is_closed() {
            info!(in_flight = self.in_flight(), "Executor shutting down");
            self.permits.close();
        }
    }

    /// Abort the job's task and record it as `Failed` with a cancellation.
    ///
    /// A job that already reached a terminal state keeps it.
    pub async fn cancel(&self, job_id: &str) -> Result<Job, JobError> {
        let handle = self.lock_handles().remove(job_id);
        if let Some(handle) = handle {
            handle.abort();
        }

        let job = self.store.get(job_id).await?;
        if job.is_terminal() {
            return Ok(job);
        }

        info!(job_id = %job_id, state = %job.state, "Cancelling job");
        let failure = JobFailure::new(FailureKind::Cancelled, "cancelled by request");
        record_failure(&self.store, job_id, failure).await
    }

    /// Dispatched tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.lock_handles()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    fn lock_handles(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_job(
    store: Arc<JobStore>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
    job_id: String,
    processor: Arc<dyn Processor>,
    input: JobInput,
) {
    let Ok(_permit) = permits.acquire_owned().await else {
        let failure = JobFailure::new(FailureKind::Processing, "executor is shut down");
        if let Err(e) = record_failure(&store, &job_id, failure).await {
            warn!(job_id = %job_id, error = %e, "Could not fail job at shutdown");
        }
        return;
    };

    // Fails only if the job was cancelled while waiting for a permit.
    if let Err(e) = store.update(&job_id, Transition::Start).await {
        warn!(job_id = %job_id, error = %e, "Job not started");
        return;
    }

    info!(job_id = %job_id, processor = processor.name(), "Processing job");
    let started = Instant::now();
    let ctx = JobContext {
        job_id: job_id.clone(),
        input,
    };
    let outcome = tokio::time::timeout(
        job_timeout,
        AssertUnwindSafe(processor.process(ctx)).catch_unwind(),
    )
    .await;

    let transition = match outcome {
        Ok(Ok(Ok(artifact))) => Transition::Complete(artifact),
        Ok(Ok(Err(e))) => Transition::Fail(JobFailure::new(e.kind(), e.to_string())),
        Ok(Err(panic)) => Transition::Fail(JobFailure::new(
            FailureKind::Processing,
            format!("processor panicked: {}", panic_message(panic.as_ref())),
        )),
        Err(_) => Transition::Fail(JobFailure::new(
            FailureKind::Timeout,
            format!("processing exceeded {job_timeout:?}"),
        )),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match store.update(&job_id, transition).await {
        Ok(job) => match &job.error {
            None => info!(job_id = %job_id, elapsed_ms, "Job done"),
            Some(failure) => warn!(job_id = %job_id, elapsed_ms, error = %failure, "Job failed"),
        },
        Err(e) => warn!(job_id = %job_id, error = %e, "Dropped job outcome"),
    }
}

/// Drive a non-terminal job through `Processing` to `Failed`.
///
/// If another writer finishes the job first, its terminal state stands and
/// is returned.
async fn record_failure(
    store: &JobStore,
    job_id: &str,
    failure: JobFailure,
) -> Result<Job, JobError> {
    if store.get(job_id).await?.state == JobState::Queued {
        // Lost races surface as InvalidTransition; the Fail below decides.
        let _ = store.update(job_id, Transition::Start).await;
    }
    match store.update(job_id, Transition::Fail(failure)).await {
        Ok(job) => Ok(job),
        Err(JobError::InvalidTransition { .. }) => store.get(job_id).await,
        Err(e) => Err(e),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
