//! In-memory job table.
//!
//! [`JobStore`] is the only shared mutable structure in the service. All
//! records live behind one `RwLock`; a transition is applied to a record
//! entirely inside a write guard, so readers always see either the state
//! before or after it. Records are never evicted and do not survive a
//! restart, so a long-lived process accumulates jobs without bound.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::JobError;
use crate::state_machine::{Job, JobInput, Transition};

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `Queued` job and return its snapshot.
    pub async fn create(&self, input: JobInput) -> Job {
        let mut jobs = self.jobs.write().await;
        let mut job = Job::new(input.clone());
        // v4 collisions are practically impossible, but an id must never be reused.
        while jobs.contains_key(&job.id) {
            job = Job::new(input.clone());
        }
        debug!(job_id = %job.id, source = %job.input.source_url, "Job created");
        jobs.insert(job.id.clone(), job.clone());
        job
    }

    pub async fn get(&self, id: &str) -> Result<Job, JobError> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Apply one transition atomically and return the updated snapshot.
    pub async fn update(&self, id: &str, transition: Transition) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if let Err(e) = job.apply(transition) {
            warn!(job_id = %id, error = %e, "Rejected job transition");
            return Err(e);
        }
        debug!(job_id = %id, state = %job.state, "Job transitioned");
        Ok(job.clone())
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
