use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::JobError;
use crate::executor::{ExecutorConfig, JobExecutor};
use crate::processing::Processor;
use crate::state_machine::{Artifact, Job, JobInput, JobState};
use crate::store::JobStore;

/// Returned by [`JobOrchestrator::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub state: JobState,
}

/// A finished job's artifact together with an open handle to its file.
#[derive(Debug)]
pub struct ResultFile {
    pub artifact: Artifact,
    pub file: File,
}

/// Creates jobs, hands them to the executor and answers queries about them.
pub struct JobOrchestrator {
    store: Arc<JobStore>,
    executor: JobExecutor,
    processor: Arc<dyn Processor>,
}

impl JobOrchestrator {
    pub fn new(store: Arc<JobStore>, processor: Arc<dyn Processor>, config: ExecutorConfig) -> Self {
        let executor = JobExecutor::new(Arc::clone(&store), config);
        Self {
            store,
            executor,
            processor,
        }
    }

    /// Record a new job and schedule it. Never waits on the processor.
    pub async fn submit(&self, mut input: JobInput) -> Result<SubmitReceipt, JobError> {
        input.source_url = input.source_url.trim().to_string();
        if input.source_url.is_empty() {
            return Err(JobError::InvalidInput(
                "source_url must not be empty".to_string(),
            ));
        }

        let job = self.store.create(input).await;
        info!(
            job_id = %job.id,
            source = %job.input.source_url,
            languages = job.input.languages.len(),
            "Job submitted"
        );
        self.executor
            .dispatch(job.id.clone(), Arc::clone(&self.processor), job.input.clone());

        Ok(SubmitReceipt {
            job_id: job.id,
            state: job.state,
        })
    }

    pub async fn status(&self, id: &str) -> Result<Job, JobError> {
        self.store.get(id).await
    }

    /// Open the artifact of a `Done` job.
    ///
    /// Any other state is `NotReady`; an artifact that can no longer be
    /// read is `Gone`.
    pub async fn fetch_result(&self, id: &str) -> Result<ResultFile, JobError> {
        let job = self.store.get(id).await?;
        let artifact = match (job.state, job.result) {
            (JobState::Done, Some(artifact)) => artifact,
            (state, _) => {
                return Err(JobError::NotReady {
                    id: id.to_string(),
                    state,
                });
            }
        };

        match File::open(&artifact.location).await {
            Ok(file) => Ok(ResultFile { artifact, file }),
            Err(e) => {
                warn!(job_id = %id, path = %artifact.location.display(), error = %e, "Artifact unreadable");
                let reason = if e.kind() == ErrorKind::NotFound {
                    format!("{} was removed", artifact.filename)
                } else {
                    format!("{} is unreadable", artifact.filename)
                };
                Err(JobError::Gone {
                    id: id.to_string(),
                    reason,
                })
            }
        }
    }

    pub async fn list(&self) -> Vec<Job> {
        self.store.list().await
    }

    pub async fn cancel(&self, id: &str) -> Result<Job, JobError> {
        self.executor.cancel(id).await
    }

    /// Stop starting queued jobs; see [`JobExecutor::shutdown`].
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait(&self, id: &str, poll_interval: Duration) -> Result<Job, JobError> {
        loop {
            let job = self.store.get(id).await?;
            if job.is_terminal() {
                return Ok(job);
            }
            sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokio::io::AsyncReadExt;
    use tokio::time::timeout;

    use super::*;
    use crate::error::FailureKind;
    use crate::processing::{FnProcessor, JobContext, ProcessingError};

    const POLL: Duration = Duration::from_millis(5);

    async fn read_all(mut result: ResultFile) -> Vec<u8> {
        let mut contents = Vec::new();
        result.file.read_to_end(&mut contents).await.unwrap();
        contents
    }

    /// Writes `<dir>/<job_id>.txt` unless the source starts with `unreachable`.
    async fn write_source(
        dir: PathBuf,
        delay: Duration,
        ctx: JobContext,
    ) -> Result<Artifact, ProcessingError> {
        sleep(delay).await;
        if ctx.input.source_url.starts_with("unreachable") {
            return Err(ProcessingError::InvalidSource {
                url: ctx.input.source_url.clone(),
                reason: "host unreachable".into(),
            });
        }
        let location = dir.join(format!("{}.txt", ctx.job_id));
        tokio::fs::write(&location, ctx.input.source_url.as_bytes()).await?;
        Ok(Artifact {
            location,
            content_type: "text/plain".into(),
            filename: format!("{}.txt", ctx.job_id),
        })
    }

    fn file_writer(dir: PathBuf, delay: Duration) -> Arc<dyn Processor> {
        Arc::new(FnProcessor::new("file-writer", move |ctx: JobContext| {
            write_source(dir.clone(), delay, ctx)
        }))
    }

    fn orchestrator(dir: &std::path::Path, delay: Duration) -> JobOrchestrator {
        JobOrchestrator::new(
            Arc::new(JobStore::new()),
            file_writer(dir.to_path_buf(), delay),
            ExecutorConfig {
                max_concurrent_jobs: 8,
                job_timeout: Duration::from_secs(5),
            },
        )
    }

    async fn wait(orch: &JobOrchestrator, id: &str) -> Job {
        timeout(Duration::from_secs(5), orch.wait(id, POLL))
            .await
            .expect("job did not finish")
            .unwrap()
    }

    #[tokio::test]
    async fn submit_rejects_blank_source() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::ZERO);

        let err = orch.submit(JobInput::new("   ")).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidInput(_)));
        assert!(orch.list().await.is_empty());
    }

    #[tokio::test]
    async fn submit_returns_fresh_non_terminal_job() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::from_millis(100));

        let a = orch.submit(JobInput::new("clip-a")).await.unwrap();
        let b = orch.submit(JobInput::new("clip-b")).await.unwrap();
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.state, JobState::Queued);

        let status = orch.status(&a.job_id).await.unwrap();
        assert!(matches!(status.state, JobState::Queued | JobState::Processing));
        assert!(status.result.is_none());
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn reachable_source_finishes_done() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::ZERO);

        let receipt = orch.submit(JobInput::new("https://cdn/ok.mp4")).await.unwrap();
        let job = wait(&orch, &receipt.job_id).await;

        assert_eq!(job.state, JobState::Done);
        assert!(job.error.is_none());
        let artifact = job.result.unwrap();
        assert!(!artifact.filename.is_empty());

        let result = orch.fetch_result(&receipt.job_id).await.unwrap();
        assert_eq!(result.artifact, artifact);
        assert_eq!(read_all(result).await, b"https://cdn/ok.mp4");
    }

    #[tokio::test]
    async fn unreachable_source_finishes_failed() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::ZERO);

        let receipt = orch.submit(JobInput::new("unreachable://x")).await.unwrap();
        let job = wait(&orch, &receipt.job_id).await;

        assert_eq!(job.state, JobState::Failed);
        assert!(job.result.is_none());
        let error = job.error.unwrap();
        assert_eq!(error.kind, FailureKind::Transfer);
        assert!(error.message.contains("host unreachable"));

        let err = orch.fetch_result(&receipt.job_id).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::NotReady {
                state: JobState::Failed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn fetch_before_completion_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::from_millis(200));

        let receipt = orch.submit(JobInput::new("slow")).await.unwrap();
        let err = orch.fetch_result(&receipt.job_id).await.unwrap_err();
        assert!(matches!(err, JobError::NotReady { .. }));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::ZERO);
        orch.submit(JobInput::new("real")).await.unwrap();

        let missing = "00000000-0000-0000-0000-000000000000";
        assert_eq!(
            orch.status(missing).await.unwrap_err(),
            JobError::NotFound(missing.into())
        );
        assert_eq!(
            orch.fetch_result(missing).await.unwrap_err(),
            JobError::NotFound(missing.into())
        );
        assert!(matches!(
            orch.cancel(missing).await.unwrap_err(),
            JobError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn removed_artifact_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::ZERO);

        let receipt = orch.submit(JobInput::new("ephemeral")).await.unwrap();
        let job = wait(&orch, &receipt.job_id).await;
        let location = job.result.unwrap().location;
        std::fs::remove_file(&location).unwrap();

        let err = orch.fetch_result(&receipt.job_id).await.unwrap_err();
        assert!(matches!(err, JobError::Gone { .. }));
        assert!(!err.to_string().contains(&*location.to_string_lossy()));
    }

    #[tokio::test]
    async fn polled_states_never_go_backward() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::from_millis(30));

        let receipt = orch.submit(JobInput::new("watched")).await.unwrap();
        let mut seen = Vec::new();
        timeout(Duration::from_secs(5), async {
            loop {
                let job = orch.status(&receipt.job_id).await.unwrap();
                seen.push(job.state);
                if job.is_terminal() {
                    break;
                }
                sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        assert!(seen.windows(2).all(|w| w[0].rank() <= w[1].rank()), "{seen:?}");
        assert_eq!(seen.last(), Some(&JobState::Done));
    }

    #[tokio::test]
    async fn concurrent_jobs_keep_their_own_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Arc::new(orchestrator(dir.path(), Duration::from_millis(10)));

        let submissions: Vec<_> = (0..10)
            .map(|i| {
                let orch = Arc::clone(&orch);
                tokio::spawn(async move {
                    let source = if i % 2 == 0 {
                        format!("unreachable-{i}")
                    } else {
                        format!("https://cdn/{i}.mp4")
                    };
                    let receipt = orch.submit(JobInput::new(source.clone())).await.unwrap();
                    (source, receipt.job_id)
                })
            })
            .collect();

        for submission in submissions {
            let (source, id) = submission.await.unwrap();
            let job = wait(&orch, &id).await;
            assert_eq!(job.input.source_url, source);
            if source.starts_with("unreachable") {
                assert_eq!(job.state, JobState::Failed);
                assert!(job.error.unwrap().message.contains(&source));
                assert!(job.result.is_none());
            } else {
                assert_eq!(job.state, JobState::Done);
                let result = orch.fetch_result(&id).await.unwrap();
                assert_eq!(read_all(result).await, source.as_bytes());
            }
        }
        assert_eq!(orch.list().await.len(), 10);
    }

    #[tokio::test]
    async fn cancel_through_orchestrator() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Duration::from_secs(30));

        let receipt = orch.submit(JobInput::new("forever")).await.unwrap();
        let job = orch.cancel(&receipt.job_id).await.unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.unwrap().kind, FailureKind::Cancelled);
    }
}
