use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use super::download::DownloadProcessor;
use super::error::ProcessingError;
use super::processor::{JobContext, Processor};
use crate::state_machine::Artifact;

/// Download, then simulated transcribe → translate → mux per target language.
///
/// The transformation stages only sleep and log; the returned artifact is
/// the downloaded copy.
pub struct DubbingPipeline {
    download: DownloadProcessor,
    stage_delay: Duration,
}

impl DubbingPipeline {
    pub fn new(download: DownloadProcessor, stage_delay: Duration) -> Self {
        Self {
            download,
            stage_delay,
        }
    }

    async fn run_stage(&self, job_id: &str, stage: &str, language: Option<&str>) {
        debug!(job_id = %job_id, stage, language, "Running stage");
        sleep(self.stage_delay).await;
    }
}

#[async_trait]
impl Processor for DubbingPipeline {
    fn name(&self) -> &str {
        "dubbing"
    }

    async fn process(&self, ctx: JobContext) -> Result<Artifact, ProcessingError> {
        if let Some(bad) = ctx.input.languages.iter().find(|l| l.trim().is_empty()) {
            return Err(ProcessingError::Stage {
                stage: "translate".into(),
                message: format!("invalid target language {bad:?}"),
            });
        }

        let job_id = ctx.job_id.clone();
        let languages = ctx.input.languages.clone();
        let artifact = self.download.process(ctx).await?;

        self.run_stage(&job_id, "transcribe", None).await;
        for language in &languages {
            self.run_stage(&job_id, "translate", Some(language)).await;
            self.run_stage(&job_id, "mux", Some(language)).await;
        }

        info!(job_id = %job_id, languages = languages.len(), "Dubbing finished");
        Ok(artifact)
    }
}
