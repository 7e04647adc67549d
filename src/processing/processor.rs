use std::future::Future;

use async_trait::async_trait;

use super::error::ProcessingError;
use crate::state_machine::{Artifact, JobInput};

/// What a processor receives for one job.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub input: JobInput,
}

/// A unit of work run once per job.
///
/// Implementations either return a reference to the artifact they produced
/// or a described failure. They may block for a long time; the executor
/// runs them off the request path and bounds them with a timeout.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, ctx: JobContext) -> Result<Artifact, ProcessingError>;
}

/// Adapts an async closure into a [`Processor`].
pub struct FnProcessor<F> {
    name: String,
    f: F,
}

impl<F> FnProcessor<F> {
    pub fn new<Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(JobContext) -> Fut,
        Fut: Future<Output = Result<Artifact, ProcessingError>>,
    {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Artifact, ProcessingError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: JobContext) -> Result<Artifact, ProcessingError> {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[tokio::test]
    async fn fn_processor_forwards_context() {
        let processor = FnProcessor::new("echo", |ctx: JobContext| async move {
            Ok(Artifact {
                location: PathBuf::from(format!("/out/{}", ctx.job_id)),
                content_type: "text/plain".into(),
                filename: ctx.input.source_url,
            })
        });

        let artifact = processor
            .process(JobContext {
                job_id: "j1".into(),
                input: JobInput::new("clip.mp4"),
            })
            .await
            .unwrap();

        assert_eq!(processor.name(), "echo");
        assert_eq!(artifact.location, PathBuf::from("/out/j1"));
        assert_eq!(artifact.filename, "clip.mp4");
    }
}
