use thiserror::Error;

use crate::state_machine::JobState;

/// Errors returned synchronously by the query and submission surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is not ready (state: {state})")]
    NotReady { id: String, state: JobState },

    #[error("Artifact for job {id} is no longer available: {reason}")]
    Gone { id: String, reason: String },

    #[error("Invalid job input: {0}")]
    InvalidInput(String),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: JobState,
        to: JobState,
    },
}

impl JobError {
    /// Stable machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::NotFound(_) => "not_found",
            JobError::NotReady { .. } => "not_ready",
            JobError::Gone { .. } => "gone",
            JobError::InvalidInput(_) => "invalid_input",
            JobError::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

/// Classifies a job failure recorded on a `Failed` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The source could not be fetched (unreachable, non-2xx, bad locator).
    Transfer,
    /// Any other error raised while processing.
    Processing,
    /// The job exceeded the maximum processing duration.
    Timeout,
    /// The job was cancelled before it finished.
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transfer => write!(f, "transfer failure"),
            FailureKind::Processing => write!(f, "processing failure"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_error_display() {
        let err = JobError::NotReady {
            id: "abc".into(),
            state: JobState::Processing,
        };
        assert_eq!(err.to_string(), "Job abc is not ready (state: PROCESSING)");
        assert_eq!(JobError::NotFound("x".into()).to_string(), "Job not found: x");
    }

    #[test]
    fn job_error_kinds_are_distinct() {
        let errors = [
            JobError::NotFound("a".into()),
            JobError::NotReady {
                id: "a".into(),
                state: JobState::Queued,
            },
            JobError::Gone {
                id: "a".into(),
                reason: "deleted".into(),
            },
            JobError::InvalidInput("blank".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(JobError::kind).collect();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn failure_kind_serde() {
        assert_eq!(
            serde_json::to_string(&FailureKind::Transfer).unwrap(),
            r#""transfer""#
        );
        assert_eq!(FailureKind::Processing.to_string(), "processing failure");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JobError>();
    }
}
