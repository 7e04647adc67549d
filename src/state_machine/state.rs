use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{Artifact, JobFailure};

/// The four states of a PAPI job.
///
/// Each job flows through: QUEUED → PROCESSING → DONE | FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobState {
    /// `Done` and `Failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Position in the forward order. Both terminal states share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Processing => 1,
            JobState::Done | JobState::Failed => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Processing => write!(f, "PROCESSING"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// A requested change to a job record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Work has begun.
    Start,
    /// The processor produced an artifact.
    Complete(Artifact),
    /// The processor failed, timed out, or was cancelled.
    Fail(JobFailure),
}

impl Transition {
    /// The state this transition leads to.
    pub fn target(&self) -> JobState {
        match self {
            Transition::Start => JobState::Processing,
            Transition::Complete(_) => JobState::Done,
            Transition::Fail(_) => JobState::Failed,
        }
    }
}

/// Validates transitions between job states.
pub struct StateMachine;

impl StateMachine {
    /// Whether `from → to` is a legal step.
    ///
    /// - `Queued` may only move to `Processing`.
    /// - `Processing` may only move to a terminal state.
    /// - Terminal states are final.
    pub fn allows(from: JobState, to: JobState) -> bool {
        matches!(
            (from, to),
            (JobState::Queued, JobState::Processing)
                | (JobState::Processing, JobState::Done)
                | (JobState::Processing, JobState::Failed)
        )
    }
}
