use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{JobState, StateMachine, Transition};
use crate::error::{FailureKind, JobError};

/// Parameters supplied at submission. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    /// Where the source media lives.
    pub source_url: String,
    /// Target languages for the dubbing stages. May be empty.
    #[serde(default)]
    pub languages: Vec<String>,
}

impl JobInput {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            languages: Vec::new(),
        }
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }
}

/// Reference to the file a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path of the produced file on local storage. Server-side only;
    /// clients download through the result route.
    #[serde(skip)]
    pub location: PathBuf,
    pub content_type: String,
    /// Name offered to clients when downloading.
    pub filename: String,
}

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A single tracked unit of submitted work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub input: JobInput,
    pub result: Option<Artifact>,
    pub error: Option<JobFailure>,
    /// States the job has left, oldest first.
    pub state_history: Vec<JobState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            state: JobState::Queued,
            input,
            result: None,
            error: None,
            state_history: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a transition in place.
    ///
    /// The state flip and the `result`/`error` fields change together; an
    /// illegal transition leaves the record untouched.
    pub fn apply(&mut self, transition: Transition) -> Result<(), JobError> {
        let to = transition.target();
        if !StateMachine::allows(self.state, to) {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.state,
                to,
            });
        }

        let now = Utc::now();
        match transition {
            Transition::Start => {
                self.started_at = Some(now);
            }
            Transition::Complete(artifact) => {
                self.result = Some(artifact);
                self.finished_at = Some(now);
            }
            Transition::Fail(failure) => {
                self.error = Some(failure);
                self.finished_at = Some(now);
            }
        }
        self.state_history.push(self.state);
        self.state = to;
        self.updated_at = now;
        Ok(())
    }
}
