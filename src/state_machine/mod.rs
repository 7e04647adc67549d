mod job;
mod state;

pub use job::{Artifact, Job, JobFailure, JobInput};
pub use state::{JobState, StateMachine, Transition};
