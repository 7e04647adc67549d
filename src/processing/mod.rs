pub mod download;
pub mod dubbing;
pub mod error;
pub mod processor;

pub use download::DownloadProcessor;
pub use dubbing::DubbingPipeline;
pub use error::ProcessingError;
pub use processor::{FnProcessor, JobContext, Processor};
