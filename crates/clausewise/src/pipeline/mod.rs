pub mod error;
pub mod progress;
pub mod runner;

pub use error::{PipelineError, PipelineWarning};
pub use progress::{JobStoreProgress, NoopProgress, ProgressReporter};
pub use runner::{Pipeline, PipelineOutcome, WorkUnit, DOCUMENT_LABEL};
