//! Job lifecycle: records, the shared store, and background execution.

pub mod clock;
pub mod driver;
pub mod progress;
pub mod record;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{JobDriver, NOTHING_ANALYZED_MESSAGE};
pub use record::{Job, JobId, JobState, JobStatus, JobUpdate, JobView};
pub use store::{timeout_message, JobStore, JobSummary};
pub use sweeper::TimeoutSweeper;
