//! Shared test utilities for clausewise integration tests.
//!
//! - `TestHarness` wires an `AnalysisService` to stub collaborators, a
//!   manual clock and an isolated temp directory.
//! - `ConfigBuilder` creates service configurations programmatically.

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
