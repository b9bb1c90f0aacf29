//! mspec Reporting
//!
//! Reporters that consume the mspec listener protocol. The build-worker
//! reporter:
//! - Writes a readable run outline through a caller-supplied writer
//! - Registers every specification with the CI build worker as `Running`
//! - Updates it with outcome, duration and captured output when it ends
//! - Tracks whether any failure occurred

pub mod build_worker;
pub mod error;
pub mod fakes;

pub use build_worker::{
    BuildWorkerApiClient, BuildWorkerConfig, BuildWorkerReporter, DispatchHandle,
    DispatchSummary, HttpBuildWorkerClient, Outcome, TestUpdate, FRAMEWORK_NAME,
};
pub use error::{ReportingError, ReportingResult};
