//! CI build-worker integration.

mod client;
mod reporter;
mod wire;

pub use client::{BuildWorkerApiClient, BuildWorkerConfig, HttpBuildWorkerClient, ENV_API_URL};
pub use reporter::{BuildWorkerReporter, DispatchHandle, DispatchSummary, Writer};
pub use wire::{Outcome, TestUpdate, FRAMEWORK_NAME};
