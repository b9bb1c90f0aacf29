//! In-memory build worker (testing only)
//!
//! Provides `MemoryBuildWorkerClient`, which records every call instead of
//! sending it anywhere.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::build_worker::{BuildWorkerApiClient, TestUpdate};
use crate::error::{ReportingError, ReportingResult};

/// Which API operation a recorded call used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Add,
    Update,
}

/// Records add/update calls in arrival order.
#[derive(Debug, Default)]
pub struct MemoryBuildWorkerClient {
    calls: Mutex<Vec<(CallKind, TestUpdate)>>,
    reject_updates: bool,
}

impl MemoryBuildWorkerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose `update_test` always fails with HTTP 500.
    pub fn rejecting_updates() -> Self {
        Self {
            reject_updates: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(CallKind, TestUpdate)> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(CallKind, TestUpdate)>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Final update for a test name.
    pub fn update_for(&self, test_name: &str) -> Option<TestUpdate> {
        self.calls()
            .into_iter()
            .rev()
            .find(|(kind, t)| *kind == CallKind::Update && t.test_name == test_name)
            .map(|(_, t)| t)
    }
}

#[async_trait]
impl BuildWorkerApiClient for MemoryBuildWorkerClient {
    async fn add_test(&self, test: &TestUpdate) -> ReportingResult<()> {
        self.lock().push((CallKind::Add, test.clone()));
        Ok(())
    }

    async fn update_test(&self, test: &TestUpdate) -> ReportingResult<()> {
        if self.reject_updates {
            return Err(ReportingError::Rejected {
                method: "PUT",
                url: "memory://api/tests".to_string(),
                status: 500,
            });
        }
        self.lock().push((CallKind::Update, test.clone()));
        Ok(())
    }
}
