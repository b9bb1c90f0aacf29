//! Timing Instrument.
//!
//! A passive listener that records wall-clock duration per specification.
//! Register it first so later listeners can query durations from their own
//! `on_specification_end`.

use crate::domain::{MspecError, Result, SpecificationId, SpecificationInfo, SpecificationResult};
use crate::listener::RunListener;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Timings {
    started: HashMap<SpecificationId, Instant>,
    elapsed: HashMap<SpecificationId, Duration>,
}

/// Cloneable handle onto one run's timing record.
#[derive(Debug, Clone, Default)]
pub struct TimingListener {
    inner: Arc<Mutex<Timings>>,
}

impl TimingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed time of a specification. A specification that started but has
    /// not ended reports its elapsed time so far.
    pub fn duration_of(&self, id: &SpecificationId) -> Result<Duration> {
        let timings = self.lock();
        if let Some(elapsed) = timings.elapsed.get(id) {
            return Ok(*elapsed);
        }
        timings
            .started
            .get(id)
            .map(Instant::elapsed)
            .ok_or_else(|| MspecError::SpecificationNotFound(id.to_string()))
    }

    /// Number of specifications that have ended.
    pub fn completed(&self) -> usize {
        self.lock().elapsed.len()
    }

    fn lock(&self) -> MutexGuard<'_, Timings> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunListener for TimingListener {
    fn on_specification_start(&self, specification: &SpecificationInfo) {
        let id = specification.id();
        let mut timings = self.lock();
        timings.elapsed.remove(&id);
        timings.started.insert(id, Instant::now());
    }

    fn on_specification_end(&self, specification: &SpecificationInfo, _result: &SpecificationResult) {
        let id = specification.id();
        let mut timings = self.lock();
        if let Some(started) = timings.started.get(&id).copied() {
            timings.elapsed.insert(id, started.elapsed());
        }
    }
}
