//! Build-worker reporter.
//!
//! [`BuildWorkerReporter`] is a synchronous [`RunListener`]; engine events are
//! turned into [`TestUpdate`]s and queued to a tokio task that owns the API
//! client. Durations are read from a shared [`TimingListener`], which must be
//! registered ahead of the reporter.

use super::client::BuildWorkerApiClient;
use super::wire::TestUpdate;
use crate::error::{ReportingError, ReportingResult};
use mspec_core::{
    AssemblyInfo, ContextInfo, ExceptionResult, RunListener, SpecificationInfo,
    SpecificationResult, Status, TimingListener,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Console sink for progress lines.
pub type Writer = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug)]
enum ApiCall {
    Add(TestUpdate),
    Update(TestUpdate),
}

#[derive(Debug, Default)]
struct ReporterState {
    current_assembly: Option<String>,
    current_context: Option<String>,
}

/// Counts reported by the dispatcher once the queue is drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Handle onto the dispatcher task.
pub struct DispatchHandle {
    task: JoinHandle<DispatchSummary>,
}

impl DispatchHandle {
    /// Wait for every queued call to be delivered. Call
    /// [`BuildWorkerReporter::close`] (or drop the reporter) first.
    pub async fn finish(self) -> ReportingResult<DispatchSummary> {
        self.task
            .await
            .map_err(|e| ReportingError::Dispatcher(e.to_string()))
    }
}

pub struct BuildWorkerReporter {
    writer: Writer,
    timing: TimingListener,
    queue: Mutex<Option<UnboundedSender<ApiCall>>>,
    state: Mutex<ReporterState>,
    failure: AtomicBool,
}

impl BuildWorkerReporter {
    /// Start the dispatcher on the current tokio runtime.
    pub fn spawn(
        client: Arc<dyn BuildWorkerApiClient>,
        timing: TimingListener,
        writer: Writer,
    ) -> (Self, DispatchHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatch(client, rx));

        let reporter = Self {
            writer,
            timing,
            queue: Mutex::new(Some(tx)),
            state: Mutex::new(ReporterState::default()),
            failure: AtomicBool::new(false),
        };
        (reporter, DispatchHandle { task })
    }

    /// Stop accepting calls. Calls already queued are still delivered.
    pub fn close(&self) {
        lock(&self.queue).take();
    }

    /// True once any specification failed or the run hit a fatal error.
    pub fn failure_occurred(&self) -> bool {
        self.failure.load(Ordering::SeqCst)
    }

    fn enqueue(&self, call: ApiCall) {
        match lock(&self.queue).as_ref() {
            Some(tx) => {
                if tx.send(call).is_err() {
                    warn!("Build worker dispatcher stopped, dropping test update");
                }
            }
            None => debug!(?call, "Reporter closed, dropping test update"),
        }
    }

    fn assembly_name(&self) -> String {
        lock(&self.state).current_assembly.clone().unwrap_or_default()
    }

    fn duration_millis(&self, specification: &SpecificationInfo) -> i64 {
        match self.timing.duration_of(&specification.id()) {
            Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            Err(e) => {
                debug!(error = %e, "No timing for specification");
                0
            }
        }
    }

    fn write(&self, line: &str) {
        (self.writer)(line);
    }
}

impl RunListener for BuildWorkerReporter {
    fn on_assembly_start(&self, assembly: &AssemblyInfo) {
        lock(&self.state).current_assembly = Some(assembly.name.clone());
        self.write(&format!("Test Assembly: {}", assembly.name));
    }

    fn on_assembly_end(&self, _assembly: &AssemblyInfo) {
        lock(&self.state).current_assembly = None;
    }

    fn on_context_start(&self, context: &ContextInfo) {
        lock(&self.state).current_context = Some(context.full_name.clone());
        self.write(&format!("  * {}", context.name));
    }

    fn on_context_end(&self, _context: &ContextInfo) {
        lock(&self.state).current_context = None;
    }

    fn on_specification_start(&self, specification: &SpecificationInfo) {
        let assembly = self.assembly_name();
        self.enqueue(ApiCall::Add(TestUpdate::running(&specification.name, &assembly)));
        self.write(&format!(
            "     - {} {}",
            specification.leader, specification.name
        ));
    }

    fn on_specification_end(&self, specification: &SpecificationInfo, result: &SpecificationResult) {
        let assembly = self.assembly_name();
        let duration = self.duration_millis(specification);
        let name = specification.name.as_str();

        let update = match result.status {
            Status::Passing => {
                TestUpdate::passed(name, &assembly, duration, specification.captured_output.clone())
            }
            Status::NotImplemented | Status::Ignored => {
                TestUpdate::skipped(name, &assembly, duration)
            }
            Status::Failing => {
                self.failure.store(true, Ordering::SeqCst);
                self.write(&format!("         ^^^^ FAILURE {name}"));
                TestUpdate::failed(
                    name,
                    &assembly,
                    duration,
                    result.exception.as_ref().map(|e| e.message.clone()),
                    result.exception.as_ref().map(|e| e.full_trace.clone()),
                    specification.captured_output.clone(),
                )
            }
        };

        let update = match &result.supplementary {
            Some(diagnostic) => update.with_standard_error(diagnostic.full_trace.clone()),
            None => update,
        };
        self.enqueue(ApiCall::Update(update));
    }

    fn on_context_failure(&self, context: &ContextInfo, exception: &ExceptionResult) {
        warn!(context = %context.full_name, error = %exception.message, "Context cleanup failed");
    }

    fn on_fatal_error(&self, exception: &ExceptionResult) {
        self.failure.store(true, Ordering::SeqCst);
        warn!(error = %exception.message, "Assembly run aborted");
    }
}

async fn dispatch(
    client: Arc<dyn BuildWorkerApiClient>,
    mut rx: UnboundedReceiver<ApiCall>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    while let Some(call) = rx.recv().await {
        let (verb, outcome) = match &call {
            ApiCall::Add(t) => ("add", client.add_test(t).await),
            ApiCall::Update(t) => ("update", client.update_test(t).await),
        };
        match outcome {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                warn!(call = verb, error = %e, "Build worker call failed");
                summary.failed += 1;
            }
        }
    }
    debug!(sent = summary.sent, failed = summary.failed, "Build worker dispatcher drained");
    summary
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
