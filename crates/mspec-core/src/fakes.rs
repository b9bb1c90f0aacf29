//! In-memory listener for tests.
//!
//! [`RecordingListener`] keeps every event in arrival order so tests can
//! assert on the protocol without a reporter.

use crate::domain::{
    AssemblyInfo, ContextInfo, ExceptionResult, SpecificationInfo, SpecificationResult,
};
use crate::listener::RunListener;
use std::sync::{Arc, Mutex, MutexGuard};

/// One observed protocol event.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    AssemblyStart(AssemblyInfo),
    AssemblyEnd(AssemblyInfo),
    ContextStart(ContextInfo),
    ContextEnd(ContextInfo),
    SpecificationStart(SpecificationInfo),
    SpecificationEnd(SpecificationInfo, SpecificationResult),
    ContextFailure(ContextInfo, ExceptionResult),
    FatalError(ExceptionResult),
}

impl RecordedEvent {
    /// Compact `kind:subject` form, handy for ordering assertions.
    pub fn label(&self) -> String {
        match self {
            RecordedEvent::AssemblyStart(a) => format!("assembly_start:{}", a.name),
            RecordedEvent::AssemblyEnd(a) => format!("assembly_end:{}", a.name),
            RecordedEvent::ContextStart(c) => format!("context_start:{}", c.full_name),
            RecordedEvent::ContextEnd(c) => format!("context_end:{}", c.full_name),
            RecordedEvent::SpecificationStart(s) => format!("spec_start:{}", s.field_name),
            RecordedEvent::SpecificationEnd(s, r) => {
                format!("spec_end:{}:{}", s.field_name, r.status)
            }
            RecordedEvent::ContextFailure(c, _) => format!("context_failure:{}", c.full_name),
            RecordedEvent::FatalError(_) => "fatal_error".to_string(),
        }
    }
}

/// Thread-safe recorder of protocol events.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.lock().iter().map(RecordedEvent::label).collect()
    }

    /// Every `on_specification_end` in order.
    pub fn results(&self) -> Vec<(SpecificationInfo, SpecificationResult)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::SpecificationEnd(info, result) => {
                    Some((info.clone(), result.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Result of the first specification declared under `field_name`.
    pub fn result_of(&self, field_name: &str) -> Option<SpecificationResult> {
        self.results()
            .into_iter()
            .find(|(info, _)| info.field_name == field_name)
            .map(|(_, result)| result)
    }

    pub fn fatal_errors(&self) -> Vec<ExceptionResult> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::FatalError(exception) => Some(exception.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: RecordedEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunListener for RecordingListener {
    fn on_assembly_start(&self, assembly: &AssemblyInfo) {
        self.record(RecordedEvent::AssemblyStart(assembly.clone()));
    }

    fn on_assembly_end(&self, assembly: &AssemblyInfo) {
        self.record(RecordedEvent::AssemblyEnd(assembly.clone()));
    }

    fn on_context_start(&self, context: &ContextInfo) {
        self.record(RecordedEvent::ContextStart(context.clone()));
    }

    fn on_context_end(&self, context: &ContextInfo) {
        self.record(RecordedEvent::ContextEnd(context.clone()));
    }

    fn on_specification_start(&self, specification: &SpecificationInfo) {
        self.record(RecordedEvent::SpecificationStart(specification.clone()));
    }

    fn on_specification_end(&self, specification: &SpecificationInfo, result: &SpecificationResult) {
        self.record(RecordedEvent::SpecificationEnd(
            specification.clone(),
            result.clone(),
        ));
    }

    fn on_context_failure(&self, context: &ContextInfo, exception: &ExceptionResult) {
        self.record(RecordedEvent::ContextFailure(context.clone(), exception.clone()));
    }

    fn on_fatal_error(&self, exception: &ExceptionResult) {
        self.record(RecordedEvent::FatalError(exception.clone()));
    }
}
