//! Listener/Reporter protocol.
//!
//! The engine drives one [`RunListener`] per assembly. Pairs are guaranteed:
//! one assembly start/end, one context start/end per context (properly
//! nested), one specification start/end per specification with a terminal
//! result on the end event. `on_fatal_error` fires only when the assembly run
//! is aborted, and is still followed by `on_assembly_end`.

use crate::domain::{
    AssemblyInfo, ContextInfo, ExceptionResult, SpecificationInfo, SpecificationResult,
};
use std::sync::Arc;

/// Receiver of run events. Every event defaults to a no-op.
pub trait RunListener: Send + Sync {
    fn on_assembly_start(&self, _assembly: &AssemblyInfo) {}

    fn on_assembly_end(&self, _assembly: &AssemblyInfo) {}

    fn on_context_start(&self, _context: &ContextInfo) {}

    fn on_context_end(&self, _context: &ContextInfo) {}

    fn on_specification_start(&self, _specification: &SpecificationInfo) {}

    fn on_specification_end(
        &self,
        _specification: &SpecificationInfo,
        _result: &SpecificationResult,
    ) {
    }

    /// A context-level failure that belongs to no specification
    /// (once-teardown, after-context hooks).
    fn on_context_failure(&self, _context: &ContextInfo, _exception: &ExceptionResult) {}

    fn on_fatal_error(&self, _exception: &ExceptionResult) {}
}

impl<T: RunListener + ?Sized> RunListener for Arc<T> {
    fn on_assembly_start(&self, assembly: &AssemblyInfo) {
        (**self).on_assembly_start(assembly)
    }

    fn on_assembly_end(&self, assembly: &AssemblyInfo) {
        (**self).on_assembly_end(assembly)
    }

    fn on_context_start(&self, context: &ContextInfo) {
        (**self).on_context_start(context)
    }

    fn on_context_end(&self, context: &ContextInfo) {
        (**self).on_context_end(context)
    }

    fn on_specification_start(&self, specification: &SpecificationInfo) {
        (**self).on_specification_start(specification)
    }

    fn on_specification_end(&self, specification: &SpecificationInfo, result: &SpecificationResult) {
        (**self).on_specification_end(specification, result)
    }

    fn on_context_failure(&self, context: &ContextInfo, exception: &ExceptionResult) {
        (**self).on_context_failure(context, exception)
    }

    fn on_fatal_error(&self, exception: &ExceptionResult) {
        (**self).on_fatal_error(exception)
    }
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl RunListener for NullListener {}

/// Fans every event out to its listeners in registration order.
#[derive(Clone, Default)]
pub struct CompositeListener {
    listeners: Vec<Arc<dyn RunListener>>,
}

impl CompositeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn RunListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn push(&mut self, listener: Arc<dyn RunListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl RunListener for CompositeListener {
    fn on_assembly_start(&self, assembly: &AssemblyInfo) {
        self.listeners.iter().for_each(|l| l.on_assembly_start(assembly));
    }

    fn on_assembly_end(&self, assembly: &AssemblyInfo) {
        self.listeners.iter().for_each(|l| l.on_assembly_end(assembly));
    }

    fn on_context_start(&self, context: &ContextInfo) {
        self.listeners.iter().for_each(|l| l.on_context_start(context));
    }

    fn on_context_end(&self, context: &ContextInfo) {
        self.listeners.iter().for_each(|l| l.on_context_end(context));
    }

    fn on_specification_start(&self, specification: &SpecificationInfo) {
        self.listeners
            .iter()
            .for_each(|l| l.on_specification_start(specification));
    }

    fn on_specification_end(&self, specification: &SpecificationInfo, result: &SpecificationResult) {
        self.listeners
            .iter()
            .for_each(|l| l.on_specification_end(specification, result));
    }

    fn on_context_failure(&self, context: &ContextInfo, exception: &ExceptionResult) {
        self.listeners
            .iter()
            .for_each(|l| l.on_context_failure(context, exception));
    }

    fn on_fatal_error(&self, exception: &ExceptionResult) {
        self.listeners.iter().for_each(|l| l.on_fatal_error(exception));
    }
}
