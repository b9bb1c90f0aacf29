//! Structured observability hooks for assembly runs.
//!
//! This module provides:
//! - Assembly-scoped tracing spans via the `AssemblySpan` RAII guard
//! - Emission functions for run milestones: start, finish, discovery
//!   warnings, context failures and fatal errors
//!
//! Events are emitted at `info!` level, warnings at `warn!` (filter via
//! `MSPEC_LOG`). For JSON output, set `MSPEC_LOG_FORMAT=json`.

use crate::domain::{DiscoveryWarning, ExceptionResult};
use tracing::{error, info, warn};
use uuid::Uuid;

/// RAII guard that enters an assembly-scoped span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = AssemblySpan::enter("bank.specs", run_id);
/// // every event below carries assembly and run_id
/// ```
pub struct AssemblySpan {
    _span: tracing::span::EnteredSpan,
}

impl AssemblySpan {
    pub fn enter(assembly: &str, run_id: Uuid) -> Self {
        let span = tracing::info_span!("mspec.assembly", assembly = %assembly, run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: assembly run started.
pub fn emit_assembly_started(assembly: &str, run_id: Uuid) {
    info!(event = "assembly.started", assembly = %assembly, run_id = %run_id);
}

/// Emit event: assembly run finished with its tallies.
pub fn emit_assembly_finished(
    assembly: &str,
    duration_ms: u64,
    specifications: usize,
    failed: usize,
    fatal: bool,
) {
    info!(
        event = "assembly.finished",
        assembly = %assembly,
        duration_ms = duration_ms,
        specifications = specifications,
        failed = failed,
        fatal = fatal,
    );
}

pub fn emit_discovery_warning(assembly: &str, warning: &DiscoveryWarning) {
    warn!(
        event = "discovery.warning",
        assembly = %assembly,
        kind = ?warning.kind,
        construct = %warning.construct,
        member = warning.member.as_deref().unwrap_or(""),
        message = %warning.message,
    );
}

/// Emit event: context-level failure (once-teardown or after-context hook).
pub fn emit_context_failure(context: &str, exception: &ExceptionResult) {
    warn!(
        event = "context.failure",
        context = %context,
        kind = ?exception.kind,
        error = %exception.message,
    );
}

pub fn emit_fatal_error(assembly: &str, exception: &ExceptionResult) {
    error!(event = "fatal_error", assembly = %assembly, error = %exception.message);
}
