//! Execution Engine.
//!
//! Walks the [`ContextTree`] of one assembly depth-first on the calling thread
//! and drives the listener protocol. For a context `C`:
//!
//! 1. `on_context_start(C)`, then a fresh fixture instance and `SetupOnce(C)`.
//! 2. For each specification of `C`: the `SetupEach` chain root to leaf, the
//!    `Action` chain root to leaf, the assertion, then the `TeardownEach` chain
//!    leaf to root (always, once the chain started).
//! 3. Child contexts, each bracketing its own descendants with its once-phases.
//! 4. `TeardownOnce(C)`, even when `SetupOnce(C)` failed, then `on_context_end(C)`.
//!
//! Member bodies fail by returning `Err` or by panicking; both are contained
//! here and become [`ExceptionResult`] values. Only metadata problems
//! (nesting or inclusion cycles, bad vocabulary) and a failing assembly
//! `on_start` hook abort the assembly.

use crate::capture;
use crate::config::RunOptions;
use crate::discovery::Discovery;
use crate::domain::{
    AssemblyInfo, DiscoveryWarning, ExceptionResult, Result, SpecificationInfo,
    SpecificationResult, Status,
};
use crate::listener::RunListener;
use crate::metadata::{AssemblyHooks, AssemblyMetadata, Body, Fixture};
use crate::model::{
    Context, ContextModelBuilder, ContextState, ContextTree, LifecycleMember, Specification,
    SpecificationState,
};
use crate::obs;
use crate::vocabulary::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

// ── Report ─────────────────────────────────────────────────────────────

/// One specification outcome, as it was sent on `on_specification_end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationRecord {
    pub info: SpecificationInfo,
    pub result: SpecificationResult,
}

/// A failure belonging to a context rather than a specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFailure {
    /// Full name of the context.
    pub context: String,
    pub exception: ExceptionResult,
}

/// Summary of one assembly run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub assembly: AssemblyInfo,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub specifications: Vec<SpecificationRecord>,
    pub context_failures: Vec<ContextFailure>,

    /// Failures of assembly `on_complete` hooks.
    pub hook_failures: Vec<ExceptionResult>,

    pub warnings: Vec<DiscoveryWarning>,

    /// Set when the run was aborted.
    pub fatal: Option<ExceptionResult>,
}

impl AssemblyReport {
    fn new(assembly: AssemblyInfo, run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            assembly,
            run_id,
            started_at: now,
            finished_at: now,
            specifications: Vec::new(),
            context_failures: Vec::new(),
            hook_failures: Vec::new(),
            warnings: Vec::new(),
            fatal: None,
        }
    }

    pub fn count(&self, status: Status) -> usize {
        self.specifications
            .iter()
            .filter(|r| r.result.status == status)
            .count()
    }

    pub fn passed_count(&self) -> usize {
        self.count(Status::Passing)
    }

    pub fn failed_count(&self) -> usize {
        self.count(Status::Failing)
    }

    /// First result recorded for a specification field name.
    pub fn result_of(&self, field_name: &str) -> Option<&SpecificationResult> {
        self.specifications
            .iter()
            .find(|r| r.info.field_name == field_name)
            .map(|r| &r.result)
    }

    /// True if any specification failed or the run was aborted.
    pub fn failure_occurred(&self) -> bool {
        self.fatal.is_some() || self.failed_count() > 0
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

// ── Engine ─────────────────────────────────────────────────────────────

/// Runs assemblies.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: RunOptions,
}

impl Engine {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Discover and assemble the context tree without running anything.
    pub fn discover(&self, metadata: &AssemblyMetadata) -> Result<ContextTree> {
        let table = Discovery::new(&self.options.vocabulary)?.discover(metadata);
        ContextModelBuilder::new(self.options.clone()).build(table)
    }

    /// Run one assembly to completion, driving `listener`.
    pub fn run(&self, metadata: &AssemblyMetadata, listener: &dyn RunListener) -> AssemblyReport {
        let run_id = Uuid::new_v4();
        let _span = obs::AssemblySpan::enter(&metadata.name, run_id);
        let mut report = AssemblyReport::new(AssemblyInfo::new(&metadata.name), run_id);

        listener.on_assembly_start(&report.assembly);
        obs::emit_assembly_started(&metadata.name, run_id);

        let outcome = match self.discover(metadata) {
            Ok(tree) => {
                report.warnings = tree.warnings.clone();
                Run {
                    listener,
                    hooks: &metadata.hooks,
                    timeout: self.options.specification_timeout(),
                    report: &mut report,
                }
                .execute(&tree)
            }
            Err(error) => Err(ExceptionResult::from_std_error(&error)),
        };

        if let Err(exception) = outcome {
            obs::emit_fatal_error(&metadata.name, &exception);
            listener.on_fatal_error(&exception);
            report.fatal = Some(exception);
        }

        report.finished_at = Utc::now();
        obs::emit_assembly_finished(
            &metadata.name,
            report.duration_ms(),
            report.specifications.len(),
            report.failed_count(),
            report.fatal.is_some(),
        );
        listener.on_assembly_end(&report.assembly);
        report
    }
}

// ── Traversal ──────────────────────────────────────────────────────────

/// What a context inherits from its ancestors' once-phases.
#[derive(Debug, Clone)]
enum Inherited {
    Clear,
    SetupFailed(ExceptionResult),
    Ignored,
}

/// An active context with its fixture instance.
struct Frame<'t> {
    context: &'t Context,
    fixture: Box<Fixture>,
}

/// Checks elapsed time at phase boundaries.
struct Watchdog {
    limit: Option<Duration>,
    started: Instant,
}

impl Watchdog {
    fn start(limit: Option<Duration>) -> Self {
        Self {
            limit,
            started: Instant::now(),
        }
    }

    fn check(&self) -> Option<ExceptionResult> {
        let limit = self.limit?;
        let elapsed = self.started.elapsed();
        (elapsed > limit).then(|| ExceptionResult::timeout(limit, elapsed))
    }
}

struct Run<'a> {
    listener: &'a dyn RunListener,
    hooks: &'a AssemblyHooks,
    timeout: Option<Duration>,
    report: &'a mut AssemblyReport,
}

impl<'a> Run<'a> {
    fn execute(mut self, tree: &ContextTree) -> std::result::Result<(), ExceptionResult> {
        let hooks = self.hooks;
        for hook in &hooks.on_start {
            guarded(|| hook())?;
        }

        for root in &tree.roots {
            let mut chain = Vec::new();
            self.context(root, &mut chain, Inherited::Clear);
        }

        for hook in &hooks.on_complete {
            if let Err(failure) = guarded(|| hook()) {
                warn!(error = %failure.message, "Assembly on_complete hook failed");
                self.report.hook_failures.push(failure);
            }
        }
        Ok(())
    }

    fn context<'t>(&mut self, context: &'t Context, chain: &mut Vec<Frame<'t>>, inherited: Inherited) {
        self.listener.on_context_start(&context.info);
        context.advance(ContextState::Active);
        debug!(context = %context.info.full_name, "Context started");

        let mut mode = match inherited {
            Inherited::Clear if context.ignore.is_some() => Inherited::Ignored,
            other => other,
        };

        let mut activated = false;
        if matches!(mode, Inherited::Clear) {
            match guarded(|| Ok(context.factory.create())) {
                Ok(fixture) => {
                    chain.push(Frame { context, fixture });
                    activated = true;
                    if let Some(failure) = chain.last_mut().and_then(setup_once) {
                        mode = Inherited::SetupFailed(failure);
                    }
                }
                Err(failure) => {
                    debug!(context = %context.info.full_name, error = %failure.message, "Fixture factory failed");
                    mode = Inherited::SetupFailed(failure);
                }
            }
        }

        for specification in &context.specifications {
            self.specification(specification, chain, &mode);
        }
        for child in &context.children {
            self.context(child, chain, mode.clone());
        }

        if activated {
            if let Some(frame) = chain.pop() {
                if let Some(failure) = teardown_once(frame) {
                    self.context_failure(context, failure);
                }
            }
        }
        if !matches!(mode, Inherited::Ignored) {
            let hooks = self.hooks;
            for hook in &hooks.after_each_context {
                if let Err(failure) = guarded(|| hook()) {
                    self.context_failure(context, failure);
                }
            }
        }

        context.advance(ContextState::Completed);
        self.listener.on_context_end(&context.info);
    }

    fn specification(
        &mut self,
        specification: &Specification,
        chain: &mut [Frame<'_>],
        mode: &Inherited,
    ) {
        self.listener.on_specification_start(&specification.info);
        specification.advance(SpecificationState::Running);

        let mut info = specification.info.clone();
        let result = if matches!(mode, Inherited::Ignored) || specification.ignore.is_some() {
            SpecificationResult::ignored()
        } else if let Some(body) = &specification.body {
            match mode {
                Inherited::SetupFailed(failure) => SpecificationResult::fail(failure.clone()),
                _ => {
                    capture::begin();
                    let result = self.run_chain(chain, body);
                    info.captured_output = capture::finish();
                    result
                }
            }
        } else {
            SpecificationResult::not_implemented()
        };

        specification.advance(terminal_state(result.status));
        debug!(
            specification = %info.id(),
            status = %result.status,
            "Specification finished"
        );
        self.listener.on_specification_end(&info, &result);
        self.report.specifications.push(SpecificationRecord { info, result });
    }

    fn run_chain(&self, chain: &mut [Frame<'_>], body: &Body) -> SpecificationResult {
        let watchdog = Watchdog::start(self.timeout);

        let mut failure = forward(chain, Role::SetupEach, &watchdog);
        if failure.is_none() {
            failure = forward(chain, Role::Action, &watchdog);
        }
        if failure.is_none() {
            failure = watchdog.check();
        }
        if failure.is_none() {
            failure = assertion(chain, body).err();
        }
        if failure.is_none() {
            failure = watchdog.check();
        }

        let teardown = backward(chain);
        match (failure, teardown) {
            (Some(failure), dropped) => {
                if let Some(dropped) = dropped {
                    debug!(error = %dropped.message, "Teardown failure dropped in favor of the earlier failure");
                }
                SpecificationResult::fail(failure)
            }
            (None, Some(teardown)) => SpecificationResult::pass().with_supplementary(teardown),
            (None, None) => SpecificationResult::pass(),
        }
    }

    fn context_failure(&mut self, context: &Context, exception: ExceptionResult) {
        obs::emit_context_failure(&context.info.full_name, &exception);
        self.listener.on_context_failure(&context.info, &exception);
        self.report.context_failures.push(ContextFailure {
            context: context.info.full_name.clone(),
            exception,
        });
    }
}

/// Run `f`, turning an `Err` or a panic into an [`ExceptionResult`].
fn guarded<R>(f: impl FnOnce() -> anyhow::Result<R>) -> std::result::Result<R, ExceptionResult> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(ExceptionResult::from_error(&error)),
        Err(payload) => Err(ExceptionResult::from_panic(payload)),
    }
}

fn invoke(member: &LifecycleMember, fixture: &mut Fixture) -> std::result::Result<(), ExceptionResult> {
    guarded(|| member.body.invoke(fixture)).map_err(|failure| {
        debug!(member = %member.field_name, origin = %member.origin, error = %failure.message, "Member failed");
        failure
    })
}

fn setup_once(frame: &mut Frame<'_>) -> Option<ExceptionResult> {
    let context = frame.context;
    context
        .members
        .setup_once
        .iter()
        .find_map(|member| invoke(member, frame.fixture.as_mut()).err())
}

/// Every once-teardown member runs; the first failure is kept.
fn teardown_once(mut frame: Frame<'_>) -> Option<ExceptionResult> {
    let context = frame.context;
    let mut first = None;
    for member in &context.members.teardown_once {
        if let Err(failure) = invoke(member, frame.fixture.as_mut()) {
            first.get_or_insert(failure);
        }
    }
    first
}

/// Run one role root to leaf, stopping at the first failure or expiry.
fn forward(chain: &mut [Frame<'_>], role: Role, watchdog: &Watchdog) -> Option<ExceptionResult> {
    for frame in chain.iter_mut() {
        let context = frame.context;
        for member in context.members.of(role) {
            if let Some(expired) = watchdog.check() {
                return Some(expired);
            }
            if let Err(failure) = invoke(member, frame.fixture.as_mut()) {
                return Some(failure);
            }
        }
    }
    None
}

fn assertion(chain: &mut [Frame<'_>], body: &Body) -> std::result::Result<(), ExceptionResult> {
    let frame = chain
        .last_mut()
        .ok_or_else(|| ExceptionResult::from_message("specification has no active context"))?;
    guarded(|| body.invoke(frame.fixture.as_mut()))
}

/// Run every `TeardownEach` member leaf to root; the first failure is kept.
fn backward(chain: &mut [Frame<'_>]) -> Option<ExceptionResult> {
    let mut first = None;
    for frame in chain.iter_mut().rev() {
        let context = frame.context;
        for member in &context.members.teardown_each {
            if let Err(failure) = invoke(member, frame.fixture.as_mut()) {
                first.get_or_insert(failure);
            }
        }
    }
    first
}

fn terminal_state(status: Status) -> SpecificationState {
    match status {
        Status::Passing => SpecificationState::Passed,
        Status::Failing => SpecificationState::Failed,
        Status::Ignored => SpecificationState::Ignored,
        Status::NotImplemented => SpecificationState::NotImplemented,
    }
}
