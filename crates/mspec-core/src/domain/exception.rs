//! Captured failure detail.
//!
//! Fixture bodies fail by returning an error or by panicking. Neither value
//! is allowed to leave the engine: both are rendered into an
//! [`ExceptionResult`] first, which is plain data and serializable.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::time::Duration;

/// How the failure surfaced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A body returned `Err`.
    Error,
    /// A body panicked.
    Panic,
    /// The phase-boundary watchdog expired.
    Timeout,
}

/// Immutable rendering of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionResult {
    pub kind: FailureKind,

    /// Top-level message.
    pub message: String,

    /// Full rendering including the cause chain (and backtrace when enabled).
    pub full_trace: String,

    /// Next error in the cause chain.
    pub inner: Option<Box<ExceptionResult>>,
}

impl ExceptionResult {
    /// Capture an `anyhow::Error` returned from a body.
    pub fn from_error(error: &anyhow::Error) -> Self {
        let mut causes = error.chain();
        let message = causes
            .next()
            .map(|e| e.to_string())
            .unwrap_or_default();

        Self {
            kind: FailureKind::Error,
            message,
            full_trace: format!("{error:?}"),
            inner: Self::cause_chain(causes),
        }
    }

    /// Capture any `std::error::Error`, walking its `source()` chain.
    pub fn from_std_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut full_trace = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            full_trace.push_str(&format!("\n\nCaused by:\n    {cause}"));
            source = cause.source();
        }

        Self {
            kind: FailureKind::Error,
            message: error.to_string(),
            full_trace,
            inner: error.source().map(|s| Box::new(Self::from_std_error(s))),
        }
    }

    /// Capture a panic payload from `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self {
            kind: FailureKind::Panic,
            full_trace: format!("panicked: {message}"),
            message,
            inner: None,
        }
    }

    /// Failure produced by the watchdog at a phase boundary.
    pub fn timeout(limit: Duration, elapsed: Duration) -> Self {
        let message = format!(
            "specification exceeded its {}ms limit (ran {}ms)",
            limit.as_millis(),
            elapsed.as_millis()
        );
        Self {
            kind: FailureKind::Timeout,
            full_trace: message.clone(),
            message,
            inner: None,
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: FailureKind::Error,
            full_trace: message.clone(),
            message,
            inner: None,
        }
    }

    fn cause_chain<'a>(
        mut causes: impl Iterator<Item = &'a (dyn std::error::Error + 'static)>,
    ) -> Option<Box<Self>> {
        let cause = causes.next()?;
        Some(Box::new(Self {
            kind: FailureKind::Error,
            message: cause.to_string(),
            full_trace: cause.to_string(),
            inner: Self::cause_chain(causes),
        }))
    }
}

impl fmt::Display for ExceptionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_trace)
    }
}
