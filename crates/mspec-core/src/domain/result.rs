//! Terminal outcome of a specification.

use crate::domain::exception::ExceptionResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a specification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passing,
    Failing,
    NotImplemented,
    Ignored,
}

impl Status {
    /// Statuses that count as skipped rather than failed.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Status::NotImplemented | Status::Ignored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passing => "passing",
            Status::Failing => "failing",
            Status::NotImplemented => "not_implemented",
            Status::Ignored => "ignored",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result carried by `on_specification_end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationResult {
    pub status: Status,

    /// Failure that decided the status (only for `Failing`).
    pub exception: Option<ExceptionResult>,

    /// Teardown failure observed after an otherwise passing specification.
    pub supplementary: Option<ExceptionResult>,
}

impl SpecificationResult {
    pub fn pass() -> Self {
        Self {
            status: Status::Passing,
            exception: None,
            supplementary: None,
        }
    }

    pub fn fail(exception: ExceptionResult) -> Self {
        Self {
            status: Status::Failing,
            exception: Some(exception),
            supplementary: None,
        }
    }

    pub fn ignored() -> Self {
        Self {
            status: Status::Ignored,
            exception: None,
            supplementary: None,
        }
    }

    pub fn not_implemented() -> Self {
        Self {
            status: Status::NotImplemented,
            exception: None,
            supplementary: None,
        }
    }

    /// Attach a teardown diagnostic without touching the status.
    pub fn with_supplementary(mut self, exception: ExceptionResult) -> Self {
        self.supplementary = Some(exception);
        self
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Passing
    }
}
