//! Build-worker test status payload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Framework name reported with every test.
pub const FRAMEWORK_NAME: &str = "Machine.Specifications";

/// Test outcome as the build worker spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Running,
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Running => "Running",
            Outcome::Passed => "Passed",
            Outcome::Failed => "Failed",
            Outcome::Skipped => "Skipped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an add or update test call. Field order and names are the wire
/// contract; absent values are sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestUpdate {
    pub test_name: String,
    pub framework_name: String,

    /// Name of the assembly the test belongs to.
    pub file_name: String,

    pub outcome: Outcome,
    pub duration_millis: Option<i64>,
    pub error_message: Option<String>,
    pub error_stack_trace: Option<String>,
    pub standard_output: Option<String>,
    pub standard_error: Option<String>,
}

impl TestUpdate {
    fn new(test_name: &str, file_name: &str, outcome: Outcome) -> Self {
        Self {
            test_name: test_name.to_string(),
            framework_name: FRAMEWORK_NAME.to_string(),
            file_name: file_name.to_string(),
            outcome,
            duration_millis: None,
            error_message: None,
            error_stack_trace: None,
            standard_output: None,
            standard_error: None,
        }
    }

    pub fn running(test_name: &str, file_name: &str) -> Self {
        Self::new(test_name, file_name, Outcome::Running)
    }

    pub fn passed(
        test_name: &str,
        file_name: &str,
        duration_millis: i64,
        standard_output: Option<String>,
    ) -> Self {
        Self {
            duration_millis: Some(duration_millis),
            standard_output,
            ..Self::new(test_name, file_name, Outcome::Passed)
        }
    }

    pub fn skipped(test_name: &str, file_name: &str, duration_millis: i64) -> Self {
        Self {
            duration_millis: Some(duration_millis),
            ..Self::new(test_name, file_name, Outcome::Skipped)
        }
    }

    pub fn failed(
        test_name: &str,
        file_name: &str,
        duration_millis: i64,
        error_message: Option<String>,
        error_stack_trace: Option<String>,
        standard_output: Option<String>,
    ) -> Self {
        Self {
            duration_millis: Some(duration_millis),
            error_message,
            error_stack_trace,
            standard_output,
            ..Self::new(test_name, file_name, Outcome::Failed)
        }
    }

    pub fn with_standard_error(mut self, standard_error: String) -> Self {
        self.standard_error = Some(standard_error);
        self
    }
}
