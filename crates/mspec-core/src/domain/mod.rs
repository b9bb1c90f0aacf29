//! Domain models for mspec.
//!
//! Canonical definitions for the values that cross the listener protocol:
//! - `AssemblyInfo`, `ContextInfo`, `SpecificationInfo`: run identities
//! - `SpecificationResult` / `Status`: terminal outcome of one specification
//! - `ExceptionResult`: captured failure detail, never a live error
//! - `MspecError` / `DiscoveryWarning`: engine error taxonomy

pub mod error;
pub mod exception;
pub mod info;
pub mod result;

pub use error::{DiscoveryWarning, MspecError, Result, WarningKind};
pub use exception::{ExceptionResult, FailureKind};
pub use info::{humanize, AssemblyInfo, ContextInfo, SpecificationId, SpecificationInfo};
pub use result::{SpecificationResult, Status};
