//! mspec Core Library
//!
//! Behavior-driven specification runner: discovers fixtures in loaded
//! [`AssemblyMetadata`], assembles them into a [`ContextTree`], runs each
//! context's lifecycle with failure isolation, and reports through the
//! [`RunListener`] protocol.

pub mod capture;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod listener;
pub mod metadata;
pub mod model;
pub mod obs;
pub mod scheduler;
pub mod telemetry;
pub mod timing;
pub mod vocabulary;

pub use config::RunOptions;
pub use discovery::{Discovery, DiscoveryTable};
pub use domain::{
    humanize, AssemblyInfo, ContextInfo, DiscoveryWarning, ExceptionResult, FailureKind,
    MspecError, Result, SpecificationId, SpecificationInfo, SpecificationResult, Status,
    WarningKind,
};
pub use engine::{AssemblyReport, ContextFailure, Engine, SpecificationRecord};
pub use listener::{CompositeListener, NullListener, RunListener};
pub use metadata::{AssemblyMetadata, Body, FieldValue, FixtureBuilder, FixtureFactory, TypeDescriptor};
pub use model::{Context, ContextModelBuilder, ContextTree, Specification};
pub use scheduler::AssemblyScheduler;
pub use timing::TimingListener;
pub use vocabulary::{MarkerRule, Role, Vocabulary};

/// Crate version, as reported to listeners and logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
