//! Error taxonomy for mspec.
//!
//! `MspecError` is fatal for the assembly it occurs in. Everything that can be
//! contained (malformed members, failing bodies) is either a
//! [`DiscoveryWarning`] or an [`crate::ExceptionResult`] on a specification.

use serde::{Deserialize, Serialize};

/// Fatal mspec errors.
#[derive(Debug, thiserror::Error)]
pub enum MspecError {
    #[error("cyclic nesting detected at {0}")]
    CyclicNesting(String),

    #[error("cyclic shared behavior inclusion: {0}")]
    CyclicInclusion(String),

    #[error("construct {construct} is declared inside unknown type {declaring_type}")]
    UnknownDeclaringType {
        construct: String,
        declaring_type: String,
    },

    #[error("invalid vocabulary rule for marker {marker}: {reason}")]
    InvalidVocabulary { marker: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("specification not found: {0}")]
    SpecificationNotFound(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mspec operations.
pub type Result<T> = std::result::Result<T, MspecError>;

/// Classification of a non-fatal discovery problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A vocabulary marker holding something that is not a body.
    MalformedMember,
    /// A marker with name rules whose field name matches none of them.
    BadlyNamedMember,
    /// Two constructs share a full name.
    DuplicateConstruct,
    /// Two specifications share an identity.
    DuplicateSpecification,
    /// Shared behavior whose fixture state differs from the includer's.
    IncompatibleInclusion,
    /// Shared behavior naming a construct that does not exist.
    UnknownInclusion,
}

/// A discovery problem that skips one member or inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWarning {
    pub kind: WarningKind,

    /// Full name of the construct the problem was found in.
    pub construct: String,

    /// Offending field, when there is one.
    pub member: Option<String>,

    pub message: String,
}

impl DiscoveryWarning {
    pub fn new(
        kind: WarningKind,
        construct: impl Into<String>,
        member: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            construct: construct.into(),
            member: member.map(str::to_string),
            message: message.into(),
        }
    }
}
