//! Identities of assemblies, contexts and specifications.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a loaded unit under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssemblyInfo {
    /// Assembly name, also used as the `file_name` of reported tests.
    pub name: String,
}

impl AssemblyInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Identity of one context in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
    /// Display name (humanized type name, prefixed by the subject if any).
    pub name: String,

    /// Fully-qualified name, `namespace::Outer::Inner`.
    pub full_name: String,

    /// Declared type name as written.
    pub type_name: String,

    /// Namespace the construct was declared in.
    pub namespace: String,

    /// Subject under test, when declared.
    pub subject: Option<String>,

    /// Tags declared on the construct.
    pub tags: Vec<String>,

    /// Owning assembly.
    pub assembly_name: String,

    /// Full name of the enclosing context. A key, not an owning reference.
    pub parent: Option<String>,
}

/// Key identifying a specification across a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecificationId {
    pub assembly_name: String,
    pub containing_type: String,
    pub field_name: String,
}

impl fmt::Display for SpecificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{}",
            self.assembly_name, self.containing_type, self.field_name
        )
    }
}

/// Payload describing one specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationInfo {
    /// Marker word the specification was declared with, e.g. `It`.
    pub leader: String,

    /// Human readable name derived from the field name.
    pub name: String,

    /// Full name of the context the specification runs in.
    pub containing_type: String,

    /// Field name as declared.
    pub field_name: String,

    /// Owning assembly.
    pub assembly_name: String,

    /// Output written through [`crate::capture`] while the specification ran.
    /// Only populated on `on_specification_end`.
    pub captured_output: Option<String>,
}

impl SpecificationInfo {
    pub fn new(
        leader: impl Into<String>,
        name: impl Into<String>,
        containing_type: impl Into<String>,
        field_name: impl Into<String>,
        assembly_name: impl Into<String>,
    ) -> Self {
        Self {
            leader: leader.into(),
            name: name.into(),
            containing_type: containing_type.into(),
            field_name: field_name.into(),
            assembly_name: assembly_name.into(),
            captured_output: None,
        }
    }

    /// Identity key `(assembly_name, containing_type, field_name)`.
    pub fn id(&self) -> SpecificationId {
        SpecificationId {
            assembly_name: self.assembly_name.clone(),
            containing_type: self.containing_type.clone(),
            field_name: self.field_name.clone(),
        }
    }
}

/// Turn an identifier like `should_throw_but_it_wont` into `should throw but it wont`.
pub fn humanize(identifier: &str) -> String {
    identifier
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
