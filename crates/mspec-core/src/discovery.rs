//! Discovery Engine.
//!
//! A single pass over [`AssemblyMetadata`] that classifies every field through
//! the [`CompiledVocabulary`] and produces a flat [`DiscoveryTable`] of
//! `(ContextInfo, role, member)` rows. No user code runs here; no tree is built.

use crate::domain::{
    humanize, AssemblyInfo, ContextInfo, DiscoveryWarning, Result, WarningKind,
};
use crate::metadata::{AssemblyMetadata, Body, FieldValue, FixtureFactory, TypeDescriptor};
use crate::obs;
use crate::vocabulary::{Classification, CompiledVocabulary, Role, Vocabulary};
use std::collections::HashSet;
use tracing::debug;

/// A classified member of a construct.
#[derive(Debug, Clone)]
pub struct Member {
    pub field_name: String,

    /// Marker the member was declared with; becomes the specification leader.
    pub marker: String,

    /// `None` for an unassigned assertion.
    pub body: Option<Body>,

    pub ignore: Option<String>,

    /// Declaration index within the construct.
    pub order: usize,
}

/// One row of the discovery table.
#[derive(Debug, Clone)]
pub struct DiscoveredMember {
    pub context: ContextInfo,
    pub role: Role,
    pub member: Member,
}

/// A shared-behavior inclusion point.
#[derive(Debug, Clone)]
pub struct DiscoveredInclusion {
    /// Full name of the including construct.
    pub context: String,

    pub field_name: String,

    /// Full name of the included construct.
    pub target: String,

    pub order: usize,
}

/// A construct seen during discovery, qualifying or not.
#[derive(Debug, Clone)]
pub struct DiscoveredConstruct {
    pub info: ContextInfo,
    pub declaring_type: Option<String>,
    pub ignore: Option<String>,
    pub behavior: bool,

    /// Has at least one `Action` or `Assertion` member of its own.
    pub qualifies: bool,

    pub factory: FixtureFactory,
}

/// Flat output of discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryTable {
    pub assembly: AssemblyInfo,
    pub constructs: Vec<DiscoveredConstruct>,
    pub members: Vec<DiscoveredMember>,
    pub inclusions: Vec<DiscoveredInclusion>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl DiscoveryTable {
    pub fn construct(&self, full_name: &str) -> Option<&DiscoveredConstruct> {
        self.constructs.iter().find(|c| c.info.full_name == full_name)
    }

    /// Members of one construct, in declaration order.
    pub fn members_of<'a>(
        &'a self,
        full_name: &'a str,
    ) -> impl Iterator<Item = &'a DiscoveredMember> + 'a {
        self.members
            .iter()
            .filter(move |m| m.context.full_name == full_name)
    }

    /// Constructs that qualify as contexts on their own members.
    pub fn contexts(&self) -> impl Iterator<Item = &DiscoveredConstruct> {
        self.constructs.iter().filter(|c| c.qualifies && !c.behavior)
    }
}

/// Classifies loaded metadata into lifecycle roles.
#[derive(Debug, Clone)]
pub struct Discovery {
    vocabulary: CompiledVocabulary,
}

impl Discovery {
    pub fn new(vocabulary: &Vocabulary) -> Result<Self> {
        Ok(Self {
            vocabulary: vocabulary.compile()?,
        })
    }

    pub fn discover(&self, metadata: &AssemblyMetadata) -> DiscoveryTable {
        let assembly = AssemblyInfo::new(&metadata.name);
        let mut table = DiscoveryTable {
            assembly,
            constructs: Vec::new(),
            members: Vec::new(),
            inclusions: Vec::new(),
            warnings: Vec::new(),
        };
        let mut seen = HashSet::new();

        for descriptor in &metadata.types {
            let full_name = descriptor.full_name();
            if !seen.insert(full_name.clone()) {
                table.warnings.push(DiscoveryWarning::new(
                    WarningKind::DuplicateConstruct,
                    &full_name,
                    None,
                    "a construct with this full name was already discovered",
                ));
                continue;
            }
            self.discover_construct(&metadata.name, descriptor, full_name, &mut table);
        }

        for warning in &table.warnings {
            obs::emit_discovery_warning(&table.assembly.name, warning);
        }
        debug!(
            assembly = %table.assembly.name,
            constructs = table.constructs.len(),
            members = table.members.len(),
            warnings = table.warnings.len(),
            "Discovery finished"
        );
        table
    }

    fn discover_construct(
        &self,
        assembly_name: &str,
        descriptor: &TypeDescriptor,
        full_name: String,
        table: &mut DiscoveryTable,
    ) {
        let info = context_info(assembly_name, descriptor, full_name.clone());
        let mut qualifies = false;

        for (order, field) in descriptor.fields.iter().enumerate() {
            if let FieldValue::Include(target) = &field.value {
                table.inclusions.push(DiscoveredInclusion {
                    context: full_name.clone(),
                    field_name: field.name.clone(),
                    target: target.clone(),
                    order,
                });
                continue;
            }

            let role = match self.vocabulary.classify(&field.marker, &field.name) {
                Classification::Role(role) => role,
                Classification::NotAMember => continue,
                Classification::BadlyNamed => {
                    table.warnings.push(DiscoveryWarning::new(
                        WarningKind::BadlyNamedMember,
                        &full_name,
                        Some(&field.name),
                        format!("no {} rule accepts the name '{}'", field.marker, field.name),
                    ));
                    continue;
                }
            };

            let body = match &field.value {
                FieldValue::Body(body) => Some(body.clone()),
                FieldValue::Unassigned if role == Role::Assertion => None,
                FieldValue::Unassigned => {
                    debug!(construct = %full_name, field = %field.name, role = %role, "Skipping unassigned member");
                    continue;
                }
                FieldValue::Opaque(value_type) => {
                    table.warnings.push(DiscoveryWarning::new(
                        WarningKind::MalformedMember,
                        &full_name,
                        Some(&field.name),
                        format!(
                            "{} member holds a {} instead of an invocable body",
                            field.marker, value_type
                        ),
                    ));
                    continue;
                }
                FieldValue::Include(_) => continue,
            };

            if matches!(role, Role::Action | Role::Assertion) {
                qualifies = true;
            }

            table.members.push(DiscoveredMember {
                context: info.clone(),
                role,
                member: Member {
                    field_name: field.name.clone(),
                    marker: field.marker.clone(),
                    body,
                    ignore: field.ignore.clone(),
                    order,
                },
            });
        }

        table.constructs.push(DiscoveredConstruct {
            info,
            declaring_type: descriptor.declaring_type.clone(),
            ignore: descriptor.ignore.clone(),
            behavior: descriptor.behavior,
            qualifies,
            factory: descriptor.factory.clone(),
        });
    }
}

fn context_info(assembly_name: &str, descriptor: &TypeDescriptor, full_name: String) -> ContextInfo {
    let readable = humanize(&descriptor.name);
    let name = match &descriptor.subject {
        Some(subject) => format!("{subject}, {readable}"),
        None => readable,
    };

    ContextInfo {
        name,
        full_name,
        type_name: descriptor.name.clone(),
        namespace: descriptor.namespace.clone(),
        subject: descriptor.subject.clone(),
        tags: descriptor.tags.clone(),
        assembly_name: assembly_name.to_string(),
        parent: descriptor.declaring_type.clone(),
    }
}
