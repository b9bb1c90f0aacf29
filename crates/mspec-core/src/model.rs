//! Context Model Builder.
//!
//! Turns the flat [`DiscoveryTable`] into a tree of [`Context`] nodes:
//! nesting is resolved through `declaring_type`, shared behavior is spliced in
//! at its inclusion point, run filters prune the tree, and specification
//! identities are deduplicated.

use crate::config::RunOptions;
use crate::discovery::{DiscoveredConstruct, DiscoveredMember, DiscoveryTable, Member};
use crate::domain::{
    humanize, AssemblyInfo, ContextInfo, DiscoveryWarning, MspecError, Result, SpecificationId,
    SpecificationInfo, WarningKind,
};
use crate::metadata::{Body, FixtureFactory};
use crate::vocabulary::Role;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

// ── Runtime nodes ──────────────────────────────────────────────────────

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    NotStarted,
    Active,
    Completed,
}

/// Lifecycle state of a specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecificationState {
    Pending,
    Running,
    Passed,
    Failed,
    Ignored,
    NotImplemented,
}

impl SpecificationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpecificationState::Pending | SpecificationState::Running)
    }
}

/// A non-assertion member in execution position.
#[derive(Debug, Clone)]
pub struct LifecycleMember {
    pub field_name: String,

    /// Construct that declared the member; differs from the owning context
    /// for spliced shared behavior.
    pub origin: String,

    pub body: Body,
}

/// Ordered lifecycle members of one context, by role.
#[derive(Debug, Clone, Default)]
pub struct LifecycleMembers {
    pub setup_once: Vec<LifecycleMember>,
    pub setup_each: Vec<LifecycleMember>,
    pub actions: Vec<LifecycleMember>,
    pub teardown_each: Vec<LifecycleMember>,
    pub teardown_once: Vec<LifecycleMember>,
}

impl LifecycleMembers {
    fn push(&mut self, role: Role, member: LifecycleMember) {
        match role {
            Role::SetupOnce => self.setup_once.push(member),
            Role::SetupEach => self.setup_each.push(member),
            Role::Action => self.actions.push(member),
            Role::TeardownEach => self.teardown_each.push(member),
            Role::TeardownOnce => self.teardown_once.push(member),
            Role::Assertion => {}
        }
    }

    pub fn of(&self, role: Role) -> &[LifecycleMember] {
        match role {
            Role::SetupOnce => &self.setup_once,
            Role::SetupEach => &self.setup_each,
            Role::Action => &self.actions,
            Role::TeardownEach => &self.teardown_each,
            Role::TeardownOnce => &self.teardown_once,
            Role::Assertion => &[],
        }
    }
}

/// One assertion in the tree.
#[derive(Debug)]
pub struct Specification {
    pub info: SpecificationInfo,

    /// `None` when the assertion was declared without a body.
    pub body: Option<Body>,

    pub ignore: Option<String>,

    state: Cell<SpecificationState>,
}

impl Specification {
    pub fn state(&self) -> SpecificationState {
        self.state.get()
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub(crate) fn advance(&self, next: SpecificationState) -> bool {
        let legal = match (self.state.get(), next) {
            (SpecificationState::Pending, SpecificationState::Running) => true,
            (SpecificationState::Running, to) => to.is_terminal(),
            _ => false,
        };
        if legal {
            self.state.set(next);
        } else {
            warn!(
                specification = %self.info.id(),
                from = ?self.state.get(),
                to = ?next,
                "Illegal specification state transition"
            );
        }
        legal
    }
}

/// A runtime context node.
#[derive(Debug)]
pub struct Context {
    pub info: ContextInfo,
    pub ignore: Option<String>,
    pub factory: FixtureFactory,
    pub members: LifecycleMembers,
    pub specifications: Vec<Specification>,
    pub children: Vec<Context>,
    state: Cell<ContextState>,
}

impl Context {
    pub fn state(&self) -> ContextState {
        self.state.get()
    }

    pub(crate) fn advance(&self, next: ContextState) -> bool {
        let legal = matches!(
            (self.state.get(), next),
            (ContextState::NotStarted, ContextState::Active)
                | (ContextState::Active, ContextState::Completed)
        );
        if legal {
            self.state.set(next);
        } else {
            warn!(
                context = %self.info.full_name,
                from = ?self.state.get(),
                to = ?next,
                "Illegal context state transition"
            );
        }
        legal
    }

    /// Number of specifications in this subtree.
    pub fn specification_count(&self) -> usize {
        self.specifications.len()
            + self
                .children
                .iter()
                .map(Context::specification_count)
                .sum::<usize>()
    }

    pub fn child(&self, full_name: &str) -> Option<&Context> {
        self.children.iter().find(|c| c.info.full_name == full_name)
    }
}

/// The assembled tree of one assembly.
#[derive(Debug)]
pub struct ContextTree {
    pub assembly: AssemblyInfo,
    pub roots: Vec<Context>,

    /// Discovery warnings plus the ones raised while building.
    pub warnings: Vec<DiscoveryWarning>,
}

impl ContextTree {
    pub fn specification_count(&self) -> usize {
        self.roots.iter().map(Context::specification_count).sum()
    }

    /// Find a context anywhere in the tree.
    pub fn find(&self, full_name: &str) -> Option<&Context> {
        let mut stack: Vec<&Context> = self.roots.iter().collect();
        while let Some(context) = stack.pop() {
            if context.info.full_name == full_name {
                return Some(context);
            }
            stack.extend(context.children.iter());
        }
        None
    }
}

// ── Builder ────────────────────────────────────────────────────────────

/// A member after shared behavior expansion.
#[derive(Debug, Clone)]
struct ExpandedMember {
    role: Role,
    member: Member,
    origin: String,
}

/// Assembles a [`ContextTree`] from a [`DiscoveryTable`].
#[derive(Debug, Clone, Default)]
pub struct ContextModelBuilder {
    options: RunOptions,
}

impl ContextModelBuilder {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub fn build(&self, table: DiscoveryTable) -> Result<ContextTree> {
        let mut warnings = table.warnings.clone();

        let index: HashMap<&str, &DiscoveredConstruct> = table
            .constructs
            .iter()
            .map(|c| (c.info.full_name.as_str(), c))
            .collect();

        let parents = parent_map(&table, &index)?;
        check_acyclic(&parents)?;

        let mut expander = Expander {
            table: &table,
            index: &index,
            expanded: HashMap::new(),
            warnings: Vec::new(),
        };
        for construct in &table.constructs {
            expander.expand(&construct.info.full_name, &mut Vec::new())?;
        }
        let Expander {
            expanded,
            warnings: expansion_warnings,
            ..
        } = expander;
        warnings.extend(expansion_warnings);

        let keep = self.node_set(&table, &index, &expanded);

        let mut seen = HashSet::new();
        let mut roots = Vec::new();
        for construct in table.constructs.iter().filter(|c| c.declaring_type.is_none()) {
            if let Some(context) =
                build_node(construct, &table, &expanded, &keep, &mut seen, &mut warnings)
            {
                roots.push(context);
            }
        }

        debug!(
            assembly = %table.assembly.name,
            roots = roots.len(),
            warnings = warnings.len(),
            "Context tree built"
        );
        Ok(ContextTree {
            assembly: table.assembly.clone(),
            roots,
            warnings,
        })
    }

    /// Decide which constructs become nodes, and whether each contributes its
    /// own specifications.
    fn node_set(
        &self,
        table: &DiscoveryTable,
        index: &HashMap<&str, &DiscoveredConstruct>,
        expanded: &HashMap<String, Vec<ExpandedMember>>,
    ) -> HashMap<String, bool> {
        let mut keep: HashMap<String, bool> = HashMap::new();

        for construct in &table.constructs {
            let chain = ancestry(construct, index);
            if chain.iter().any(|c| c.behavior) {
                continue;
            }
            let qualifies = expanded
                .get(&construct.info.full_name)
                .map(|members| {
                    members
                        .iter()
                        .any(|m| matches!(m.role, Role::Action | Role::Assertion))
                })
                .unwrap_or(false);
            if !qualifies {
                continue;
            }

            let tags: Vec<String> = chain.iter().flat_map(|c| c.info.tags.clone()).collect();
            if !self.options.selects(&construct.info.full_name, &tags) {
                debug!(context = %construct.info.full_name, "Context filtered out");
                continue;
            }

            keep.insert(construct.info.full_name.clone(), true);
            for ancestor in chain.iter().skip(1) {
                keep.entry(ancestor.info.full_name.clone()).or_insert(false);
            }
        }
        keep
    }
}

/// `full_name -> declaring_type`, failing on unknown declaring types.
fn parent_map(
    table: &DiscoveryTable,
    index: &HashMap<&str, &DiscoveredConstruct>,
) -> Result<HashMap<String, Option<String>>> {
    let mut parents = HashMap::new();
    for construct in &table.constructs {
        if let Some(outer) = &construct.declaring_type {
            if !index.contains_key(outer.as_str()) {
                return Err(MspecError::UnknownDeclaringType {
                    construct: construct.info.full_name.clone(),
                    declaring_type: outer.clone(),
                });
            }
        }
        parents.insert(
            construct.info.full_name.clone(),
            construct.declaring_type.clone(),
        );
    }
    Ok(parents)
}

/// Reject any nesting chain that revisits a construct.
pub(crate) fn check_acyclic(parents: &HashMap<String, Option<String>>) -> Result<()> {
    let mut cleared: HashSet<&str> = HashSet::new();
    for start in parents.keys() {
        let mut path: HashSet<&str> = HashSet::new();
        let mut current = Some(start.as_str());
        while let Some(name) = current {
            if cleared.contains(name) {
                break;
            }
            if !path.insert(name) {
                return Err(MspecError::CyclicNesting(name.to_string()));
            }
            current = parents.get(name).and_then(|p| p.as_deref());
        }
        cleared.extend(path);
    }
    Ok(())
}

/// The construct followed by its ancestors, innermost first.
fn ancestry<'a>(
    construct: &'a DiscoveredConstruct,
    index: &HashMap<&str, &'a DiscoveredConstruct>,
) -> Vec<&'a DiscoveredConstruct> {
    let mut chain = vec![construct];
    let mut current = construct;
    while let Some(outer) = current.declaring_type.as_deref().and_then(|o| index.get(o).copied()) {
        chain.push(outer);
        current = outer;
    }
    chain
}

struct Expander<'a> {
    table: &'a DiscoveryTable,
    index: &'a HashMap<&'a str, &'a DiscoveredConstruct>,
    expanded: HashMap<String, Vec<ExpandedMember>>,
    warnings: Vec<DiscoveryWarning>,
}

enum Entry<'a> {
    Own(&'a DiscoveredMember),
    Include { field_name: &'a str, target: &'a str },
}

impl<'a> Expander<'a> {
    /// Members of `full_name` with every inclusion spliced in place.
    fn expand(&mut self, full_name: &str, stack: &mut Vec<String>) -> Result<Vec<ExpandedMember>> {
        if let Some(done) = self.expanded.get(full_name) {
            return Ok(done.clone());
        }
        if stack.iter().any(|s| s == full_name) {
            let mut cycle = stack.clone();
            cycle.push(full_name.to_string());
            return Err(MspecError::CyclicInclusion(cycle.join(" -> ")));
        }
        stack.push(full_name.to_string());

        let table: &'a DiscoveryTable = self.table;
        let mut entries: Vec<(usize, Entry<'a>)> = table
            .members
            .iter()
            .filter(|m| m.context.full_name == full_name)
            .map(|m| (m.member.order, Entry::Own(m)))
            .collect();
        entries.extend(
            table
                .inclusions
                .iter()
                .filter(|i| i.context == full_name)
                .map(|i| {
                    (
                        i.order,
                        Entry::Include {
                            field_name: &i.field_name,
                            target: &i.target,
                        },
                    )
                }),
        );
        entries.sort_by_key(|(order, _)| *order);

        let mut members = Vec::new();
        for (_, entry) in entries {
            match entry {
                Entry::Own(discovered) => members.push(ExpandedMember {
                    role: discovered.role,
                    member: discovered.member.clone(),
                    origin: full_name.to_string(),
                }),
                Entry::Include { field_name, target } => {
                    if let Some(included) = self.include(full_name, field_name, target, stack)? {
                        members.extend(included);
                    }
                }
            }
        }

        stack.pop();
        self.expanded.insert(full_name.to_string(), members.clone());
        Ok(members)
    }

    fn include(
        &mut self,
        includer: &str,
        field_name: &str,
        target: &str,
        stack: &mut Vec<String>,
    ) -> Result<Option<Vec<ExpandedMember>>> {
        let index = self.index;
        let Some(behavior) = index.get(target) else {
            self.warnings.push(DiscoveryWarning::new(
                WarningKind::UnknownInclusion,
                includer,
                Some(field_name),
                format!("shared behavior {target} does not exist"),
            ));
            return Ok(None);
        };

        let includer_type = index.get(includer).map(|c| c.factory.state_type());
        if includer_type != Some(behavior.factory.state_type()) {
            self.warnings.push(DiscoveryWarning::new(
                WarningKind::IncompatibleInclusion,
                includer,
                Some(field_name),
                format!(
                    "shared behavior {target} runs on {} which differs from the including fixture",
                    behavior.factory.state_type_name()
                ),
            ));
            return Ok(None);
        }

        self.expand(target, stack).map(Some)
    }
}

fn build_node(
    construct: &DiscoveredConstruct,
    table: &DiscoveryTable,
    expanded: &HashMap<String, Vec<ExpandedMember>>,
    keep: &HashMap<String, bool>,
    seen: &mut HashSet<SpecificationId>,
    warnings: &mut Vec<DiscoveryWarning>,
) -> Option<Context> {
    let full_name = &construct.info.full_name;
    let own_specifications = *keep.get(full_name)?;

    let mut members = LifecycleMembers::default();
    let mut specifications = Vec::new();

    for expanded_member in expanded.get(full_name).into_iter().flatten() {
        let ExpandedMember {
            role,
            member,
            origin,
        } = expanded_member;

        if *role != Role::Assertion {
            if let Some(body) = &member.body {
                members.push(
                    *role,
                    LifecycleMember {
                        field_name: member.field_name.clone(),
                        origin: origin.clone(),
                        body: body.clone(),
                    },
                );
            }
            continue;
        }
        if !own_specifications {
            continue;
        }

        let info = SpecificationInfo::new(
            &member.marker,
            humanize(&member.field_name),
            full_name,
            &member.field_name,
            &table.assembly.name,
        );
        if !seen.insert(info.id()) {
            warnings.push(DiscoveryWarning::new(
                WarningKind::DuplicateSpecification,
                full_name,
                Some(&member.field_name),
                format!("specification {} already exists", info.id()),
            ));
            continue;
        }
        specifications.push(Specification {
            info,
            body: member.body.clone(),
            ignore: member.ignore.clone(),
            state: Cell::new(SpecificationState::Pending),
        });
    }

    let children = table
        .constructs
        .iter()
        .filter(|c| c.declaring_type.as_deref() == Some(full_name.as_str()))
        .filter_map(|c| build_node(c, table, expanded, keep, seen, warnings))
        .collect();

    Some(Context {
        info: construct.info.clone(),
        ignore: construct.ignore.clone(),
        factory: construct.factory.clone(),
        members,
        specifications,
        children,
        state: Cell::new(ContextState::NotStarted),
    })
}
