//! Loaded program metadata.
//!
//! The engine never inspects source code. A host registers each unit under
//! test as an [`AssemblyMetadata`] value: a list of constructs
//! ([`TypeDescriptor`]) whose fields ([`FieldDescriptor`]) carry a marker and
//! either a body, nothing, or some non-callable value. Bodies are type-erased
//! closures over a fixture instance created fresh for every context activation
//! by the construct's [`FixtureFactory`].
//!
//! [`FixtureBuilder`] is the typed front door:
//!
//! ```rust,ignore
//! let spec = FixtureBuilder::<Account>::new("bank", "when_depositing")
//!     .establish("context", |a| { a.balance = 10; Ok(()) })
//!     .because("of", |a| { a.deposit(5); Ok(()) })
//!     .it("should_add_to_balance", |a| { anyhow::ensure!(a.balance == 15); Ok(()) })
//!     .build();
//! ```

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A fixture instance as seen by the engine.
pub type Fixture = dyn Any + Send;

type BodyFn = dyn Fn(&mut Fixture) -> anyhow::Result<()> + Send + Sync;
type FactoryFn = dyn Fn() -> Box<Fixture> + Send + Sync;

/// Assembly-level hook, not bound to any fixture.
pub type HookFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A zero-argument invocable member body.
#[derive(Clone)]
pub struct Body {
    call: Arc<BodyFn>,
    state_type: TypeId,
}

impl Body {
    /// Wrap a closure over a concrete fixture state type.
    pub fn new<T, F>(body: F) -> Self
    where
        T: Any + Send,
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let call = move |fixture: &mut Fixture| {
            let state = fixture.downcast_mut::<T>().ok_or_else(|| {
                anyhow::anyhow!("fixture instance is not a {}", type_name::<T>())
            })?;
            body(state)
        };
        Self {
            call: Arc::new(call),
            state_type: TypeId::of::<T>(),
        }
    }

    pub fn invoke(&self, fixture: &mut Fixture) -> anyhow::Result<()> {
        (self.call)(fixture)
    }

    pub fn state_type(&self) -> TypeId {
        self.state_type
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body(..)")
    }
}

/// Builds a fresh fixture instance for a context activation.
#[derive(Clone)]
pub struct FixtureFactory {
    make: Arc<FactoryFn>,
    state_type: TypeId,
    state_type_name: &'static str,
}

impl FixtureFactory {
    /// Factory using `T::default()`.
    pub fn of<T: Any + Send + Default>() -> Self {
        Self::with(T::default)
    }

    pub fn with<T, F>(factory: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            make: Arc::new(move || Box::new(factory()) as Box<Fixture>),
            state_type: TypeId::of::<T>(),
            state_type_name: type_name::<T>(),
        }
    }

    pub fn create(&self) -> Box<Fixture> {
        (self.make)()
    }

    pub fn state_type(&self) -> TypeId {
        self.state_type
    }

    pub fn state_type_name(&self) -> &'static str {
        self.state_type_name
    }
}

impl fmt::Debug for FixtureFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixtureFactory<{}>", self.state_type_name)
    }
}

/// What a field holds.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// An invocable body.
    Body(Body),
    /// Declared but never assigned.
    Unassigned,
    /// Shared behavior: splice the named construct's members here.
    Include(String),
    /// A value that is not invocable (named by its type).
    Opaque(String),
}

/// One declared member of a construct.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,

    /// Declared marker, looked up in the vocabulary.
    pub marker: String,

    pub value: FieldValue,

    /// Ignore reason, when the member is explicitly ignored.
    pub ignore: Option<String>,
}

/// One construct of a loaded unit.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: String,

    /// Namespace, `::`-separated. Empty for the root namespace.
    pub namespace: String,

    /// Full name of the enclosing construct for nested declarations.
    pub declaring_type: Option<String>,

    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,

    pub ignore: Option<String>,
    pub subject: Option<String>,
    pub tags: Vec<String>,

    /// Exists only to be included by other constructs; never a context itself.
    pub behavior: bool,

    pub factory: FixtureFactory,
}

impl TypeDescriptor {
    pub fn full_name(&self) -> String {
        match (&self.declaring_type, self.namespace.is_empty()) {
            (Some(outer), _) => format!("{}::{}", outer, self.name),
            (None, true) => self.name.clone(),
            (None, false) => format!("{}::{}", self.namespace, self.name),
        }
    }
}

/// Assembly-level lifecycle hooks.
#[derive(Clone, Default)]
pub struct AssemblyHooks {
    /// Run before any context; a failure is fatal for the assembly.
    pub on_start: Vec<HookFn>,
    /// Run after every context completed.
    pub on_complete: Vec<HookFn>,
    /// Run after each context's once-teardown.
    pub after_each_context: Vec<HookFn>,
}

impl fmt::Debug for AssemblyHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyHooks")
            .field("on_start", &self.on_start.len())
            .field("on_complete", &self.on_complete.len())
            .field("after_each_context", &self.after_each_context.len())
            .finish()
    }
}

/// A loaded unit under test.
#[derive(Debug, Clone, Default)]
pub struct AssemblyMetadata {
    pub name: String,
    pub types: Vec<TypeDescriptor>,
    pub hooks: AssemblyHooks,
}

impl AssemblyMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.push(descriptor);
        self
    }

    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.on_start.push(Arc::new(hook));
        self
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.on_complete.push(Arc::new(hook));
        self
    }

    pub fn after_each_context<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.after_each_context.push(Arc::new(hook));
        self
    }
}

/// Typed builder for a [`TypeDescriptor`] over fixture state `T`.
pub struct FixtureBuilder<T> {
    descriptor: TypeDescriptor,
    _state: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Default> FixtureBuilder<T> {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self::with_factory(namespace, name, T::default)
    }
}

impl<T: Any + Send> FixtureBuilder<T> {
    pub fn with_factory<F>(namespace: &str, name: &str, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            descriptor: TypeDescriptor {
                name: name.to_string(),
                namespace: namespace.to_string(),
                declaring_type: None,
                fields: Vec::new(),
                ignore: None,
                subject: None,
                tags: Vec::new(),
                behavior: false,
                factory: FixtureFactory::with(factory),
            },
            _state: PhantomData,
        }
    }

    /// Declare this construct inside `outer` (a full name).
    pub fn nested_in(mut self, outer: &str) -> Self {
        self.descriptor.declaring_type = Some(outer.to_string());
        self
    }

    /// Declare a member with an arbitrary marker.
    pub fn member<F>(mut self, marker: &str, name: &str, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            marker: marker.to_string(),
            value: FieldValue::Body(Body::new(body)),
            ignore: None,
        });
        self
    }

    pub fn establish<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.member("Establish", name, body)
    }

    /// `Context before_each` style member; the name selects the role.
    pub fn context<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.member("Context", name, body)
    }

    pub fn because<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.member("Because", name, body)
    }

    pub fn it<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.member("It", name, body)
    }

    pub fn cleanup<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.member("Cleanup", name, body)
    }

    /// An `It` that is explicitly ignored.
    pub fn ignored_it<F>(mut self, name: &str, reason: &str, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self = self.it(name, body);
        if let Some(field) = self.descriptor.fields.last_mut() {
            field.ignore = Some(reason.to_string());
        }
        self
    }

    /// Declare a member without assigning a body.
    pub fn unassigned(mut self, marker: &str, name: &str) -> Self {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            marker: marker.to_string(),
            value: FieldValue::Unassigned,
            ignore: None,
        });
        self
    }

    /// Declare a marker-typed field holding something that is not a body.
    pub fn opaque(mut self, marker: &str, name: &str, value_type: &str) -> Self {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            marker: marker.to_string(),
            value: FieldValue::Opaque(value_type.to_string()),
            ignore: None,
        });
        self
    }

    /// Include another construct's members at this point.
    pub fn behaves_like(mut self, name: &str, behavior: &str) -> Self {
        self.descriptor.fields.push(FieldDescriptor {
            name: name.to_string(),
            marker: "Behaves_like".to_string(),
            value: FieldValue::Include(behavior.to_string()),
            ignore: None,
        });
        self
    }

    pub fn ignore(mut self, reason: &str) -> Self {
        self.descriptor.ignore = Some(reason.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.descriptor.subject = Some(subject.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.descriptor.tags.push(tag.to_string());
        self
    }

    /// Mark as a shared behavior (only usable through inclusion).
    pub fn behavior(mut self) -> Self {
        self.descriptor.behavior = true;
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}
