//! Factory types for creating service instances
//!
//! Rust has no runtime reflection, so every implementation declares its
//! constructors up front: the parameter types the engine must supply and an
//! activator that builds the instance from the resolved arguments.

use crate::{BoxError, DiError, Result, ServiceType};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Synchronous teardown for services owning resources.
///
/// Instances created through [`Instance::disposable`] are tracked by the
/// scope that owns them and disposed in reverse creation order when that
/// scope is disposed.
pub trait Dispose: Send + Sync + 'static {
    /// Release the resources held by this instance.
    fn dispose(&self);
}

// =============================================================================
// Instance
// =============================================================================

/// A produced service value.
///
/// Holds an `Arc<T>` erased behind `dyn Any`, so any `T` (including trait
/// objects) can be stored and recovered with [`Instance::downcast`]. Cloning
/// is cheap and preserves identity.
#[derive(Clone)]
pub struct Instance {
    /// Always an `Arc<T>` for the `T` the instance was created from
    value: Arc<dyn Any + Send + Sync>,
    disposer: Option<Arc<dyn Dispose>>,
    type_name: &'static str,
}

impl Instance {
    /// Wrap a value.
    #[inline]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing `Arc`, e.g. `Arc<dyn Trait>`.
    #[inline]
    pub fn from_arc<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            disposer: None,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wrap a value that must be disposed by its owning scope.
    pub fn disposable<T: Dispose>(value: T) -> Self {
        let value = Arc::new(value);
        Self::from_arc(Arc::clone(&value)).with_disposer(value)
    }

    /// Attach a disposal capability to this instance.
    #[inline]
    pub fn with_disposer(mut self, disposer: Arc<dyn Dispose>) -> Self {
        self.disposer = Some(disposer);
        self
    }

    /// Recover the typed `Arc<T>`, or `None` if this instance holds another type.
    #[inline]
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Whether the instance is a `T`.
    #[inline]
    pub fn is<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.value.is::<Arc<T>>()
    }

    /// Name of the type the instance was created from.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the instance carries a disposal capability.
    #[inline]
    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    pub(crate) fn disposer(&self) -> Option<&Arc<dyn Dispose>> {
        self.disposer.as_ref()
    }

    /// Reference equality: both handles point at the same produced value.
    #[inline]
    pub fn ptr_eq(a: &Instance, b: &Instance) -> bool {
        Arc::ptr_eq(&a.value, &b.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

/// The value produced for an `Enumerable<T>` request: every implementation
/// of `T`, in registration order.
#[derive(Clone, Debug, Default)]
pub struct ServiceList {
    items: Vec<Instance>,
}

impl ServiceList {
    pub(crate) fn new(items: Vec<Instance>) -> Self {
        Self { items }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.items.iter()
    }

    /// Clone out the member instances.
    pub fn to_vec(&self) -> Vec<Instance> {
        self.items.clone()
    }
}

impl<'a> IntoIterator for &'a ServiceList {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// =============================================================================
// Constructor metadata
// =============================================================================

/// A constructor parameter: the contract it needs and an optional default.
#[derive(Clone, Debug)]
pub struct Parameter {
    service_type: ServiceType,
    default: Option<Instance>,
}

impl Parameter {
    #[inline]
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            default: None,
        }
    }

    /// Use `value` when no descriptor exists for the parameter type.
    #[inline]
    pub fn with_default(mut self, value: Instance) -> Self {
        self.default = Some(value);
        self
    }

    #[inline]
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    #[inline]
    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }
}

impl From<ServiceType> for Parameter {
    fn from(service_type: ServiceType) -> Self {
        Self::new(service_type)
    }
}

/// Constructor accessibility; only public constructors are candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Type-erased activator: builds an instance from resolved arguments.
pub type Activator = Arc<dyn Fn(Arguments) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// A declared constructor of an implementation type.
#[derive(Clone)]
pub struct Constructor {
    parameters: Arc<[Parameter]>,
    visibility: Visibility,
    activator: Activator,
}

impl Constructor {
    /// A public constructor.
    pub fn new<P, F>(parameters: impl IntoIterator<Item = P>, activator: F) -> Self
    where
        P: Into<Parameter>,
        F: Fn(Arguments) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            parameters: parameters.into_iter().map(Into::<Parameter>::into).collect(),
            visibility: Visibility::Public,
            activator: Arc::new(activator),
        }
    }

    /// A public constructor taking no parameters.
    pub fn parameterless<F>(activator: F) -> Self
    where
        F: Fn(Arguments) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self::new(std::iter::empty::<Parameter>(), activator)
    }

    /// A private constructor: declared, but never selected.
    pub fn private<P, F>(parameters: impl IntoIterator<Item = P>, activator: F) -> Self
    where
        P: Into<Parameter>,
        F: Fn(Arguments) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            visibility: Visibility::Private,
            ..Self::new(parameters, activator)
        }
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Run the activator, converting a failure into a `DiError` without
    /// altering the original error.
    pub(crate) fn invoke(&self, arguments: Arguments) -> Result<Instance> {
        (self.activator)(arguments).map_err(DiError::from_producer)
    }
}

impl fmt::Display for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("new(")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", parameter.service_type)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} [{:?}]", self.visibility)
    }
}

/// Resolved constructor arguments, in parameter order.
#[derive(Debug, Default)]
pub struct Arguments {
    values: Vec<Instance>,
    types: Vec<ServiceType>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Instance>, types: Vec<ServiceType>) -> Self {
        Self { values, types }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The untyped instance at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds for the constructor's parameters.
    #[inline]
    pub fn instance(&self, index: usize) -> &Instance {
        &self.values[index]
    }

    /// The argument at `index` as an `Arc<T>`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.instance(index)
            .downcast::<T>()
            .ok_or_else(|| DiError::type_mismatch::<T>(self.types[index].clone()))
    }

    /// Every member of the enumerable argument at `index`, as `Arc<T>`s.
    pub fn all<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>> {
        let list = self.get::<ServiceList>(index)?;
        let element = self.types[index]
            .enumerable_element()
            .cloned()
            .unwrap_or_else(|| self.types[index].clone());
        list.iter()
            .map(|item| {
                item.downcast::<T>()
                    .ok_or_else(|| DiError::type_mismatch::<T>(element.clone()))
            })
            .collect()
    }
}

// =============================================================================
// Implementation metadata
// =============================================================================

/// Whether an implementation type can be constructed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Concrete,
    Abstract,
    Interface,
}

/// Closing rule of a generic definition: given type arguments, produce the
/// closed implementation, or `None` if the arguments are not acceptable.
pub type GenericCloser = Arc<dyn Fn(&[ServiceType]) -> Option<Implementation> + Send + Sync>;

/// Declared metadata of an implementation type.
///
/// # Examples
///
/// ```rust
/// use dependency_activator::{Constructor, Implementation, Instance, ServiceType};
///
/// struct Greeter {
///     name: String,
/// }
///
/// let greeter = Implementation::new(ServiceType::of::<Greeter>()).constructor(
///     Constructor::new([ServiceType::of::<String>()], |args| {
///         let name = args.get::<String>(0)?;
///         Ok(Instance::new(Greeter { name: name.as_ref().clone() }))
///     }),
/// );
/// assert_eq!(greeter.constructors().len(), 1);
/// ```
#[derive(Clone)]
pub struct Implementation {
    service_type: ServiceType,
    kind: TypeKind,
    constructors: Vec<Constructor>,
    closer: Option<GenericCloser>,
}

impl Implementation {
    /// A concrete type with no constructors yet.
    #[inline]
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            kind: TypeKind::Concrete,
            constructors: Vec::new(),
            closer: None,
        }
    }

    /// An abstract type: declared, never constructible.
    #[inline]
    pub fn abstract_type(service_type: ServiceType) -> Self {
        Self {
            kind: TypeKind::Abstract,
            ..Self::new(service_type)
        }
    }

    /// An interface: declared, never constructible.
    #[inline]
    pub fn interface(service_type: ServiceType) -> Self {
        Self {
            kind: TypeKind::Interface,
            ..Self::new(service_type)
        }
    }

    /// A generic definition (e.g. `Repository<>`) closed on demand by `closer`.
    pub fn generic_definition<F>(service_type: ServiceType, closer: F) -> Self
    where
        F: Fn(&[ServiceType]) -> Option<Implementation> + Send + Sync + 'static,
    {
        debug_assert!(service_type.is_generic_definition());
        Self {
            closer: Some(Arc::new(closer)),
            ..Self::new(service_type)
        }
    }

    /// Add a constructor.
    #[inline]
    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    #[inline]
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// True for an unbound generic definition.
    #[inline]
    pub fn is_generic_definition(&self) -> bool {
        self.service_type.is_generic_definition()
    }

    /// Whether instances can be created from this type once it is closed.
    #[inline]
    pub fn is_concrete(&self) -> bool {
        self.kind == TypeKind::Concrete
    }

    /// Close a generic definition over `args`.
    pub fn close(&self, args: &[ServiceType]) -> Option<Implementation> {
        let closer = self.closer.as_ref()?;
        if args.len() != self.service_type.arity() {
            return None;
        }
        closer(args)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("type", &self.service_type)
            .field("kind", &self.kind)
            .field("constructors", &self.constructors)
            .finish()
    }
}

/// Types that declare their own constructor metadata.
///
/// Implemented by `#[derive(Injectable)]` with the `derive` feature.
pub trait Activate: Send + Sync + 'static {
    /// The implementation metadata for `Self`.
    fn implementation() -> Implementation;
}
