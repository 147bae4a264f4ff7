//! Root container
//!
//! The `Container` owns the descriptor registry, the call-site memo and the
//! root scope. Child scopes share everything but their scoped instances and
//! their disposables.

use crate::engine::Engine;
use crate::registry::Registry;
use crate::{ContainerOptions, Result, Scope, ServiceDescriptor};
use std::ops::Deref;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Dependency injection container built from a finalized descriptor list.
///
/// Derefs to its root [`Scope`], so everything a scope can do is available
/// on the container directly. Dropping the container disposes the root.
///
/// # Examples
///
/// ```rust
/// use dependency_activator::{Constructor, Container, Implementation, Instance, ServiceDescriptor, ServiceType};
/// use std::sync::Arc;
///
/// struct Database {
///     url: String,
/// }
///
/// struct UserService {
///     db: Arc<Database>,
/// }
///
/// let database = Implementation::new(ServiceType::of::<Database>()).constructor(
///     Constructor::parameterless(|_| {
///         Ok(Instance::new(Database { url: "postgres://localhost".into() }))
///     }),
/// );
/// let users = Implementation::new(ServiceType::of::<UserService>()).constructor(
///     Constructor::new([ServiceType::of::<Database>()], |args| {
///         Ok(Instance::new(UserService { db: args.get::<Database>(0)? }))
///     }),
/// );
///
/// let container = Container::build([
///     ServiceDescriptor::singleton(ServiceType::of::<Database>(), database),
///     ServiceDescriptor::transient(ServiceType::of::<UserService>(), users),
/// ])
/// .unwrap();
///
/// let service = container.get::<UserService>().unwrap();
/// assert_eq!(service.db.url, "postgres://localhost");
/// assert!(Arc::ptr_eq(&service.db, &container.get::<Database>().unwrap()));
/// ```
pub struct Container {
    root: Scope,
}

impl Container {
    /// Build a container with default options.
    #[inline]
    pub fn build(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Result<Self> {
        Self::build_with_options(descriptors, ContainerOptions::default())
    }

    /// Build a container.
    ///
    /// Registrations that can never be satisfied are rejected here. With
    /// [`ContainerOptions::with_build_validation`], every registration's
    /// call site is also compiled up front.
    pub fn build_with_options(
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
        options: ContainerOptions,
    ) -> Result<Self> {
        let registry = Registry::build(descriptors)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_activator",
            descriptors = registry.len(),
            validate_scopes = options.validate_scopes(),
            validate_on_build = options.validate_on_build(),
            "Building DI container"
        );

        let engine = Arc::new(Engine::new(registry, options));
        if options.validate_on_build() {
            engine.validate()?;
        }

        Ok(Self {
            root: Scope::root(engine),
        })
    }

    /// The descriptors this container was built from.
    #[inline]
    pub fn registry(&self) -> &Registry {
        self.root_engine().registry()
    }

    #[inline]
    pub fn options(&self) -> ContainerOptions {
        self.root_engine().options()
    }

    /// The root scope.
    #[inline]
    pub fn root(&self) -> &Scope {
        &self.root
    }

    fn root_engine(&self) -> &Engine {
        self.root.engine()
    }
}

impl Deref for Container {
    type Target = Scope;

    #[inline]
    fn deref(&self) -> &Scope {
        &self.root
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registry", self.registry())
            .field("root", &self.root)
            .finish()
    }
}
