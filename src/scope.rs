//! Scopes
//!
//! A scope owns the instances cached for it (scoped services; singletons
//! too, for the root) and the disposables created within it.

use crate::call_site::CacheKey;
use crate::engine::Engine;
use crate::{DiError, Dispose, Instance, Result, ServiceType};
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Unique scope identifier.
///
/// Each scope gets a unique ID for tracking and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Generate a new unique scope ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Something a thread is in the middle of producing for a scope.
#[derive(Clone, PartialEq, Eq)]
enum Activation {
    /// A cache entry being filled
    Cached(CacheKey),
    /// A factory being called; transient factories have no cache entry
    Factory(ServiceType),
}

impl Activation {
    fn service_type(&self) -> &ServiceType {
        match self {
            Activation::Cached(key) => &key.service_type,
            Activation::Factory(service_type) => service_type,
        }
    }
}

thread_local! {
    /// Activations this thread is currently running, innermost last.
    static CONSTRUCTING: RefCell<Vec<(ScopeId, Activation)>> = const { RefCell::new(Vec::new()) };
}

/// Marks an activation as running on this thread.
///
/// Re-entering the same cache entry would block forever on its own
/// `OnceCell`, and re-entering the same factory would recurse without end,
/// so both are reported as a circular dependency instead.
pub(crate) struct ConstructionGuard;

impl ConstructionGuard {
    /// Guard a call of the factory registered for `service_type`.
    pub(crate) fn factory(scope: ScopeId, service_type: &ServiceType) -> Result<Self> {
        Self::enter(scope, Activation::Factory(service_type.clone()))
    }

    fn enter(scope: ScopeId, activation: Activation) -> Result<Self> {
        CONSTRUCTING.with(|active| {
            let mut active = active.borrow_mut();
            if active.iter().any(|(id, a)| *id == scope && *a == activation) {
                let service_type = activation.service_type();
                return Err(DiError::CircularDependency {
                    service_type: service_type.clone(),
                    chain: format!("{service_type} -> {service_type}"),
                });
            }
            active.push((scope, activation));
            Ok(ConstructionGuard)
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

/// Per-scope state shared between the scope handle and the engine.
pub(crate) struct ScopeState {
    id: ScopeId,
    cache: DashMap<CacheKey, Arc<OnceCell<Instance>>, RandomState>,
    disposed: AtomicBool,
    /// Disposables in creation order; also serializes disposal against capture
    disposables: Mutex<Vec<Arc<dyn Dispose>>>,
}

impl ScopeState {
    pub(crate) fn new() -> Self {
        Self {
            id: ScopeId::new(),
            cache: DashMap::with_hasher(RandomState::new()),
            disposed: AtomicBool::new(false),
            disposables: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// The cached instance for `key`, creating it exactly once.
    ///
    /// Concurrent callers for the same key wait for the first one; a failed
    /// creation leaves the entry empty.
    pub(crate) fn get_or_create(
        &self,
        key: &CacheKey,
        create: impl FnOnce() -> Result<Instance>,
    ) -> Result<Instance> {
        let cell = Arc::clone(self.cache.entry(key.clone()).or_default().value());

        if let Some(instance) = cell.get() {
            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_activator",
                service = %key.service_type,
                scope_id = self.id.id(),
                "Scope cache hit"
            );
            return Ok(instance.clone());
        }

        let _guard = ConstructionGuard::enter(self.id, Activation::Cached(key.clone()))?;
        cell.get_or_try_init(create).cloned()
    }

    /// Take ownership of `instance` for disposal, if it is disposable.
    ///
    /// An instance created after this scope was disposed is disposed on the
    /// spot and the resolution fails.
    pub(crate) fn capture(&self, instance: &Instance) -> Result<()> {
        let Some(disposer) = instance.disposer() else {
            return Ok(());
        };

        let mut disposables = self
            .disposables
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_disposed() {
            drop(disposables);
            disposer.dispose();
            return Err(DiError::ScopeDisposed);
        }
        disposables.push(Arc::clone(disposer));
        Ok(())
    }

    /// Dispose tracked instances in reverse creation order. Idempotent.
    pub(crate) fn dispose(&self) {
        let disposables = {
            let mut disposables = self
                .disposables
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *disposables)
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_activator",
            scope_id = self.id.id(),
            disposables = disposables.len(),
            "Disposing scope"
        );

        for disposable in disposables.iter().rev() {
            disposable.dispose();
        }
        self.cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.disposables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for ScopeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeState")
            .field("id", &self.id)
            .field("cached", &self.cache.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Resolves services on behalf of one scope.
///
/// Handed to factory producers so they can pull further services from the
/// scope executing them; singleton factories always receive the root.
///
/// A factory that resolves its own contract on the same thread fails with
/// [`DiError::CircularDependency`]. Cycle detection is per thread, though:
/// two cached factories that resolve each other, started concurrently on
/// two threads, wait on each other's cache entry forever.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    engine: &'a Engine,
    scope: &'a Arc<ScopeState>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(engine: &'a Engine, scope: &'a Arc<ScopeState>) -> Self {
        Self { engine, scope }
    }

    /// Resolve one instance of `service_type`.
    #[inline]
    pub fn resolve(&self, service_type: &ServiceType) -> Result<Instance> {
        self.engine.resolve(service_type, self.scope)
    }

    /// Resolve `service_type`, or `None` if nothing is registered for it.
    ///
    /// Only the requested contract may be missing; gaps further down the
    /// graph still fail.
    #[inline]
    pub fn try_resolve(&self, service_type: &ServiceType) -> Result<Option<Instance>> {
        self.engine.try_resolve(service_type, self.scope)
    }

    /// Every implementation of `service_type`, in registration order.
    pub fn resolve_all(&self, service_type: &ServiceType) -> Result<Vec<Instance>> {
        let many = ServiceType::enumerable(service_type.clone());
        let list = self.resolve(&many)?;
        list.downcast::<crate::ServiceList>()
            .map(|list| list.to_vec())
            .ok_or_else(|| DiError::type_mismatch::<crate::ServiceList>(many))
    }

    /// Resolve the service registered under `ServiceType::of::<T>()`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let service_type = ServiceType::of::<T>();
        self.resolve(&service_type)?
            .downcast::<T>()
            .ok_or_else(|| DiError::type_mismatch::<T>(service_type))
    }

    /// Resolve every service registered under `ServiceType::of::<T>()`.
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        let service_type = ServiceType::of::<T>();
        self.resolve_all(&service_type)?
            .iter()
            .map(|instance| {
                instance
                    .downcast::<T>()
                    .ok_or_else(|| DiError::type_mismatch::<T>(service_type.clone()))
            })
            .collect()
    }

    /// Identifier of the scope this resolver works for.
    #[inline]
    pub fn scope_id(&self) -> ScopeId {
        self.scope.id()
    }
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("scope", &self.scope.id())
            .finish()
    }
}

/// A resolution scope.
///
/// Scoped services resolve to one instance per scope; singletons are shared
/// with the root. Dropping a scope disposes it.
///
/// # Examples
///
/// ```rust
/// use dependency_activator::{Constructor, Container, Implementation, Instance, ServiceDescriptor, ServiceType};
///
/// struct RequestContext;
///
/// let context = Implementation::new(ServiceType::of::<RequestContext>())
///     .constructor(Constructor::parameterless(|_| Ok(Instance::new(RequestContext))));
///
/// let container = Container::build([ServiceDescriptor::scoped(
///     ServiceType::of::<RequestContext>(),
///     context,
/// )])
/// .unwrap();
///
/// let first = container.create_scope();
/// let second = container.create_scope();
///
/// let a = first.get::<RequestContext>().unwrap();
/// let b = second.get::<RequestContext>().unwrap();
/// assert!(!std::sync::Arc::ptr_eq(&a, &b));
/// assert!(std::sync::Arc::ptr_eq(&a, &first.get::<RequestContext>().unwrap()));
/// ```
pub struct Scope {
    engine: Arc<Engine>,
    state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn root(engine: Arc<Engine>) -> Self {
        let state = Arc::clone(engine.root());
        Self { engine, state }
    }

    /// Create a child scope with its own scoped instances and disposables.
    pub fn create_scope(&self) -> Scope {
        let state = Arc::new(ScopeState::new());

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_activator",
            scope_id = state.id().id(),
            parent_scope_id = self.state.id().id(),
            "Creating child scope"
        );

        Scope {
            engine: Arc::clone(&self.engine),
            state,
        }
    }

    #[inline]
    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    /// A resolver bound to this scope.
    #[inline]
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.engine, &self.state)
    }

    /// Resolve one instance of `service_type`.
    #[inline]
    pub fn resolve(&self, service_type: &ServiceType) -> Result<Instance> {
        self.resolver().resolve(service_type)
    }

    /// Resolve `service_type`, or `None` if nothing is registered for it.
    #[inline]
    pub fn try_resolve(&self, service_type: &ServiceType) -> Result<Option<Instance>> {
        self.resolver().try_resolve(service_type)
    }

    /// Every implementation of `service_type`, in registration order.
    #[inline]
    pub fn resolve_all(&self, service_type: &ServiceType) -> Result<Vec<Instance>> {
        self.resolver().resolve_all(service_type)
    }

    /// Typed resolution by `ServiceType::of::<T>()`.
    #[inline]
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolver().get::<T>()
    }

    /// Typed collection resolution by `ServiceType::of::<T>()`.
    #[inline]
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.resolver().get_all::<T>()
    }

    /// Dispose this scope; disposing the root scope disposes the container.
    ///
    /// Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.is_root() {
            self.engine.dispose_root();
        } else {
            self.state.dispose();
        }
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.state.id()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        Arc::ptr_eq(&self.state, self.engine.root())
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &Arc<ScopeState> {
        &self.state
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.state.id())
            .field("root", &self.is_root())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
