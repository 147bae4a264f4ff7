//! Call-site compilation
//!
//! A call site is an immutable plan describing how to produce an instance
//! for one contract type. Plans are compiled lazily, memoized per contract
//! type for the life of the container, and executed by the scopes.

use crate::constructor;
use crate::registry::{Registration, Registry};
use crate::{
    Constructor, DiError, FactoryFn, Instance, Lifetime, Parameter, Producer, Result,
    ServiceType,
};
use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Identity of a cached instance: the contract plus the registration that
/// produced it. Single and collection resolution of the same registration
/// share one entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) service_type: ServiceType,
    pub(crate) index: usize,
}

/// Which cache a [`CallSite::Cached`] entry lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CacheLocation {
    /// The root cache (singletons)
    Root,
    /// The cache of the scope executing the call site (scoped services)
    Scope,
}

/// A node of a resolution plan.
pub(crate) enum CallSite {
    Constructor {
        implementation: ServiceType,
        constructor: Constructor,
        arguments: Vec<Arc<CallSite>>,
        lifetime: Lifetime,
    },
    Factory {
        service_type: ServiceType,
        factory: FactoryFn,
        lifetime: Lifetime,
    },
    /// Fixed instances and parameter defaults; never disposed by the engine
    Instance(Instance),
    Enumerable {
        element: ServiceType,
        members: Vec<Arc<CallSite>>,
    },
    Cached {
        inner: Arc<CallSite>,
        key: CacheKey,
        location: CacheLocation,
    },
}

impl CallSite {
    /// Lifetime of the produced instance, as far as disposal tracking goes.
    pub(crate) fn lifetime(&self) -> Lifetime {
        match self {
            CallSite::Constructor { lifetime, .. } | CallSite::Factory { lifetime, .. } => {
                *lifetime
            }
            CallSite::Instance(_) => Lifetime::Singleton,
            CallSite::Enumerable { .. } => Lifetime::Transient,
            CallSite::Cached { location, .. } => match location {
                CacheLocation::Root => Lifetime::Singleton,
                CacheLocation::Scope => Lifetime::Scoped,
            },
        }
    }

    /// The first scoped service this plan needs from the executing scope.
    ///
    /// Singletons are not followed: they always execute against the root.
    pub(crate) fn scoped_dependency(&self) -> Option<&ServiceType> {
        match self {
            CallSite::Cached {
                key,
                location: CacheLocation::Scope,
                ..
            } => Some(&key.service_type),
            CallSite::Cached { .. } | CallSite::Factory { .. } | CallSite::Instance(_) => None,
            CallSite::Constructor { arguments, .. } => {
                arguments.iter().find_map(|a| a.scoped_dependency())
            }
            CallSite::Enumerable { members, .. } => {
                members.iter().find_map(|m| m.scoped_dependency())
            }
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallSite::Constructor {
                implementation,
                constructor,
                arguments,
                lifetime,
            } => f
                .debug_struct("Constructor")
                .field("implementation", implementation)
                .field("constructor", &constructor.to_string())
                .field("arguments", arguments)
                .field("lifetime", lifetime)
                .finish(),
            CallSite::Factory {
                service_type,
                lifetime,
                ..
            } => f
                .debug_struct("Factory")
                .field("service_type", service_type)
                .field("lifetime", lifetime)
                .finish(),
            CallSite::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            CallSite::Enumerable { element, members } => f
                .debug_struct("Enumerable")
                .field("element", element)
                .field("members", members)
                .finish(),
            CallSite::Cached {
                inner,
                key,
                location,
            } => f
                .debug_struct("Cached")
                .field("key", key)
                .field("location", location)
                .field("inner", inner)
                .finish(),
        }
    }
}

/// Contract types currently being compiled on this path, outermost first.
#[derive(Default)]
struct Chain {
    links: Vec<(ServiceType, Option<ServiceType>)>,
}

impl Chain {
    fn contains(&self, service_type: &ServiceType) -> bool {
        self.links.iter().any(|(ty, _)| ty == service_type)
    }

    /// Render as `A(AImpl) -> B -> A`.
    fn describe(&self, repeated: &ServiceType) -> String {
        let mut out = String::new();
        for (service_type, implementation) in &self.links {
            out.push_str(&service_type.to_string());
            if let Some(implementation) = implementation.as_ref().filter(|i| *i != service_type) {
                out.push('(');
                out.push_str(&implementation.to_string());
                out.push(')');
            }
            out.push_str(" -> ");
        }
        out.push_str(&repeated.to_string());
        out
    }
}

/// Compiles and memoizes call sites over a [`Registry`].
pub(crate) struct CallSiteBuilder {
    registry: Registry,
    memo: DashMap<ServiceType, Arc<CallSite>, RandomState>,
    validate_scopes: bool,
}

impl CallSiteBuilder {
    pub(crate) fn new(registry: Registry, validate_scopes: bool) -> Self {
        Self {
            registry,
            memo: DashMap::with_hasher(RandomState::new()),
            validate_scopes,
        }
    }

    #[inline]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether a request for `service_type` can be answered at all.
    pub(crate) fn can_resolve(&self, service_type: &ServiceType) -> bool {
        service_type.enumerable_element().is_some() || self.registry.contains(service_type)
    }

    /// The plan for `service_type`, compiling it on first use.
    pub(crate) fn get(&self, service_type: &ServiceType) -> Result<Arc<CallSite>> {
        if let Some(site) = self.memo.get(service_type) {
            #[cfg(feature = "logging")]
            trace!(
                target: "dependency_activator",
                service = %service_type,
                "Call site memo hit"
            );
            return Ok(Arc::clone(site.value()));
        }
        self.build(service_type, None, &mut Chain::default())
    }

    /// Compile the plan for one specific registration, bypassing the memo.
    pub(crate) fn build_registration(&self, index: usize) -> Result<Arc<CallSite>> {
        let service_type = self.registry.descriptors()[index].service_type().clone();
        let registration = self.registry.registration(index, service_type, None);
        self.build_registered(&registration, &mut Chain::default())
    }

    /// Drop every compiled plan.
    pub(crate) fn clear(&self) {
        self.memo.clear();
    }

    #[cfg(test)]
    pub(crate) fn memoized(&self) -> usize {
        self.memo.len()
    }

    fn build(
        &self,
        service_type: &ServiceType,
        activating: Option<&ServiceType>,
        chain: &mut Chain,
    ) -> Result<Arc<CallSite>> {
        if chain.contains(service_type) {
            return Err(DiError::CircularDependency {
                service_type: service_type.clone(),
                chain: chain.describe(service_type),
            });
        }

        if let Some(site) = self.memo.get(service_type) {
            return Ok(Arc::clone(site.value()));
        }

        let site = if let Some(element) = service_type.enumerable_element() {
            self.build_enumerable(service_type, element, chain)?
        } else {
            let registration = self
                .registry
                .lookup(service_type)
                .ok_or_else(|| DiError::unresolved(service_type.clone(), activating.cloned()))?;
            self.build_registered(&registration, chain)?
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_activator",
            service = %service_type,
            lifetime = %site.lifetime(),
            "Compiled call site"
        );

        // Another thread may have published the same plan meanwhile; keep the first
        Ok(Arc::clone(
            self.memo.entry(service_type.clone()).or_insert(site).value(),
        ))
    }

    fn build_enumerable(
        &self,
        service_type: &ServiceType,
        element: &ServiceType,
        chain: &mut Chain,
    ) -> Result<Arc<CallSite>> {
        chain.links.push((service_type.clone(), None));
        let members = self
            .registry
            .lookup_all(element)
            .iter()
            .map(|registration| self.build_registered(registration, chain))
            .collect::<Result<Vec<_>>>();
        chain.links.pop();

        Ok(Arc::new(CallSite::Enumerable {
            element: element.clone(),
            members: members?,
        }))
    }

    fn build_registered(
        &self,
        registration: &Registration,
        chain: &mut Chain,
    ) -> Result<Arc<CallSite>> {
        let service_type = &registration.service_type;
        if chain.contains(service_type) {
            return Err(DiError::CircularDependency {
                service_type: service_type.clone(),
                chain: chain.describe(service_type),
            });
        }

        let lifetime = registration.lifetime;
        let site = match &registration.producer {
            Producer::Instance(instance) => return Ok(Arc::new(CallSite::Instance(instance.clone()))),
            Producer::Factory(factory) => Arc::new(CallSite::Factory {
                service_type: service_type.clone(),
                factory: Arc::clone(factory),
                lifetime,
            }),
            Producer::Type(implementation) => {
                let constructor = constructor::select(implementation, |parameter| {
                    parameter.default_value().is_some()
                        || self.can_resolve(parameter.service_type())
                })?;

                chain.links.push((
                    service_type.clone(),
                    Some(implementation.service_type().clone()),
                ));
                let arguments = constructor
                    .parameters()
                    .iter()
                    .map(|parameter| {
                        self.build_parameter(parameter, implementation.service_type(), chain)
                    })
                    .collect::<Result<Vec<_>>>();
                chain.links.pop();

                Arc::new(CallSite::Constructor {
                    implementation: implementation.service_type().clone(),
                    constructor: constructor.clone(),
                    arguments: arguments?,
                    lifetime,
                })
            }
        };

        let location = match lifetime {
            Lifetime::Transient => return Ok(site),
            Lifetime::Scoped => CacheLocation::Scope,
            Lifetime::Singleton => {
                if self.validate_scopes {
                    if let Some(scoped) = site.scoped_dependency() {
                        return Err(DiError::ScopedInSingleton {
                            scoped: scoped.clone(),
                            singleton: service_type.clone(),
                        });
                    }
                }
                CacheLocation::Root
            }
        };

        Ok(Arc::new(CallSite::Cached {
            inner: site,
            key: CacheKey {
                service_type: service_type.clone(),
                index: registration.index,
            },
            location,
        }))
    }

    fn build_parameter(
        &self,
        parameter: &Parameter,
        activating: &ServiceType,
        chain: &mut Chain,
    ) -> Result<Arc<CallSite>> {
        match parameter.default_value() {
            Some(default) if !self.can_resolve(parameter.service_type()) => {
                Ok(Arc::new(CallSite::Instance(default.clone())))
            }
            _ => self.build(parameter.service_type(), Some(activating), chain),
        }
    }
}

impl fmt::Debug for CallSiteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSiteBuilder")
            .field("registry", &self.registry)
            .field("memoized", &self.memo.len())
            .field("validate_scopes", &self.validate_scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Implementation, ServiceDescriptor};

    struct Unit;

    fn named(name: &'static str) -> ServiceType {
        ServiceType::named(name)
    }

    fn leaf(name: &'static str) -> Implementation {
        Implementation::new(named(name))
            .constructor(Constructor::parameterless(|_| Ok(Instance::new(Unit))))
    }

    fn needs(name: &'static str, params: &[&'static str]) -> Implementation {
        Implementation::new(named(name)).constructor(Constructor::new(
            params.iter().map(|p| named(*p)),
            |_| Ok(Instance::new(Unit)),
        ))
    }

    fn builder(descriptors: Vec<ServiceDescriptor>) -> CallSiteBuilder {
        CallSiteBuilder::new(Registry::build(descriptors).unwrap(), false)
    }

    #[test]
    fn test_lifetimes_wrap_in_cache() {
        let builder = builder(vec![
            ServiceDescriptor::transient(named("T"), leaf("T")),
            ServiceDescriptor::scoped(named("S"), leaf("S")),
            ServiceDescriptor::singleton(named("G"), leaf("G")),
        ]);

        assert!(matches!(*builder.get(&named("T")).unwrap(), CallSite::Constructor { .. }));
        assert!(matches!(
            *builder.get(&named("S")).unwrap(),
            CallSite::Cached { location: CacheLocation::Scope, .. }
        ));
        assert!(matches!(
            *builder.get(&named("G")).unwrap(),
            CallSite::Cached { location: CacheLocation::Root, .. }
        ));
    }

    #[test]
    fn test_memoized_per_contract() {
        let builder = builder(vec![ServiceDescriptor::transient(named("A"), leaf("A"))]);

        let first = builder.get(&named("A")).unwrap();
        let second = builder.get(&named("A")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.memoized(), 1);

        builder.clear();
        assert_eq!(builder.memoized(), 0);
    }

    #[test]
    fn test_missing_dependency_names_activating_type() {
        let builder = builder(vec![ServiceDescriptor::transient(
            named("DependOnNonexistentService"),
            needs("DependOnNonexistentService", &["IFakeService"]),
        )]);

        let err = builder.get(&named("DependOnNonexistentService")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resolve service for type 'IFakeService' while attempting to activate 'DependOnNonexistentService'."
        );

        let many = ServiceType::enumerable(named("DependOnNonexistentService"));
        let err = builder.get(&many).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resolve service for type 'IFakeService' while attempting to activate 'DependOnNonexistentService'."
        );
    }

    #[test]
    fn test_top_level_missing() {
        let builder = builder(vec![]);
        let err = builder.get(&named("IFakeService")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No service for type 'IFakeService' has been registered."
        );
    }

    #[test]
    fn test_circular_dependency() {
        let builder = builder(vec![
            ServiceDescriptor::transient(named("A"), needs("AImpl", &["B"])),
            ServiceDescriptor::transient(named("B"), needs("B", &["A"])),
        ]);

        let err = builder.get(&named("A")).unwrap_err();
        assert!(matches!(err, DiError::CircularDependency { .. }));
        assert_eq!(
            err.to_string(),
            "A circular dependency was detected for the service of type 'A'.\nA(AImpl) -> B -> A"
        );
        assert_eq!(builder.memoized(), 0);
    }

    #[test]
    fn test_self_dependency() {
        let builder = builder(vec![ServiceDescriptor::transient(
            named("Loop"),
            needs("Loop", &["Loop"]),
        )]);
        assert!(matches!(
            builder.get(&named("Loop")),
            Err(DiError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_empty_enumerable() {
        let builder = builder(vec![]);
        let site = builder.get(&ServiceType::enumerable(named("IPlugin"))).unwrap();
        match &*site {
            CallSite::Enumerable { element, members } => {
                assert_eq!(element, &named("IPlugin"));
                assert!(members.is_empty());
            }
            other => panic!("unexpected call site {other:?}"),
        }
    }

    #[test]
    fn test_enumerable_shares_cache_key_with_single() {
        let builder = builder(vec![
            ServiceDescriptor::singleton(named("IPlugin"), leaf("First")),
            ServiceDescriptor::singleton(named("IPlugin"), leaf("Second")),
        ]);

        let single = builder.get(&named("IPlugin")).unwrap();
        let all = builder.get(&ServiceType::enumerable(named("IPlugin"))).unwrap();

        let CallSite::Cached { key: single_key, .. } = &*single else {
            panic!("expected cached call site");
        };
        let CallSite::Enumerable { members, .. } = &*all else {
            panic!("expected enumerable call site");
        };
        let keys: Vec<usize> = members
            .iter()
            .map(|m| match &**m {
                CallSite::Cached { key, .. } => key.index,
                _ => usize::MAX,
            })
            .collect();

        assert_eq!(keys, vec![0, 1]);
        assert_eq!(single_key.index, 1);
    }

    #[test]
    fn test_default_parameter_becomes_instance() {
        let implementation = Implementation::new(named("Client")).constructor(Constructor::new(
            [Parameter::new(named("Retries")).with_default(Instance::new(3u32))],
            |_| Ok(Instance::new(Unit)),
        ));
        let builder = builder(vec![ServiceDescriptor::transient(named("Client"), implementation)]);

        let site = builder.get(&named("Client")).unwrap();
        let CallSite::Constructor { arguments, .. } = &*site else {
            panic!("expected constructor call site");
        };
        assert!(matches!(*arguments[0], CallSite::Instance(_)));
    }

    #[test]
    fn test_scoped_in_singleton_rejected_when_validating() {
        let registry = Registry::build(vec![
            ServiceDescriptor::scoped(named("Session"), leaf("Session")),
            ServiceDescriptor::singleton(named("Cache"), needs("Cache", &["Session"])),
        ])
        .unwrap();
        let builder = CallSiteBuilder::new(registry, true);

        let err = builder.get(&named("Cache")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot consume scoped service 'Session' from singleton 'Cache'."
        );
    }

    #[test]
    fn test_scoped_dependency_through_transient() {
        let builder = builder(vec![
            ServiceDescriptor::scoped(named("Session"), leaf("Session")),
            ServiceDescriptor::transient(named("Handler"), needs("Handler", &["Session"])),
        ]);

        let site = builder.get(&named("Handler")).unwrap();
        assert_eq!(site.scoped_dependency(), Some(&named("Session")));
    }
}
