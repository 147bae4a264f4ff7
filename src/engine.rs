//! Resolution engine
//!
//! Executes call sites against a scope: resolves arguments depth-first,
//! invokes producers, consults the per-lifetime caches and hands
//! disposables to the scope that owns them.

use crate::call_site::{CacheLocation, CallSite, CallSiteBuilder};
use crate::registry::Registry;
use crate::scope::{ConstructionGuard, Resolver, ScopeState};
use crate::{
    Arguments, ContainerOptions, DiError, Instance, Lifetime, Result, ServiceList, ServiceType,
};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Shared state of a container: call sites, options and the root scope.
pub(crate) struct Engine {
    call_sites: CallSiteBuilder,
    root: Arc<ScopeState>,
    options: ContainerOptions,
}

impl Engine {
    pub(crate) fn new(registry: Registry, options: ContainerOptions) -> Self {
        Self {
            call_sites: CallSiteBuilder::new(registry, options.validate_scopes()),
            root: Arc::new(ScopeState::new()),
            options,
        }
    }

    #[inline]
    pub(crate) fn root(&self) -> &Arc<ScopeState> {
        &self.root
    }

    #[inline]
    pub(crate) fn registry(&self) -> &Registry {
        self.call_sites.registry()
    }

    #[inline]
    pub(crate) fn options(&self) -> ContainerOptions {
        self.options
    }

    pub(crate) fn resolve(&self, service_type: &ServiceType, scope: &Arc<ScopeState>) -> Result<Instance> {
        self.ensure_open(scope)?;

        let site = self.call_sites.get(service_type)?;

        if self.options.validate_scopes() && Arc::ptr_eq(scope, &self.root) {
            if let Some(scoped) = site.scoped_dependency() {
                return Err(DiError::ScopedFromRoot {
                    service_type: service_type.clone(),
                    scoped: scoped.clone(),
                });
            }
        }

        self.execute(&site, scope)
    }

    pub(crate) fn try_resolve(
        &self,
        service_type: &ServiceType,
        scope: &Arc<ScopeState>,
    ) -> Result<Option<Instance>> {
        self.ensure_open(scope)?;
        if !self.call_sites.can_resolve(service_type) {
            return Ok(None);
        }
        self.resolve(service_type, scope).map(Some)
    }

    /// Compile every registration up front, reporting the first failure.
    pub(crate) fn validate(&self) -> Result<()> {
        for (index, descriptor) in self.registry().descriptors().iter().enumerate() {
            if descriptor.service_type().is_generic_definition() {
                continue;
            }
            self.call_sites
                .build_registration(index)
                .map_err(|source| DiError::Validation {
                    descriptor: descriptor.to_string(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    /// Dispose the root scope and forget every compiled call site.
    pub(crate) fn dispose_root(&self) {
        if self.root.is_disposed() {
            return;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "dependency_activator",
            scope_id = self.root.id().id(),
            "Disposing container"
        );

        self.root.dispose();
        self.call_sites.clear();
    }

    #[cfg(test)]
    pub(crate) fn memoized(&self) -> usize {
        self.call_sites.memoized()
    }

    fn ensure_open(&self, scope: &ScopeState) -> Result<()> {
        if scope.is_disposed() || self.root.is_disposed() {
            return Err(DiError::ScopeDisposed);
        }
        Ok(())
    }

    fn execute(&self, site: &CallSite, scope: &Arc<ScopeState>) -> Result<Instance> {
        match site {
            CallSite::Instance(instance) => Ok(instance.clone()),

            CallSite::Constructor {
                implementation,
                constructor,
                arguments,
                lifetime,
            } => {
                let values = arguments
                    .iter()
                    .map(|argument| self.execute(argument, scope))
                    .collect::<Result<Vec<_>>>()?;
                let types = constructor
                    .parameters()
                    .iter()
                    .map(|parameter| parameter.service_type().clone())
                    .collect();

                let instance = constructor.invoke(Arguments::new(values, types))?;

                #[cfg(feature = "logging")]
                trace!(
                    target: "dependency_activator",
                    implementation = %implementation,
                    lifetime = %lifetime,
                    scope_id = scope.id().id(),
                    "Activated instance"
                );
                #[cfg(not(feature = "logging"))]
                let _ = implementation;

                self.track(instance, *lifetime, scope)
            }

            CallSite::Factory {
                service_type,
                factory,
                lifetime,
            } => {
                let instance = {
                    let _guard = ConstructionGuard::factory(scope.id(), service_type)?;
                    factory(&Resolver::new(self, scope)).map_err(DiError::from_producer)?
                };

                #[cfg(feature = "logging")]
                trace!(
                    target: "dependency_activator",
                    service = %service_type,
                    lifetime = %lifetime,
                    scope_id = scope.id().id(),
                    "Factory produced instance"
                );

                self.track(instance, *lifetime, scope)
            }

            CallSite::Enumerable { members, .. } => {
                let items = members
                    .iter()
                    .map(|member| self.execute(member, scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Instance::new(ServiceList::new(items)))
            }

            CallSite::Cached {
                inner,
                key,
                location,
            } => {
                let owner = match location {
                    CacheLocation::Root => &self.root,
                    CacheLocation::Scope => scope,
                };
                owner.get_or_create(key, || {
                    let instance = self.execute(inner, owner)?;
                    owner.capture(&instance)?;
                    Ok(instance)
                })
            }
        }
    }

    /// Transients belong to the scope that resolved them; cached lifetimes
    /// are captured by their owning scope when they enter its cache.
    fn track(&self, instance: Instance, lifetime: Lifetime, scope: &ScopeState) -> Result<Instance> {
        if lifetime == Lifetime::Transient {
            scope.capture(&instance)?;
        }
        Ok(instance)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("call_sites", &self.call_sites)
            .field("root", &self.root)
            .field("options", &self.options)
            .finish()
    }
}
