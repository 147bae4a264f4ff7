//! # Dependency Activator - Dependency Resolution Engine for Rust
//!
//! Builds object graphs from a finalized list of service descriptors:
//! selects constructors, resolves dependencies transitively, enforces
//! lifetimes and disposes what it created.
//!
//! ## Features
//!
//! - 🧩 **Declared constructors** - Implementations describe their constructors; the engine picks one
//! - 🔄 **Lifetimes** - Transient, scoped and singleton, with child scopes
//! - 🧬 **Open generics** - `IRepository<>` registrations close on demand
//! - 📚 **Collections** - Every implementation of a contract, in registration order
//! - 🔒 **Thread-safe** - `DashMap` caches with exactly-once singleton construction
//! - ♻️ **Disposal** - Owned instances disposed in reverse creation order
//! - 📊 **Observable** - Optional tracing integration with JSON or pretty output
//! - 🛠️ **Derive** - `#[derive(Injectable)]` generates constructor metadata (feature `derive`)
//!
//! ## Quick Start
//!
//! ```rust
//! use dependency_activator::{
//!     Constructor, Container, Implementation, Instance, ServiceDescriptor, ServiceType,
//! };
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".into()
//!     }
//! }
//!
//! let english = Implementation::new(ServiceType::of::<English>()).constructor(
//!     Constructor::parameterless(|_| Ok(Instance::from_arc(Arc::new(English) as Arc<dyn Greeter>))),
//! );
//!
//! let container = Container::build([ServiceDescriptor::singleton(
//!     ServiceType::of::<dyn Greeter>(),
//!     english,
//! )])
//! .unwrap();
//!
//! let greeter = container.get::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Transient** - a new instance on every resolve, never cached
//! - **Scoped** - one instance per scope; resolved through the root it
//!   lives as long as the root, like a singleton
//! - **Singleton** - one instance owned by the root, shared by every scope
//!
//! ## Collections
//!
//! ```rust
//! use dependency_activator::{Container, Instance, ServiceDescriptor, ServiceType};
//!
//! let plugin = ServiceType::named("IPlugin");
//! let container = Container::build([
//!     ServiceDescriptor::instance(plugin.clone(), Instance::new("auth")),
//!     ServiceDescriptor::instance(plugin.clone(), Instance::new("metrics")),
//! ])
//! .unwrap();
//!
//! let names: Vec<&str> = container
//!     .resolve_all(&plugin)
//!     .unwrap()
//!     .iter()
//!     .map(|i| *i.downcast::<&str>().unwrap())
//!     .collect();
//! assert_eq!(names, ["auth", "metrics"]);
//! ```

mod call_site;
mod constructor;
mod container;
mod engine;
mod error;
mod factory;
#[cfg(feature = "logging")]
pub mod logging;
mod options;
mod provider;
mod registry;
mod scope;
mod service_type;

pub use container::*;
pub use error::*;
pub use factory::*;
pub use options::*;
pub use provider::*;
pub use registry::Registry;
pub use scope::*;
pub use service_type::*;

#[cfg(feature = "derive")]
pub use dependency_activator_derive::Injectable;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Activate, Arguments, Constructor, Container, ContainerOptions, DiError, Dispose,
        Implementation, Instance, Lifetime, Parameter, Resolver, Result, Scope,
        ServiceDescriptor, ServiceType, descriptor,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn named(name: &'static str) -> ServiceType {
        ServiceType::named(name)
    }

    fn unit(name: &'static str) -> Implementation {
        Implementation::new(named(name))
            .constructor(Constructor::parameterless(move |_| Ok(Instance::new(name))))
    }

    fn label(instance: &Instance) -> &'static str {
        *instance.downcast::<&'static str>().unwrap()
    }

    #[test]
    fn test_singleton_idempotence() {
        let container =
            Container::build([ServiceDescriptor::singleton(named("IClock"), unit("Clock"))]).unwrap();

        let a = container.resolve(&named("IClock")).unwrap();
        let b = container.resolve(&named("IClock")).unwrap();
        assert!(Instance::ptr_eq(&a, &b));
    }

    #[test]
    fn test_transient_distinct_equal_state() {
        let container =
            Container::build([ServiceDescriptor::transient(named("IClock"), unit("Clock"))]).unwrap();

        let a = container.resolve(&named("IClock")).unwrap();
        let b = container.resolve(&named("IClock")).unwrap();
        assert!(!Instance::ptr_eq(&a, &b));
        assert_eq!(label(&a), label(&b));
    }

    #[test]
    fn test_scoped_collapses_at_root() {
        let container =
            Container::build([ServiceDescriptor::scoped(named("IUnitOfWork"), unit("UnitOfWork"))])
                .unwrap();

        let root_a = container.resolve(&named("IUnitOfWork")).unwrap();
        let root_b = container.resolve(&named("IUnitOfWork")).unwrap();
        assert!(Instance::ptr_eq(&root_a, &root_b));

        let first = container.create_scope();
        let second = container.create_scope();
        let a = first.resolve(&named("IUnitOfWork")).unwrap();
        let b = second.resolve(&named("IUnitOfWork")).unwrap();
        assert!(!Instance::ptr_eq(&a, &b));
        assert!(!Instance::ptr_eq(&a, &root_a));
    }

    #[test]
    fn test_fixed_instance_never_disposed() {
        static DISPOSED: AtomicU32 = AtomicU32::new(0);

        struct External;
        impl Dispose for External {
            fn dispose(&self) {
                DISPOSED.fetch_add(1, Ordering::SeqCst);
            }
        }

        let container = Container::build([ServiceDescriptor::instance(
            named("External"),
            Instance::disposable(External),
        )])
        .unwrap();

        let scope = container.create_scope();
        scope.resolve(&named("External")).unwrap();
        container.resolve(&named("External")).unwrap();
        scope.dispose();
        container.dispose();
        drop(container);

        assert_eq!(DISPOSED.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collection_in_registration_order() {
        let plugin = named("IPlugin");
        let container = Container::build([
            ServiceDescriptor::transient(plugin.clone(), unit("First")),
            ServiceDescriptor::singleton(plugin.clone(), unit("Second")),
            ServiceDescriptor::instance(plugin.clone(), Instance::new("Third")),
            ServiceDescriptor::scoped(plugin.clone(), unit("Fourth")),
        ])
        .unwrap();

        let labels: Vec<&str> = container.resolve_all(&plugin).unwrap().iter().map(label).collect();
        assert_eq!(labels, ["First", "Second", "Third", "Fourth"]);

        // Single resolution takes the last registration
        assert_eq!(label(&container.resolve(&plugin).unwrap()), "Fourth");

        assert!(container.resolve_all(&named("INothing")).unwrap().is_empty());
    }

    #[test]
    fn test_collection_shares_singletons() {
        let plugin = named("IPlugin");
        let container = Container::build([
            ServiceDescriptor::singleton(plugin.clone(), unit("Only")),
        ])
        .unwrap();

        let single = container.resolve(&plugin).unwrap();
        let all = container.resolve_all(&plugin).unwrap();
        assert!(Instance::ptr_eq(&single, &all[0]));
    }

    fn depend_on_nonexistent() -> Vec<ServiceDescriptor> {
        let implementation = Implementation::new(named("DependOnNonexistentService")).constructor(
            Constructor::new([named("IFakeService")], |_| Ok(Instance::new(()))),
        );
        vec![ServiceDescriptor::transient(
            named("DependOnNonexistentService"),
            implementation,
        )]
    }

    #[test]
    fn test_unresolved_dependency_message() {
        let container = Container::build(depend_on_nonexistent()).unwrap();
        let expected = "Unable to resolve service for type 'IFakeService' while attempting to activate 'DependOnNonexistentService'.";

        let err = container.resolve(&named("DependOnNonexistentService")).unwrap_err();
        assert_eq!(err.to_string(), expected);

        let err = container
            .resolve_all(&named("DependOnNonexistentService"))
            .unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_private_constructor_message() {
        let private = Implementation::new(named("Acme.PrivateCtor")).constructor(
            Constructor::private(std::iter::empty::<Parameter>(), |_| Ok(Instance::new(()))),
        );
        let dependent = Implementation::new(named("Acme.Dependent")).constructor(
            Constructor::new([named("Acme.PrivateCtor")], |_| Ok(Instance::new(()))),
        );
        let container = Container::build([
            ServiceDescriptor::transient(named("Acme.PrivateCtor"), private),
            ServiceDescriptor::transient(named("Acme.Dependent"), dependent),
        ])
        .unwrap();

        let err = container.resolve(&named("Acme.Dependent")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "A suitable constructor for type 'Acme.PrivateCtor' could not be located. Ensure the type is concrete and services are registered for all parameters of a public constructor."
        );
    }

    #[test]
    fn test_open_definition_for_closed_contract_rejected() {
        let list = Implementation::generic_definition(ServiceType::generic_definition("List", 1), |args| {
            Some(Implementation::new(ServiceType::generic_definition("List", 1).close(args.to_vec())))
        });
        let contract = ServiceType::generic_definition("IList", 1).close([named("int")]);

        let err = Container::build([ServiceDescriptor::transient(contract, list)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot instantiate implementation type 'List<>' for service type 'IList<int>'."
        );
    }

    #[derive(Debug)]
    struct LabeledFailure(&'static str);

    impl fmt::Display for LabeledFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constructor failed: {}", self.0)
        }
    }

    impl std::error::Error for LabeledFailure {}

    #[test]
    fn test_producer_failure_transparent() {
        let throwing = Implementation::new(named("Throwing")).constructor(
            Constructor::parameterless(|_| Err(LabeledFailure("boom").into())),
        );
        let consumer = Implementation::new(named("Consumer")).constructor(Constructor::new(
            [named("Throwing")],
            |_| Ok(Instance::new(())),
        ));
        let container = Container::build([
            ServiceDescriptor::transient(named("Throwing"), throwing),
            ServiceDescriptor::transient(named("Consumer"), consumer),
            ServiceDescriptor::factory(named("ViaFactory"), Lifetime::Transient, |r| {
                r.resolve(&named("Throwing"))?;
                Ok(Instance::new(()))
            }),
        ])
        .unwrap();

        for contract in ["Throwing", "Consumer", "ViaFactory"] {
            let err = container.resolve(&named(contract)).unwrap_err();
            assert_eq!(err.to_string(), "constructor failed: boom");
            assert_eq!(err.producer_error::<LabeledFailure>().unwrap().0, "boom");
        }
    }

    #[test]
    fn test_factory_resolution_failure_surfaces_unchanged() {
        let container = Container::build([ServiceDescriptor::factory(
            named("Lazy"),
            Lifetime::Transient,
            |r| {
                r.resolve(&named("Missing"))?;
                Ok(Instance::new(()))
            },
        )])
        .unwrap();

        let err = container.resolve(&named("Lazy")).unwrap_err();
        assert!(matches!(err, DiError::UnresolvedService { .. }));
        assert_eq!(err.to_string(), "No service for type 'Missing' has been registered.");
    }

    #[test]
    fn test_circular_dependency() {
        let a = Implementation::new(named("A"))
            .constructor(Constructor::new([named("B")], |_| Ok(Instance::new(()))));
        let b = Implementation::new(named("B"))
            .constructor(Constructor::new([named("C")], |_| Ok(Instance::new(()))));
        let c = Implementation::new(named("C"))
            .constructor(Constructor::new([named("A")], |_| Ok(Instance::new(()))));
        let container = Container::build([
            ServiceDescriptor::singleton(named("A"), a),
            ServiceDescriptor::scoped(named("B"), b),
            ServiceDescriptor::transient(named("C"), c),
        ])
        .unwrap();

        let err = container.resolve(&named("A")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "A circular dependency was detected for the service of type 'A'.\nA -> B -> C -> A"
        );
    }

    #[test]
    fn test_factory_resolving_itself_is_circular() {
        let container = Container::build([ServiceDescriptor::factory(
            named("Ouroboros"),
            Lifetime::Singleton,
            |r| Ok(r.resolve(&named("Ouroboros"))?),
        )])
        .unwrap();

        let err = container.resolve(&named("Ouroboros")).unwrap_err();
        assert!(matches!(err, DiError::CircularDependency { .. }));
    }

    #[test]
    fn test_transient_factory_resolving_itself_is_circular() {
        let container = Container::build([ServiceDescriptor::factory(
            named("Loop"),
            Lifetime::Transient,
            |r| Ok(r.resolve(&named("Loop"))?),
        )])
        .unwrap();

        let err = container.resolve(&named("Loop")).unwrap_err();
        assert!(matches!(err, DiError::CircularDependency { .. }));

        let scope = container.create_scope();
        let err = scope.resolve_all(&named("Loop")).unwrap_err();
        assert!(matches!(err, DiError::CircularDependency { .. }));
    }

    #[test]
    fn test_transient_factories_resolving_each_other_are_circular() {
        let container = Container::build([
            ServiceDescriptor::factory(named("Ping"), Lifetime::Transient, |r| {
                Ok(r.resolve(&named("Pong"))?)
            }),
            ServiceDescriptor::factory(named("Pong"), Lifetime::Transient, |r| {
                Ok(r.resolve(&named("Ping"))?)
            }),
        ])
        .unwrap();

        let err = container.resolve(&named("Ping")).unwrap_err();
        assert!(matches!(
            err,
            DiError::CircularDependency { ref service_type, .. } if *service_type == named("Ping")
        ));
    }

    #[test]
    fn test_transient_factory_may_resolve_other_services() {
        let container = Container::build([
            ServiceDescriptor::instance(named("Config"), Instance::new(3u32)),
            ServiceDescriptor::factory(named("Reader"), Lifetime::Transient, |r| {
                let config = r.resolve(&named("Config"))?;
                let value = config.downcast::<u32>().map_or(0, |v| *v);
                Ok(Instance::new(value * 2))
            }),
        ])
        .unwrap();

        // The guard is released once the factory returns
        for _ in 0..2 {
            let reader = container.resolve(&named("Reader")).unwrap();
            assert_eq!(*reader.downcast::<u32>().unwrap(), 6);
        }
    }

    #[test]
    fn test_disposed_scope() {
        let container =
            Container::build([ServiceDescriptor::scoped(named("IUnitOfWork"), unit("UnitOfWork"))])
                .unwrap();

        let scope = container.create_scope();
        scope.resolve(&named("IUnitOfWork")).unwrap();
        scope.dispose();
        scope.dispose();

        let err = scope.resolve(&named("IUnitOfWork")).unwrap_err();
        assert_eq!(err.to_string(), "Cannot access a disposed scope.");

        // Other scopes are unaffected
        assert!(container.create_scope().resolve(&named("IUnitOfWork")).is_ok());
    }

    #[test]
    fn test_reverse_disposal_order() {
        struct Resource {
            name: &'static str,
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Dispose for Resource {
            fn dispose(&self) {
                self.log.lock().unwrap().push(self.name);
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let resource = |name: &'static str| {
            let log = Arc::clone(&log);
            Implementation::new(named(name)).constructor(Constructor::parameterless(move |_| {
                Ok(Instance::disposable(Resource {
                    name,
                    log: Arc::clone(&log),
                }))
            }))
        };

        let outer = Implementation::new(named("Outer")).constructor(Constructor::new(
            [named("Inner")],
            {
                let log = Arc::clone(&log);
                move |_| {
                    Ok(Instance::disposable(Resource {
                        name: "Outer",
                        log: Arc::clone(&log),
                    }))
                }
            },
        ));

        let container = Container::build([
            ServiceDescriptor::scoped(named("Inner"), resource("Inner")),
            ServiceDescriptor::scoped(named("Outer"), outer),
            ServiceDescriptor::transient(named("Last"), resource("Last")),
        ])
        .unwrap();

        let scope = container.create_scope();
        scope.resolve(&named("Outer")).unwrap();
        scope.resolve(&named("Last")).unwrap();
        drop(scope);

        assert_eq!(*log.lock().unwrap(), ["Last", "Outer", "Inner"]);
    }

    #[test]
    fn test_open_generic_resolution() {
        struct Repository {
            entity: String,
        }

        let definition = ServiceType::generic_definition("Repository", 1);
        let repository = Implementation::generic_definition(definition.clone(), move |args| {
            let entity = args[0].to_string();
            Some(
                Implementation::new(definition.close(args.to_vec())).constructor(
                    Constructor::parameterless(move |_| {
                        Ok(Instance::new(Repository {
                            entity: entity.clone(),
                        }))
                    }),
                ),
            )
        });

        let contract = ServiceType::generic_definition("IRepository", 1);
        let container =
            Container::build([ServiceDescriptor::scoped(contract.clone(), repository)]).unwrap();

        let users = contract.close([named("User")]);
        let orders = contract.close([named("Order")]);
        let scope = container.create_scope();

        let a = scope.resolve(&users).unwrap();
        let b = scope.resolve(&users).unwrap();
        let c = scope.resolve(&orders).unwrap();

        assert!(Instance::ptr_eq(&a, &b));
        assert_eq!(a.downcast::<Repository>().unwrap().entity, "User");
        assert_eq!(c.downcast::<Repository>().unwrap().entity, "Order");
        assert_eq!(scope.resolve_all(&users).unwrap().len(), 1);
    }

    #[test]
    fn test_default_parameter_used_when_unregistered() {
        struct Client {
            retries: u32,
        }

        let client = Implementation::new(named("Client")).constructor(Constructor::new(
            [Parameter::new(named("Retries")).with_default(Instance::new(3u32))],
            |args| {
                Ok(Instance::new(Client {
                    retries: *args.get::<u32>(0)?,
                }))
            },
        ));

        let without = Container::build([ServiceDescriptor::transient(named("Client"), client.clone())])
            .unwrap();
        assert_eq!(without.resolve(&named("Client")).unwrap().downcast::<Client>().unwrap().retries, 3);

        let with = Container::build([
            ServiceDescriptor::transient(named("Client"), client),
            ServiceDescriptor::instance(named("Retries"), Instance::new(7u32)),
        ])
        .unwrap();
        assert_eq!(with.resolve(&named("Client")).unwrap().downcast::<Client>().unwrap().retries, 7);
    }

    #[test]
    fn test_constructor_overload_selection() {
        let implementation = Implementation::new(named("Service"))
            .constructor(Constructor::parameterless(|_| Ok(Instance::new(0usize))))
            .constructor(Constructor::new([named("A")], |_| Ok(Instance::new(1usize))))
            .constructor(Constructor::new([named("A"), named("Missing")], |_| {
                Ok(Instance::new(2usize))
            }));
        let container = Container::build([
            ServiceDescriptor::transient(named("Service"), implementation),
            ServiceDescriptor::instance(named("A"), Instance::new(())),
        ])
        .unwrap();

        let chosen = container.resolve(&named("Service")).unwrap();
        assert_eq!(*chosen.downcast::<usize>().unwrap(), 1);
    }

    #[test]
    fn test_ambiguous_constructors() {
        let implementation = Implementation::new(named("Service"))
            .constructor(Constructor::new([named("A")], |_| Ok(Instance::new(()))))
            .constructor(Constructor::new([named("B")], |_| Ok(Instance::new(()))));
        let container = Container::build([
            ServiceDescriptor::transient(named("Service"), implementation),
            ServiceDescriptor::instance(named("A"), Instance::new(())),
            ServiceDescriptor::instance(named("B"), Instance::new(())),
        ])
        .unwrap();

        let err = container.resolve(&named("Service")).unwrap_err();
        assert!(matches!(err, DiError::AmbiguousConstructor { .. }));
    }

    #[test]
    fn test_enumerable_parameter() {
        struct Host {
            plugins: usize,
        }

        let host = Implementation::new(named("Host")).constructor(Constructor::new(
            [ServiceType::enumerable(named("IPlugin"))],
            |args| {
                Ok(Instance::new(Host {
                    plugins: args.all::<&'static str>(0)?.len(),
                }))
            },
        ));
        let container = Container::build([
            ServiceDescriptor::transient(named("Host"), host),
            ServiceDescriptor::transient(named("IPlugin"), unit("A")),
            ServiceDescriptor::transient(named("IPlugin"), unit("B")),
        ])
        .unwrap();

        let host = container.resolve(&named("Host")).unwrap();
        assert_eq!(host.downcast::<Host>().unwrap().plugins, 2);
    }

    #[test]
    fn test_descriptor_macro() {
        struct Clock;

        impl Activate for Clock {
            fn implementation() -> Implementation {
                Implementation::new(ServiceType::of::<Clock>())
                    .constructor(Constructor::parameterless(|_| Ok(Instance::new(Clock))))
            }
        }

        let container = Container::build([descriptor!(singleton Clock)]).unwrap();
        let a = container.get::<Clock>().unwrap();
        let b = container.get::<Clock>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
