//! Service descriptors
//!
//! A descriptor binds a contract type to the producer that satisfies it and
//! the lifetime of the produced instances. Descriptors are created by the
//! registration layer and never change once handed to the container.

use crate::{BoxError, Implementation, Instance, Resolver, ServiceType};
use std::fmt;
use std::sync::Arc;

/// Service lifetime specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// New instance created on every resolve
    #[default]
    Transient,

    /// One instance per scope; one instance for the root's lifetime when
    /// resolved through the root
    Scoped,

    /// Single instance shared across all scopes, owned by the root
    Singleton,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifetime::Transient => "Transient",
            Lifetime::Scoped => "Scoped",
            Lifetime::Singleton => "Singleton",
        })
    }
}

/// Type-erased factory producer; receives the resolver of the scope executing it.
pub type FactoryFn =
    Arc<dyn Fn(&Resolver<'_>) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// How a descriptor produces its instances.
#[derive(Clone)]
pub enum Producer {
    /// Activate an implementation type through one of its constructors
    Type(Implementation),
    /// Call a factory
    Factory(FactoryFn),
    /// Hand out a pre-built instance; never disposed by the container
    Instance(Instance),
}

/// Registration record consumed by the container.
///
/// # Examples
///
/// ```rust
/// use dependency_activator::{Instance, Lifetime, ServiceDescriptor, ServiceType};
///
/// #[derive(Debug)]
/// struct Settings {
///     verbose: bool,
/// }
///
/// let descriptor = ServiceDescriptor::instance(
///     ServiceType::of::<Settings>(),
///     Instance::new(Settings { verbose: true }),
/// );
/// assert_eq!(descriptor.lifetime(), Lifetime::Singleton);
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    service_type: ServiceType,
    lifetime: Lifetime,
    producer: Producer,
}

impl ServiceDescriptor {
    /// Bind `service_type` to an implementation type.
    #[inline]
    pub fn implementation(
        service_type: ServiceType,
        lifetime: Lifetime,
        implementation: Implementation,
    ) -> Self {
        Self {
            service_type,
            lifetime,
            producer: Producer::Type(implementation),
        }
    }

    /// Bind `service_type` to a factory.
    pub fn factory<F>(service_type: ServiceType, lifetime: Lifetime, factory: F) -> Self
    where
        F: Fn(&Resolver<'_>) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            service_type,
            lifetime,
            producer: Producer::Factory(Arc::new(factory)),
        }
    }

    /// Bind `service_type` to a pre-built instance (always singleton).
    #[inline]
    pub fn instance(service_type: ServiceType, instance: Instance) -> Self {
        Self {
            service_type,
            lifetime: Lifetime::Singleton,
            producer: Producer::Instance(instance),
        }
    }

    /// Transient binding to an implementation type.
    #[inline]
    pub fn transient(service_type: ServiceType, implementation: Implementation) -> Self {
        Self::implementation(service_type, Lifetime::Transient, implementation)
    }

    /// Scoped binding to an implementation type.
    #[inline]
    pub fn scoped(service_type: ServiceType, implementation: Implementation) -> Self {
        Self::implementation(service_type, Lifetime::Scoped, implementation)
    }

    /// Singleton binding to an implementation type.
    #[inline]
    pub fn singleton(service_type: ServiceType, implementation: Implementation) -> Self {
        Self::implementation(service_type, Lifetime::Singleton, implementation)
    }

    #[inline]
    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    #[inline]
    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// The implementation type, when the producer is one.
    pub fn implementation_type(&self) -> Option<&Implementation> {
        match &self.producer {
            Producer::Type(implementation) => Some(implementation),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServiceType: {} Lifetime: {} ",
            self.service_type, self.lifetime
        )?;
        match &self.producer {
            Producer::Type(implementation) => {
                write!(f, "ImplementationType: {}", implementation.service_type())
            }
            Producer::Factory(_) => f.write_str("ImplementationFactory"),
            Producer::Instance(instance) => {
                write!(f, "ImplementationInstance: {}", instance.type_name())
            }
        }
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::Type(implementation) => f.debug_tuple("Type").field(implementation).finish(),
            Producer::Factory(_) => f.write_str("Factory(..)"),
            Producer::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceDescriptor({self})")
    }
}

/// Helper macro to create a descriptor for a type implementing [`Activate`](crate::Activate)
///
/// ```rust
/// use dependency_activator::{
///     descriptor, Activate, Constructor, Implementation, Instance, Lifetime, ServiceType,
/// };
///
/// struct Clock;
///
/// impl Activate for Clock {
///     fn implementation() -> Implementation {
///         Implementation::new(ServiceType::of::<Clock>())
///             .constructor(Constructor::parameterless(|_| Ok(Instance::new(Clock))))
///     }
/// }
///
/// let descriptor = descriptor!(singleton Clock);
/// assert_eq!(descriptor.lifetime(), Lifetime::Singleton);
/// assert_eq!(descriptor.service_type(), &ServiceType::of::<Clock>());
/// ```
#[macro_export]
macro_rules! descriptor {
    (transient $contract:ty => $implementation:ty) => {
        $crate::descriptor!(@bind $crate::Lifetime::Transient, $contract, $implementation)
    };
    (scoped $contract:ty => $implementation:ty) => {
        $crate::descriptor!(@bind $crate::Lifetime::Scoped, $contract, $implementation)
    };
    (singleton $contract:ty => $implementation:ty) => {
        $crate::descriptor!(@bind $crate::Lifetime::Singleton, $contract, $implementation)
    };
    (transient $implementation:ty) => {
        $crate::descriptor!(@bind $crate::Lifetime::Transient, $implementation, $implementation)
    };
    (scoped $implementation:ty) => {
        $crate::descriptor!(@bind $crate::Lifetime::Scoped, $implementation, $implementation)
    };
    (singleton $implementation:ty) => {
        $crate::descriptor!(@bind $crate::Lifetime::Singleton, $implementation, $implementation)
    };
    (@bind $lifetime:expr, $contract:ty, $implementation:ty) => {
        $crate::ServiceDescriptor::implementation(
            $crate::ServiceType::of::<$contract>(),
            $lifetime,
            <$implementation as $crate::Activate>::implementation(),
        )
    };
}
