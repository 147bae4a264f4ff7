//! Error types for dependency activation

use crate::ServiceType;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by producers (activators and factories).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur while building a container or resolving services
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// A descriptor can never be satisfied; raised when the container is built
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigurationError),

    /// No descriptor matches a requested contract
    #[error("{}", unresolved_message(.service_type, .activating.as_ref()))]
    UnresolvedService {
        service_type: ServiceType,
        /// Implementation being activated when the gap was found
        activating: Option<ServiceType>,
    },

    /// No public constructor has all of its parameters satisfiable
    #[error(
        "A suitable constructor for type '{implementation}' could not be located. Ensure the type is concrete and services are registered for all parameters of a public constructor."
    )]
    NoSuitableConstructor { implementation: ServiceType },

    /// Two or more maximal constructors are satisfiable and incomparable
    #[error(
        "Unable to activate type '{implementation}'. The following constructors are ambiguous:\n{first}\n{second}"
    )]
    AmbiguousConstructor {
        implementation: ServiceType,
        first: String,
        second: String,
    },

    /// A contract depends on itself, transitively
    #[error("A circular dependency was detected for the service of type '{service_type}'.\n{chain}")]
    CircularDependency {
        service_type: ServiceType,
        chain: String,
    },

    /// The scope (or the root it belongs to) has been disposed
    #[error("Cannot access a disposed scope.")]
    ScopeDisposed,

    /// Scoped service requested from the root with scope validation enabled
    #[error("{}", scoped_from_root_message(.service_type, .scoped))]
    ScopedFromRoot {
        service_type: ServiceType,
        scoped: ServiceType,
    },

    /// Singleton depending on a scoped service with scope validation enabled
    #[error("Cannot consume scoped service '{scoped}' from singleton '{singleton}'.")]
    ScopedInSingleton {
        scoped: ServiceType,
        singleton: ServiceType,
    },

    /// Eager validation of a descriptor failed during build
    #[error("Error while validating the service descriptor '{descriptor}': {source}")]
    Validation {
        descriptor: String,
        source: Box<DiError>,
    },

    /// A resolved instance is not of the requested Rust type
    #[error("Instance resolved for service type '{service_type}' is not of type '{expected}'.")]
    TypeMismatch {
        service_type: ServiceType,
        expected: &'static str,
    },

    /// The producer's own body failed; displays exactly as the original error
    #[error("{0}")]
    Producer(Arc<dyn StdError + Send + Sync + 'static>),
}

/// Registrations rejected when the container is built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Cannot instantiate implementation type '{implementation}' for service type '{service_type}'.")]
    CannotInstantiate {
        implementation: ServiceType,
        service_type: ServiceType,
    },

    #[error("Open generic service type '{service_type}' requires registering an open generic implementation type.")]
    OpenGenericRequiresOpenImplementation { service_type: ServiceType },

    #[error(
        "Arity of open generic service type '{service_type}' does not equal arity of open generic implementation type '{implementation}'."
    )]
    ArityMismatch {
        service_type: ServiceType,
        implementation: ServiceType,
    },
}

fn unresolved_message(service_type: &ServiceType, activating: Option<&ServiceType>) -> String {
    match activating {
        Some(implementation) => format!(
            "Unable to resolve service for type '{service_type}' while attempting to activate '{implementation}'."
        ),
        None => format!("No service for type '{service_type}' has been registered."),
    }
}

fn scoped_from_root_message(service_type: &ServiceType, scoped: &ServiceType) -> String {
    if service_type == scoped {
        format!("Cannot resolve scoped service '{scoped}' from root provider.")
    } else {
        format!(
            "Cannot resolve '{service_type}' from root provider because it requires scoped service '{scoped}'."
        )
    }
}

impl DiError {
    /// Create an UnresolvedService error for a gap found while activating `activating`
    #[inline]
    pub fn unresolved(service_type: ServiceType, activating: Option<ServiceType>) -> Self {
        Self::UnresolvedService {
            service_type,
            activating,
        }
    }

    /// Create a TypeMismatch error for an instance that is not a `T`
    #[inline]
    pub fn type_mismatch<T: ?Sized + 'static>(service_type: ServiceType) -> Self {
        Self::TypeMismatch {
            service_type,
            expected: std::any::type_name::<T>(),
        }
    }

    /// Convert a producer failure back into a `DiError`.
    ///
    /// A `DiError` travelling through the box (e.g. a factory that resolved
    /// a missing dependency with `?`) comes back out as itself; anything else
    /// is kept as the original error under [`DiError::Producer`].
    pub fn from_producer(error: BoxError) -> Self {
        match error.downcast::<DiError>() {
            Ok(di) => *di,
            Err(other) => Self::Producer(Arc::from(other)),
        }
    }

    /// The original error raised by a producer, if this is a producer failure
    /// of type `E`.
    pub fn producer_error<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Producer(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// True for errors raised when building the container
    #[inline]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_) | Self::Validation { .. })
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;
