//! Immutable descriptor registry
//!
//! Indexes the finalized descriptor sequence by contract type and rejects
//! registrations that can never be satisfied.

use crate::error::ConfigurationError;
use crate::{Implementation, Lifetime, Producer, Result, ServiceDescriptor, ServiceType};
use ahash::RandomState;
use std::collections::HashMap;

/// A descriptor as seen by the engine: the registration plus its position.
///
/// For descriptors registered against a generic definition and matched by a
/// closed request, `implementation` holds the closed implementation.
#[derive(Clone, Debug)]
pub(crate) struct Registration {
    pub(crate) index: usize,
    pub(crate) service_type: ServiceType,
    pub(crate) lifetime: Lifetime,
    pub(crate) producer: Producer,
}

/// Ordered, immutable collection of descriptors.
pub struct Registry {
    descriptors: Vec<ServiceDescriptor>,
    /// Contract type -> positions in `descriptors`, in registration order
    by_type: HashMap<ServiceType, Vec<usize>, RandomState>,
}

impl Registry {
    /// Validate and index `descriptors`.
    ///
    /// Fails with [`DiError::InvalidConfiguration`](crate::DiError::InvalidConfiguration)
    /// for a registration that no request could ever satisfy.
    pub fn build(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Result<Self> {
        let descriptors: Vec<ServiceDescriptor> = descriptors.into_iter().collect();
        let mut by_type: HashMap<ServiceType, Vec<usize>, RandomState> =
            HashMap::with_capacity_and_hasher(descriptors.len(), RandomState::new());

        for (index, descriptor) in descriptors.iter().enumerate() {
            validate(descriptor)?;
            by_type
                .entry(descriptor.service_type().clone())
                .or_default()
                .push(index);
        }

        Ok(Self {
            descriptors,
            by_type,
        })
    }

    /// The latest registration matching `service_type`.
    ///
    /// Exact registrations win over registrations made against the generic
    /// definition of a closed request.
    pub(crate) fn lookup(&self, service_type: &ServiceType) -> Option<Registration> {
        if let Some(&index) = self.by_type.get(service_type).and_then(|i| i.last()) {
            return Some(self.registration(index, service_type.clone(), None));
        }

        let definition = service_type.definition()?;
        self.by_type
            .get(&definition)?
            .iter()
            .rev()
            .find_map(|&index| self.close(index, service_type))
    }

    /// Every registration matching `service_type`, in registration order.
    pub(crate) fn lookup_all(&self, service_type: &ServiceType) -> Vec<Registration> {
        let mut matches: Vec<Registration> = self
            .by_type
            .get(service_type)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&index| self.registration(index, service_type.clone(), None))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(indices) = service_type.definition().and_then(|d| self.by_type.get(&d)) {
            matches.extend(indices.iter().filter_map(|&index| self.close(index, service_type)));
            matches.sort_by_key(|registration| registration.index);
        }

        matches
    }

    /// Whether any registration could satisfy `service_type`.
    pub(crate) fn contains(&self, service_type: &ServiceType) -> bool {
        self.lookup(service_type).is_some()
    }

    /// All descriptors, in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The descriptor at `index` as a registration for `service_type`.
    pub(crate) fn registration(
        &self,
        index: usize,
        service_type: ServiceType,
        producer: Option<Producer>,
    ) -> Registration {
        let descriptor = &self.descriptors[index];
        Registration {
            index,
            service_type,
            lifetime: descriptor.lifetime(),
            producer: producer.unwrap_or_else(|| descriptor.producer().clone()),
        }
    }

    /// Close the generic-definition registration at `index` for `service_type`.
    fn close(&self, index: usize, service_type: &ServiceType) -> Option<Registration> {
        let implementation = self.descriptors[index].implementation_type()?;
        let closed = implementation.close(service_type.type_arguments())?;
        Some(self.registration(index, service_type.clone(), Some(Producer::Type(closed))))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("count", &self.len())
            .field("contracts", &self.by_type.len())
            .finish()
    }
}

fn validate(descriptor: &ServiceDescriptor) -> std::result::Result<(), ConfigurationError> {
    let service_type = descriptor.service_type();

    if service_type.is_generic_definition() {
        let Some(implementation) = descriptor.implementation_type() else {
            return Err(ConfigurationError::OpenGenericRequiresOpenImplementation {
                service_type: service_type.clone(),
            });
        };
        if !implementation.is_generic_definition() {
            return Err(ConfigurationError::OpenGenericRequiresOpenImplementation {
                service_type: service_type.clone(),
            });
        }
        if implementation.service_type().arity() != service_type.arity() {
            return Err(ConfigurationError::ArityMismatch {
                service_type: service_type.clone(),
                implementation: implementation.service_type().clone(),
            });
        }
        if !implementation.is_concrete() {
            return Err(cannot_instantiate(implementation, service_type));
        }
        return Ok(());
    }

    match descriptor.implementation_type() {
        Some(implementation)
            if implementation.is_generic_definition() || !implementation.is_concrete() =>
        {
            Err(cannot_instantiate(implementation, service_type))
        }
        _ => Ok(()),
    }
}

fn cannot_instantiate(implementation: &Implementation, service_type: &ServiceType) -> ConfigurationError {
    ConfigurationError::CannotInstantiate {
        implementation: implementation.service_type().clone(),
        service_type: service_type.clone(),
    }
}
