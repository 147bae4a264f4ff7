//! Constructor selection
//!
//! Picks the constructor the engine will call for an implementation type,
//! working purely on declared metadata.

use crate::{Constructor, DiError, Implementation, Parameter, Result, ServiceType};
use std::collections::HashSet;

/// Choose the constructor of `implementation` to activate.
///
/// A single public constructor is taken as-is; its parameters are checked
/// when the call site is built, so a gap is reported against the missing
/// contract. With several public constructors, only those whose parameters
/// are all satisfiable compete, and the longest wins. `can_resolve` answers
/// whether a descriptor exists for a parameter type.
pub(crate) fn select<'i>(
    implementation: &'i Implementation,
    can_resolve: impl Fn(&Parameter) -> bool,
) -> Result<&'i Constructor> {
    let no_suitable = || DiError::NoSuitableConstructor {
        implementation: implementation.service_type().clone(),
    };

    if !implementation.is_concrete() || implementation.is_generic_definition() {
        return Err(no_suitable());
    }

    let public: Vec<&Constructor> = implementation
        .constructors()
        .iter()
        .filter(|c| c.is_public())
        .collect();

    if let &[only] = public.as_slice() {
        return Ok(only);
    }

    let mut satisfiable: Vec<&Constructor> = public
        .into_iter()
        .filter(|c| c.parameters().iter().all(&can_resolve))
        .collect();

    // Stable: declaration order breaks ties between equivalent constructors
    satisfiable.sort_by(|a, b| b.parameters().len().cmp(&a.parameters().len()));

    let Some((&best, rest)) = satisfiable.split_first() else {
        return Err(no_suitable());
    };

    let best_types = parameter_types(best);
    for &other in rest
        .iter()
        .take_while(|c| c.parameters().len() == best.parameters().len())
    {
        let other_types = parameter_types(other);
        if !best_types.is_superset(&other_types) && !other_types.is_superset(&best_types) {
            return Err(DiError::AmbiguousConstructor {
                implementation: implementation.service_type().clone(),
                first: best.to_string(),
                second: other.to_string(),
            });
        }
    }

    Ok(best)
}

fn parameter_types(constructor: &Constructor) -> HashSet<&ServiceType> {
    constructor
        .parameters()
        .iter()
        .map(Parameter::service_type)
        .collect()
}
