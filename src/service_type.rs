//! Runtime type identity for service contracts and implementations
//!
//! A [`ServiceType`] is a base identity plus an ordered list of type
//! arguments. Generic definitions carry an arity but no arguments; closing a
//! definition substitutes concrete arguments and yields a new identity.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Base name of the built-in "all implementations of T" contract.
const ENUMERABLE: &str = "Enumerable";

#[derive(PartialEq, Eq, Hash)]
struct TypeRepr {
    name: Cow<'static, str>,
    arity: usize,
    args: Vec<ServiceType>,
}

/// Identity of a service contract or implementation type.
///
/// Equality and hashing are structural, so two independently constructed
/// `ServiceType`s with the same name and arguments are the same contract.
///
/// # Examples
///
/// ```rust
/// use dependency_activator::ServiceType;
///
/// let list = ServiceType::generic_definition("IList", 1);
/// let ints = list.close([ServiceType::named("i32")]);
///
/// assert!(list.is_generic_definition());
/// assert_eq!(ints.definition(), Some(list.clone()));
/// assert_eq!(ints.to_string(), "IList<i32>");
/// assert_eq!(list.to_string(), "IList<>");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceType(Arc<TypeRepr>);

impl ServiceType {
    /// Identity of a Rust type, including trait objects (`dyn Trait`).
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// A non-generic type identified by name.
    #[inline]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(Arc::new(TypeRepr {
            name: name.into(),
            arity: 0,
            args: Vec::new(),
        }))
    }

    /// An unbound generic definition taking `arity` type arguments.
    pub fn generic_definition(name: impl Into<Cow<'static, str>>, arity: usize) -> Self {
        assert!(arity > 0, "a generic definition needs at least one type parameter");
        Self(Arc::new(TypeRepr {
            name: name.into(),
            arity,
            args: Vec::new(),
        }))
    }

    /// The enumerable contract whose instances are every implementation of `element`.
    pub fn enumerable(element: ServiceType) -> Self {
        Self::generic_definition(ENUMERABLE, 1).close([element])
    }

    /// Substitute type arguments into this generic definition.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not a generic definition or the argument count
    /// does not match its arity.
    pub fn close(&self, args: impl IntoIterator<Item = ServiceType>) -> Self {
        let args: Vec<ServiceType> = args.into_iter().collect();
        assert!(
            self.is_generic_definition(),
            "cannot close non-generic-definition type '{self}'"
        );
        assert_eq!(
            args.len(),
            self.0.arity,
            "type '{self}' expects {} type arguments",
            self.0.arity
        );
        Self(Arc::new(TypeRepr {
            name: self.0.name.clone(),
            arity: self.0.arity,
            args,
        }))
    }

    /// Base name without type arguments.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Number of generic parameters (0 for non-generic types).
    #[inline]
    pub fn arity(&self) -> usize {
        self.0.arity
    }

    /// Type arguments of a closed generic type; empty otherwise.
    #[inline]
    pub fn type_arguments(&self) -> &[ServiceType] {
        &self.0.args
    }

    /// True for an unbound generic definition such as `List<>`.
    #[inline]
    pub fn is_generic_definition(&self) -> bool {
        self.0.arity > 0 && self.0.args.is_empty()
    }

    /// True for a generic type with all arguments supplied.
    #[inline]
    pub fn is_closed_generic(&self) -> bool {
        self.0.arity > 0 && !self.0.args.is_empty()
    }

    /// The generic definition this closed type was built from.
    pub fn definition(&self) -> Option<ServiceType> {
        if !self.is_closed_generic() {
            return None;
        }
        Some(Self(Arc::new(TypeRepr {
            name: self.0.name.clone(),
            arity: self.0.arity,
            args: Vec::new(),
        })))
    }

    /// The element type if this is `Enumerable<T>`.
    pub fn enumerable_element(&self) -> Option<&ServiceType> {
        if self.is_closed_generic() && self.0.arity == 1 && self.0.name == ENUMERABLE {
            self.0.args.first()
        } else {
            None
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)?;
        if self.0.arity == 0 {
            return Ok(());
        }
        f.write_str("<")?;
        if self.0.args.is_empty() {
            for _ in 1..self.0.arity {
                f.write_str(",")?;
            }
        } else {
            for (i, arg) in self.0.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
        }
        f.write_str(">")
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({self})")
    }
}
