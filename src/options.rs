//! Container options

/// Options controlling the checks a container performs.
///
/// Both checks are off by default, matching plain resolution semantics:
/// a scoped service resolved through the root behaves as a singleton.
///
/// # Examples
///
/// ```rust
/// use dependency_activator::ContainerOptions;
///
/// let options = ContainerOptions::new()
///     .with_scope_validation(true)
///     .with_build_validation(true);
///
/// assert!(options.validate_scopes());
/// assert!(options.validate_on_build());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerOptions {
    validate_scopes: bool,
    validate_on_build: bool,
}

impl ContainerOptions {
    /// Create options with every check disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject scoped services resolved from the root, and singletons that
    /// depend on scoped services
    pub fn with_scope_validation(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    /// Compile the call site of every registration when the container is built
    pub fn with_build_validation(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }

    #[inline]
    pub fn validate_scopes(&self) -> bool {
        self.validate_scopes
    }

    #[inline]
    pub fn validate_on_build(&self) -> bool {
        self.validate_on_build
    }
}
