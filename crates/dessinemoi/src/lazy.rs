use crate::error::FactoryError;
use crate::handle::TypeHandle;
use crate::modules::Resolver;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Separator between namespace segments and the local type name.
pub const SEPARATOR: char = '.';

/// A reference to a type that is looked up in a [`Resolver`] on first use.
///
/// # Examples
/// ```rust
/// use dessinemoi::LazyType;
///
/// let lazy: LazyType = "zoo.animals.Sheep".parse().unwrap();
/// assert_eq!(lazy.namespace(), "zoo.animals");
/// assert_eq!(lazy.name(), "Sheep");
/// assert!("Sheep".parse::<LazyType>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LazyType {
    namespace: Cow<'static, str>,
    name: Cow<'static, str>,
}

impl LazyType {
    /// Creates a lazy reference to `name` inside `namespace`.
    ///
    /// # Errors
    /// Returns [`FactoryError::InvalidArgument`] if either part is empty.
    pub fn new(
        namespace: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<Self, FactoryError> {
        let namespace = namespace.into();
        let name = name.into();

        if namespace.is_empty() {
            return Err(FactoryError::invalid("lazy type namespace must be non-empty"));
        }
        if name.is_empty() {
            return Err(FactoryError::invalid("lazy type name must be non-empty"));
        }

        Ok(Self { namespace, name })
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name of the referenced type.
    #[must_use]
    pub fn fullname(&self) -> String {
        format!("{}{SEPARATOR}{}", self.namespace, self.name)
    }

    /// Loads the namespace through `resolver` and looks the name up in it.
    ///
    /// # Errors
    /// Returns [`FactoryError::Resolution`] if the namespace cannot be loaded or does
    /// not contain the name.
    pub fn load(&self, resolver: &dyn Resolver) -> Result<TypeHandle, FactoryError> {
        let module = resolver.load(&self.namespace).ok_or_else(|| {
            FactoryError::resolution(format!("no module named '{}'", self.namespace))
        })?;

        module.get(&self.name).cloned().ok_or_else(|| {
            FactoryError::resolution(format!(
                "module '{}' has no type '{}'",
                self.namespace, self.name
            ))
        })
    }
}

impl FromStr for LazyType {
    type Err = FactoryError;

    /// Splits a fully qualified name on its last separator.
    ///
    /// Strings without a separator, or starting with one, look like relative paths and
    /// are rejected.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.rsplit_once(SEPARATOR) {
            Some((namespace, name)) if !value.starts_with(SEPARATOR) => {
                Self::new(namespace.to_owned(), name.to_owned())
            },
            _ => Err(FactoryError::invalid(format!(
                "'{value}' seems to specify a relative path, please use a fully qualified name"
            ))),
        }
    }
}

impl TryFrom<&str> for LazyType {
    type Error = FactoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for LazyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.namespace, self.name)
    }
}

/// What a registry entry points at: a concrete type or a reference still to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Resolved(TypeHandle),
    Lazy(LazyType),
}

impl TypeRef {
    /// Fully qualified name, available without resolving.
    #[must_use]
    pub fn fullname(&self) -> Cow<'_, str> {
        match self {
            Self::Resolved(handle) => Cow::Borrowed(handle.fullname()),
            Self::Lazy(lazy) => Cow::Owned(lazy.fullname()),
        }
    }

    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    #[must_use]
    pub const fn as_handle(&self) -> Option<&TypeHandle> {
        match self {
            Self::Resolved(handle) => Some(handle),
            Self::Lazy(_) => None,
        }
    }

    /// Returns the concrete handle, loading lazy references through `resolver`.
    ///
    /// # Errors
    /// Returns [`FactoryError::Resolution`] if a lazy reference cannot be located.
    pub fn resolve(&self, resolver: &dyn Resolver) -> Result<TypeHandle, FactoryError> {
        match self {
            Self::Resolved(handle) => Ok(handle.clone()),
            Self::Lazy(lazy) => lazy.load(resolver),
        }
    }
}

impl From<TypeHandle> for TypeRef {
    fn from(handle: TypeHandle) -> Self {
        Self::Resolved(handle)
    }
}

impl From<LazyType> for TypeRef {
    fn from(lazy: LazyType) -> Self {
        Self::Lazy(lazy)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}
