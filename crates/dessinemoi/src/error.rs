//! # Factory Errors
//!
//! [`FactoryError`] covers registry bookkeeping failures; [`ConstructError`] is what
//! constructors of registered types return and is carried through the factory untouched.

use std::borrow::Cow;

/// A specialized [`FactoryError`] enum for registry and factory failures.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    /// Malformed lazy type reference, missing identifier or unknown alternate constructor.
    #[error("Invalid argument{}: {message}", format_context(.context))]
    InvalidArgument { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Identifier collision or duplicate registration of an already registered type.
    #[error("Already registered{}: {message}", format_context(.context))]
    AlreadyRegistered { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Lookup of an identifier that is not registered.
    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A type restriction rejected the resolved or passed-through type.
    #[error("Type not allowed{}: {message}", format_context(.context))]
    TypeNotAllowed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A lazy type reference could not be located.
    #[error("Resolution error{}: {message}", format_context(.context))]
    Resolution { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The constructor of the target type failed. Passed through as-is.
    #[error(transparent)]
    Construct {
        #[from]
        source: ConstructError,
    },

    /// Failure while loading layered configuration.
    #[cfg(feature = "config")]
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

impl FactoryError {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument { message: message.into(), context: None }
    }

    pub(crate) fn registered(message: impl Into<Cow<'static, str>>) -> Self {
        Self::AlreadyRegistered { message: message.into(), context: None }
    }

    pub(crate) fn not_found(type_id: &str) -> Self {
        Self::NotFound { message: format!("no type registered as '{type_id}'").into(), context: None }
    }

    pub(crate) fn not_allowed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::TypeNotAllowed { message: message.into(), context: None }
    }

    pub(crate) fn resolution(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Resolution { message: message.into(), context: None }
    }
}

/// Adds `.context(...)` to factory results.
pub trait FactoryErrorExt<T> {
    /// Attaches context to the error, replacing any previous context.
    ///
    /// # Errors
    /// Returns the original error with the context attached.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, FactoryError>;
}

impl<T> FactoryErrorExt<T> for Result<T, FactoryError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                FactoryError::InvalidArgument { context: c, .. }
                | FactoryError::AlreadyRegistered { context: c, .. }
                | FactoryError::NotFound { context: c, .. }
                | FactoryError::TypeNotAllowed { context: c, .. }
                | FactoryError::Resolution { context: c, .. } => *c = Some(context.into()),
                #[cfg(feature = "config")]
                FactoryError::Config { context: c, .. } => *c = Some(context.into()),
                FactoryError::Construct { .. } => {},
            }
            e
        })
    }
}

#[cfg(feature = "config")]
impl From<config::ConfigError> for FactoryError {
    #[inline]
    fn from(source: config::ConfigError) -> Self {
        Self::Config { source, context: None }
    }
}

#[cfg(feature = "config")]
impl<T> FactoryErrorExt<T> for Result<T, config::ConfigError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, FactoryError> {
        self.map_err(|source| FactoryError::Config { source, context: Some(context.into()) })
    }
}

/// Errors returned by constructors of registered types.
#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    /// Positional/keyword arguments could not be bound to the constructor parameters.
    #[error("Invalid arguments: {message}")]
    Arguments { message: Cow<'static, str> },

    /// A bound argument set could not be deserialized into the target type.
    #[error("Invalid argument value: {source}")]
    Value {
        #[from]
        source: serde_json::Error,
    },

    /// The constructor rejected its input.
    #[error("Construction failed: {message}")]
    Failed { message: Cow<'static, str> },

    /// Any other error raised by the constructor.
    #[error("{source}")]
    Other {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl ConstructError {
    /// Shorthand for [`ConstructError::Failed`].
    pub fn failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Failed { message: message.into() }
    }

    /// Wraps an arbitrary error raised inside a constructor.
    pub fn other(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other { source: Box::new(source) }
    }

    pub(crate) fn arguments(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Arguments { message: message.into() }
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
