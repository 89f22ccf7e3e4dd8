use crate::error::FactoryError;
use crate::handle::TypeHandle;
use crate::lazy::TypeRef;
use crate::modules::Resolver;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A registry record: the registered type (possibly still lazy) and the optional
/// name of the alternate constructor used for mapping-based conversion.
///
/// Cloning an entry shares it: aliases created from an entry hold the same type
/// cell, so resolving a lazy type through one identifier is visible through all
/// of them.
#[derive(Clone)]
pub struct RegistryEntry {
    cls: Arc<RwLock<TypeRef>>,
    dict_constructor: Option<Cow<'static, str>>,
}

impl RegistryEntry {
    #[must_use]
    pub fn new(cls: impl Into<TypeRef>, dict_constructor: Option<Cow<'static, str>>) -> Self {
        Self { cls: Arc::new(RwLock::new(cls.into())), dict_constructor }
    }

    /// Snapshot of the current type reference.
    #[must_use]
    pub fn cls(&self) -> TypeRef {
        self.cls.read().clone()
    }

    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.cls.read().is_lazy()
    }

    #[must_use]
    pub fn fullname(&self) -> String {
        self.cls.read().fullname().into_owned()
    }

    #[must_use]
    pub fn dict_constructor(&self) -> Option<&str> {
        self.dict_constructor.as_deref()
    }

    /// Whether both entries share the same type cell (i.e. one aliases the other).
    #[must_use]
    pub fn is_shared_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cls, &other.cls)
    }

    /// Returns the concrete type, loading and memoizing a lazy reference on first use.
    ///
    /// # Errors
    /// Returns [`FactoryError::Resolution`] if the lazy reference cannot be located.
    pub fn resolve(&self, resolver: &dyn Resolver) -> Result<TypeHandle, FactoryError> {
        let lazy = match &*self.cls.read() {
            TypeRef::Resolved(handle) => return Ok(handle.clone()),
            TypeRef::Lazy(lazy) => lazy.clone(),
        };

        let handle = lazy.load(resolver)?;
        let mut cls = self.cls.write();
        if cls.is_lazy() {
            debug!(namespace = lazy.namespace(), name = lazy.name(), "Resolved lazy type");
            *cls = TypeRef::Resolved(handle.clone());
        }
        Ok(handle)
    }
}

impl PartialEq for RegistryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dict_constructor == other.dict_constructor
            && (self.is_shared_with(other) || *self.cls.read() == *other.cls.read())
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("cls", &*self.cls.read())
            .field("dict_constructor", &self.dict_constructor)
            .finish()
    }
}
