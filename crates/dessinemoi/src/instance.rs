use crate::error::FactoryError;
use crate::handle::{Registrable, Restriction, TypeHandle};
use std::any::Any;
use std::fmt;

/// An owned, type-erased value produced by (or passed through) a factory.
///
/// Every instance remembers the [`TypeHandle`] of its concrete type, which is what
/// type restrictions are checked against.
pub struct Instance {
    ty: TypeHandle,
    value: Box<dyn Any + Send + Sync>,
}

impl Instance {
    /// Wraps an existing value, e.g. to pass it through [`Factory::convert`](crate::Factory::convert).
    pub fn new<T: Registrable>(value: T) -> Self {
        Self { ty: TypeHandle::of::<T>(), value: Box::new(value) }
    }

    /// Wraps a value of a type that is not [`Registrable`].
    ///
    /// The instance passes through [`Factory::convert`](crate::Factory::convert) unchanged
    /// but only satisfies a [`Restriction`] that lists its own [`TypeHandle::opaque`].
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self { ty: TypeHandle::opaque::<T>(), value: Box::new(value) }
    }

    pub(crate) fn from_parts(ty: TypeHandle, value: Box<dyn Any + Send + Sync>) -> Self {
        Self { ty, value }
    }

    #[must_use]
    pub const fn type_handle(&self) -> &TypeHandle {
        &self.ty
    }

    /// Whether the instance type is, or extends, one of the restricted types.
    #[must_use]
    pub fn satisfies(&self, restriction: &Restriction) -> bool {
        restriction.allows(&self.ty)
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Unwraps the concrete value, handing the instance back if it holds another type.
    ///
    /// # Errors
    /// Returns `self` unchanged if the instance does not hold a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let Self { ty, value } = self;
        value.downcast::<T>().map(|value| *value).map_err(|value| Self { ty, value })
    }

    /// Like [`Instance::downcast`], but reports a mismatch as a factory error.
    ///
    /// # Errors
    /// Returns [`FactoryError::TypeNotAllowed`] if the instance does not hold a `T`.
    pub fn take<T: Any>(self) -> Result<T, FactoryError> {
        self.downcast::<T>().map_err(|instance| {
            FactoryError::not_allowed(format!(
                "instance of '{}' is not a '{}'",
                instance.ty,
                std::any::type_name::<T>()
            ))
        })
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("type", &self.ty.fullname()).finish_non_exhaustive()
    }
}
