//! # Default Factory
//!
//! A process-wide [`Factory`] created on first use and kept for the lifetime of the
//! process. The free functions forward to it.
//!
//! Lookups take a recursive read lock, so constructors invoked by [`create`] or
//! [`convert`] may convert nested values through the default factory themselves.
//! Registering from inside a constructor deadlocks.

use crate::error::FactoryError;
use crate::factory::{CreateOptions, Factory, Input, Registration};
use crate::handle::{Registrable, Restriction, TypeHandle};
use crate::instance::Instance;
use crate::lazy::TypeRef;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::LazyLock;

static FACTORY: LazyLock<RwLock<Factory>> = LazyLock::new(|| RwLock::new(Factory::new()));

/// Shared access to the default factory.
pub fn factory() -> RwLockReadGuard<'static, Factory> {
    FACTORY.read_recursive()
}

/// Exclusive access to the default factory, e.g. to remove entries.
pub fn factory_mut() -> RwLockWriteGuard<'static, Factory> {
    FACTORY.write()
}

/// Registers `T` to the default factory. See [`Factory::register`].
///
/// # Errors
/// See [`Factory::register`].
pub fn register<T: Registrable>() -> Result<TypeHandle, FactoryError> {
    factory_mut().register::<T>()
}

/// See [`Factory::register_with`].
///
/// # Errors
/// See [`Factory::register_with`].
pub fn register_with(registration: impl Into<Registration>) -> Result<TypeRef, FactoryError> {
    factory_mut().register_with(registration.into())
}

/// See [`Factory::alias`].
///
/// # Errors
/// See [`Factory::alias`].
pub fn alias(type_id: &str, alias_id: impl Into<String>, overwrite: bool) -> Result<(), FactoryError> {
    factory_mut().alias(type_id, alias_id, overwrite)
}

/// See [`Factory::get_type`].
///
/// # Errors
/// See [`Factory::get_type`].
pub fn get_type(type_id: &str) -> Result<TypeHandle, FactoryError> {
    factory().get_type(type_id)
}

/// See [`Factory::create`].
///
/// # Errors
/// See [`Factory::create`].
pub fn create(type_id: &str, options: CreateOptions) -> Result<Instance, FactoryError> {
    factory().create(type_id, options)
}

/// See [`Factory::convert`].
///
/// # Errors
/// See [`Factory::convert`].
pub fn convert(value: impl Into<Input>, allowed: Option<&Restriction>) -> Result<Instance, FactoryError> {
    factory().convert(value, allowed)
}

/// A reusable converter bound to the default factory.
///
/// The lock is taken per call, so the converter can be stored and shared freely.
pub fn converter(
    allowed: Option<Restriction>,
) -> impl Fn(Input) -> Result<Instance, FactoryError> + Send + Sync + 'static {
    move |value| convert(value, allowed.as_ref())
}

pub fn registered_types() -> Vec<String> {
    factory().registered_types()
}
