//! A type registry and object factory.
//! Types are registered under string identifiers, created by identifier, and tagged
//! mappings (`{"type": "sheep", ...}`) are converted into typed instances.
//!
//! ## Registering and creating
//! ```rust
//! use dessinemoi::{CreateOptions, Factory, Registrable, Restriction};
//! use serde::Deserialize;
//!
//! #[derive(Debug, PartialEq, Deserialize, Registrable)]
//! #[registrable(type_id = "sheep")]
//! struct Sheep {
//!     age: u32,
//!     name: String,
//! }
//!
//! #[derive(Debug, PartialEq, Deserialize, Registrable)]
//! #[registrable(type_id = "ram", extends(Sheep))]
//! struct Ram {
//!     age: u32,
//!     #[serde(default = "gorki")]
//!     name: String,
//! }
//!
//! fn gorki() -> String {
//!     "Gorki".to_owned()
//! }
//!
//! # fn main() -> Result<(), dessinemoi::FactoryError> {
//! let mut factory = Factory::new();
//! factory.register::<Sheep>()?;
//! factory.register::<Ram>()?;
//!
//! let ram = factory.create("ram", CreateOptions::new().arg(7).allowed(Restriction::of::<Sheep>()))?;
//! assert_eq!(ram.take::<Ram>()?, Ram { age: 7, name: "Gorki".to_owned() });
//! # Ok(())
//! # }
//! ```
//!
//! ## Lazy registration
//! Types exported with [`export_types!`] can be registered by their dotted path and
//! are only looked up on first use:
//! ```rust,ignore
//! factory.register_with(Registration::path("my_crate.animals.Sheep").type_id("sheep"))?;
//! ```
//!
//! A process-wide default factory is reachable through the free functions
//! ([`register`], [`create`], [`convert`], ...).

mod args;
#[cfg(feature = "config")]
pub mod config;
mod entry;
mod error;
mod factory;
mod global;
mod handle;
mod instance;
mod lazy;
mod modules;
pub mod prelude;

pub use args::Arguments;
pub use dessinemoi_derive::Registrable;
pub use entry::RegistryEntry;
pub use error::{ConstructError, FactoryError, FactoryErrorExt};
pub use factory::{CreateOptions, Factory, Input, Registration, TYPE_KEY};
pub use global::{
    alias, convert, converter, create, factory, factory_mut, get_type, register, register_with,
    registered_types,
};
pub use handle::{Registrable, Restriction, TypeBuilder, TypeHandle};
pub use instance::Instance;
pub use lazy::{LazyType, SEPARATOR, TypeRef};
pub use modules::{LinkedModules, Module, ModuleDecl, ModuleTable, Resolver};

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}
