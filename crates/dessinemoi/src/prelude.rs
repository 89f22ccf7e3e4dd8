//! Glob-importable names for code that defines and creates registrable types.

pub use crate::{
    Arguments, ConstructError, CreateOptions, Factory, FactoryError, FactoryErrorExt, Instance,
    Registrable, Registration, Restriction, TypeBuilder,
};
