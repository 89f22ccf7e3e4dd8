#![allow(unreachable_pub)]

//! # Macros
//!
//! Procedural macros for registrable factory types.
//! The derive is re-exported by `dessinemoi`, so consumers depend on that crate only:
//! ```toml
//! [dependencies]
//! dessinemoi = { path = "../crates/dessinemoi" }
//! ```

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `dessinemoi::Registrable` for a struct.
///
/// The default constructor binds factory arguments onto the struct through its
/// `serde::Deserialize` impl, which must be derived as well:
///
/// * **Named fields**: positional arguments bind to fields in declaration order,
///   keyword arguments by name. Field-level `rename` and `skip` serde attributes are
///   honored; defaults come from `#[serde(default)]`.
/// * **Tuple structs**: positional arguments only, as a sequence (a single value for
///   newtypes).
/// * **Unit structs**: no arguments.
///
/// # Arguments
///
/// * `type_id = "..."` - Default identifier used by `Factory::register`.
/// * `extends(Path, ...)` - Declared supertypes, checked by type restrictions.
/// * `constructors(name, ...)` - Associated functions `fn(Arguments) -> Result<Self, ConstructError>`
///   exposed as named alternate constructors.
/// * `params(a, b, ...)` - Overrides the positional parameter order.
///
/// # Errors
/// Emits a compile-time error for enums, unions, generic structs, unknown
/// arguments, and containers using `rename_all` without `params(...)`.
///
/// # Example
///
/// ```rust,ignore
/// use dessinemoi::{Arguments, ConstructError, Registrable};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize, Registrable)]
/// #[registrable(type_id = "ram", extends(Sheep), constructors(from_fleece))]
/// struct Ram {
///     age: u32,
///     #[serde(default = "gorki")]
///     name: String,
/// }
///
/// impl Ram {
///     fn from_fleece(args: Arguments) -> Result<Self, ConstructError> {
///         args.bind(&["age"])
///     }
/// }
/// ```
#[proc_macro_derive(Registrable, attributes(registrable))]
pub fn derive_registrable(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::registrable::expand_derive(input).into()
}
