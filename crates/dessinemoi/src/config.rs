//! # Configuration Loading
//!
//! Layered loading of factory input: a required file (format taken from its
//! extension) overlaid by environment variables.
//!
//! With an environment prefix `ZOO`, the variable `ZOO__FLOCK__AGE=3` overrides the
//! `flock.age` value of the file. Values are parsed as numbers or booleans when
//! possible.

use crate::error::{FactoryError, FactoryErrorExt};
use crate::factory::{Factory, Registration};
use crate::handle::Restriction;
use crate::instance::Instance;
use ::config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Environment nesting separator.
pub const ENV_SEPARATOR: &str = "__";

fn load<T: DeserializeOwned>(path: &Path, env_prefix: Option<&str>) -> Result<T, FactoryError> {
    let mut builder = Config::builder().add_source(File::from(path).required(true));
    if let Some(prefix) = env_prefix {
        builder = builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );
    }

    info!(path = %path.display(), env_prefix, "Loading configuration");

    builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")
}

/// Loads a configuration document as a JSON mapping.
///
/// # Errors
/// Returns [`FactoryError::Config`] if the file is missing, malformed, or its
/// content is not a mapping.
pub fn load_mapping(
    path: impl AsRef<Path>,
    env_prefix: Option<&str>,
) -> Result<Map<String, Value>, FactoryError> {
    load(path.as_ref(), env_prefix)
}

/// Loads a configuration document and converts it with [`Factory::convert`].
///
/// The document's top level must carry the `type` entry.
///
/// # Errors
/// Returns [`FactoryError::Config`] on loading failures and any error of
/// [`Factory::convert`].
pub fn convert_file(
    factory: &Factory,
    path: impl AsRef<Path>,
    env_prefix: Option<&str>,
    allowed: Option<&Restriction>,
) -> Result<Instance, FactoryError> {
    let mapping = load_mapping(path, env_prefix)?;
    factory.convert(mapping, allowed)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeSpec {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        dict_constructor: Option<String>,
        #[serde(default)]
        aliases: Vec<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RegistrationConfig {
    #[serde(default)]
    types: BTreeMap<String, TypeSpec>,
}

/// Reads lazy registrations from the `[types]` table of a configuration document.
///
/// ```toml
/// [types]
/// sheep = "zoo.animals.Sheep"
/// ram = { path = "zoo.animals.Ram", dict_constructor = "from_fleece", aliases = ["tup"] }
/// ```
///
/// Registrations come out ordered by identifier. Paths are validated when the
/// registrations are performed, e.g. by [`Factory::register_all`].
///
/// # Errors
/// Returns [`FactoryError::Config`] if the file is missing or the table is malformed.
pub fn load_registrations(
    path: impl AsRef<Path>,
    env_prefix: Option<&str>,
) -> Result<Vec<Registration>, FactoryError> {
    let RegistrationConfig { types } = load(path.as_ref(), env_prefix)?;
    debug!(count = types.len(), "Loaded type registrations");

    Ok(types
        .into_iter()
        .map(|(type_id, spec)| match spec {
            TypeSpec::Path(path) => Registration::path(path).type_id(type_id),
            TypeSpec::Detailed { path, dict_constructor, aliases } => {
                let registration = Registration::path(path).type_id(type_id).aliases(aliases);
                match dict_constructor {
                    Some(name) => registration.dict_constructor(name),
                    None => registration,
                }
            },
        })
        .collect())
}
