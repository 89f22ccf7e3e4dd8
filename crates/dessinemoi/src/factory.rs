use crate::args::Arguments;
use crate::entry::RegistryEntry;
use crate::error::{FactoryError, FactoryErrorExt};
use crate::handle::{Registrable, Restriction, TypeHandle};
use crate::instance::Instance;
use crate::lazy::{LazyType, TypeRef};
use crate::modules::{LinkedModules, Resolver};
use fxhash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Key of the mapping entry holding the identifier during conversion.
pub const TYPE_KEY: &str = "type";

#[derive(Debug, Clone)]
enum Source {
    Type(TypeRef),
    Path(String),
}

/// A configured registration, the builder form of [`Factory::register_with`].
///
/// # Examples
/// ```rust
/// use dessinemoi::{Factory, Registration};
/// use serde_json::Value;
///
/// let mut factory = Factory::new();
/// factory
///     .register_with(Registration::of::<Value>().type_id("json").alias("value"))
///     .unwrap();
/// assert!(factory.contains("json") && factory.contains("value"));
/// ```
#[derive(Debug, Clone)]
pub struct Registration {
    source: Source,
    type_id: Option<String>,
    dict_constructor: Option<Cow<'static, str>>,
    aliases: Vec<String>,
    allow_lazy: bool,
    allow_aliases: bool,
    overwrite: bool,
}

impl Registration {
    fn from_source(source: Source) -> Self {
        Self {
            source,
            type_id: None,
            dict_constructor: None,
            aliases: Vec::new(),
            allow_lazy: true,
            allow_aliases: false,
            overwrite: false,
        }
    }

    /// Registers the concrete type `T`.
    #[must_use]
    pub fn of<T: Registrable>() -> Self {
        Self::handle(TypeHandle::of::<T>())
    }

    #[must_use]
    pub fn handle(handle: TypeHandle) -> Self {
        Self::from_source(Source::Type(TypeRef::Resolved(handle)))
    }

    /// Registers a lazy reference, resolved on first use.
    #[must_use]
    pub fn lazy(lazy: LazyType) -> Self {
        Self::from_source(Source::Type(TypeRef::Lazy(lazy)))
    }

    /// Registers a fully qualified path (`zoo.animals.Sheep`) as a lazy reference.
    /// The path is validated when the registration is performed.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::from_source(Source::Path(path.into()))
    }

    /// Identifier to register under. Required for lazy references and for types
    /// that do not declare [`Registrable::TYPE_ID`].
    #[must_use]
    pub fn type_id(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    /// Alternate constructor used by [`Factory::convert`].
    #[must_use]
    pub fn dict_constructor(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.dict_constructor = Some(name.into());
        self
    }

    /// Additional identifier sharing the registration.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// When `false`, lazy references are resolved at registration time.
    #[must_use]
    pub const fn allow_lazy(mut self, allow: bool) -> Self {
        self.allow_lazy = allow;
        self
    }

    /// When `true`, the type may already be registered under another identifier.
    #[must_use]
    pub const fn allow_aliases(mut self, allow: bool) -> Self {
        self.allow_aliases = allow;
        self
    }

    /// When `true`, identifiers already in use are replaced.
    #[must_use]
    pub const fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl From<TypeHandle> for Registration {
    fn from(handle: TypeHandle) -> Self {
        Self::handle(handle)
    }
}

impl From<LazyType> for Registration {
    fn from(lazy: LazyType) -> Self {
        Self::lazy(lazy)
    }
}

impl From<&str> for Registration {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl From<String> for Registration {
    fn from(path: String) -> Self {
        Self::path(path)
    }
}

/// Options of [`Factory::create`].
///
/// # Examples
/// ```rust
/// use dessinemoi::CreateOptions;
///
/// let options = CreateOptions::new().arg(7).kwarg("name", "Romuald");
/// assert_eq!(options.arguments().positional().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    allowed: Option<Restriction>,
    construct: Option<Cow<'static, str>>,
    args: Arguments,
}

impl CreateOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts creation to types satisfying `restriction`.
    #[must_use]
    pub fn allowed(mut self, restriction: impl Into<Restriction>) -> Self {
        self.allowed = Some(restriction.into());
        self
    }

    /// Calls the named alternate constructor instead of the default one.
    #[must_use]
    pub fn construct(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.construct = Some(name.into());
        self
    }

    /// Replaces the whole argument set.
    #[must_use]
    pub fn args(mut self, args: Arguments) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args = self.args.arg(value);
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args = self.args.kwarg(name, value);
        self
    }

    #[must_use]
    pub fn kwargs(mut self, keyword: Map<String, Value>) -> Self {
        self.args = self.args.kwargs(keyword);
        self
    }

    #[must_use]
    pub const fn arguments(&self) -> &Arguments {
        &self.args
    }
}

/// Input of [`Factory::convert`]: a tagged mapping, or a value passed through as-is.
#[derive(Debug)]
pub enum Input {
    Mapping(Map<String, Value>),
    Object(Instance),
}

impl From<Map<String, Value>> for Input {
    fn from(mapping: Map<String, Value>) -> Self {
        Self::Mapping(mapping)
    }
}

/// Borrowed mappings are copied; the caller's mapping is never touched.
impl From<&Map<String, Value>> for Input {
    fn from(mapping: &Map<String, Value>) -> Self {
        Self::Mapping(mapping.clone())
    }
}

impl From<Instance> for Input {
    fn from(instance: Instance) -> Self {
        Self::Object(instance)
    }
}

/// JSON objects are mappings; every other JSON value passes through as a [`Value`] instance.
impl From<Value> for Input {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mapping) => Self::Mapping(mapping),
            other => Self::Object(Instance::new(other)),
        }
    }
}

/// A registry of types addressed by string identifiers.
///
/// Registration and aliasing take `&mut self`; lookups, creation and conversion take
/// `&self`. Lazy resolution memoizes into shared entry cells, so a `Factory` can be
/// read from several threads, but concurrent registration needs an outer lock (see
/// [`crate::factory_mut`]).
///
/// # Examples
/// ```rust
/// use dessinemoi::{CreateOptions, Factory, Registrable};
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize, Registrable)]
/// #[registrable(type_id = "sheep")]
/// struct Sheep {
///     age: u32,
///     name: String,
/// }
///
/// # fn main() -> Result<(), dessinemoi::FactoryError> {
/// let mut factory = Factory::new();
/// factory.register::<Sheep>()?;
///
/// let dolly = factory.create("sheep", CreateOptions::new().arg(5).arg("Dolly"))?;
/// assert_eq!(dolly.take::<Sheep>()?, Sheep { age: 5, name: "Dolly".to_owned() });
///
/// let mapping = serde_json::json!({"type": "sheep", "age": 2, "name": "Shaun"});
/// let shaun = factory.convert(mapping, None)?;
/// assert_eq!(shaun.downcast_ref::<Sheep>().map(|s| s.age), Some(2));
/// # Ok(())
/// # }
/// ```
pub struct Factory {
    registry: FxHashMap<String, RegistryEntry>,
    resolver: Arc<dyn Resolver>,
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory {
    /// Creates an empty factory resolving lazy types through [`LinkedModules::global`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(LinkedModules::global())
    }

    /// Creates an empty factory resolving lazy types through `resolver`.
    #[must_use]
    pub fn with_resolver(resolver: Arc<dyn Resolver>) -> Self {
        Self { registry: FxHashMap::default(), resolver }
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// The identifier to entry mapping.
    #[must_use]
    pub const fn registry(&self) -> &FxHashMap<String, RegistryEntry> {
        &self.registry
    }

    #[must_use]
    pub fn entry(&self, type_id: &str) -> Option<&RegistryEntry> {
        self.registry.get(type_id)
    }

    #[must_use]
    pub fn contains(&self, type_id: &str) -> bool {
        self.registry.contains_key(type_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Removes an identifier. Aliases of the same entry are left in place.
    pub fn remove(&mut self, type_id: &str) -> Option<RegistryEntry> {
        let removed = self.registry.remove(type_id);
        if removed.is_some() {
            debug!(type_id, "Removed registry entry");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Fully qualified names of the registered types, without duplicates, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        self.registry
            .values()
            .map(RegistryEntry::fullname)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Registers `T` under its self-declared [`Registrable::TYPE_ID`].
    ///
    /// # Errors
    /// Returns [`FactoryError::InvalidArgument`] if `T` declares no identifier and
    /// [`FactoryError::AlreadyRegistered`] if `T` or its identifier is taken.
    pub fn register<T: Registrable>(&mut self) -> Result<TypeHandle, FactoryError> {
        self.register_with(Registration::of::<T>())?;
        Ok(TypeHandle::of::<T>())
    }

    /// Performs a configured registration and returns the registered type reference.
    ///
    /// Every identifier (main and aliases) is checked before anything is inserted.
    ///
    /// # Errors
    /// - [`FactoryError::InvalidArgument`] for an unparsable path, a missing identifier
    ///   or an alternate constructor the (concrete) type does not expose.
    /// - [`FactoryError::AlreadyRegistered`] if the type is already registered (unless
    ///   `allow_aliases`) or an identifier is taken (unless `overwrite`).
    /// - [`FactoryError::Resolution`] if eager loading of a lazy type fails.
    pub fn register_with(&mut self, registration: Registration) -> Result<TypeRef, FactoryError> {
        let Registration {
            source,
            type_id,
            dict_constructor,
            aliases,
            allow_lazy,
            allow_aliases,
            overwrite,
        } = registration;

        let mut cls = match source {
            Source::Type(cls) => cls,
            Source::Path(path) => TypeRef::Lazy(path.parse()?),
        };

        if let TypeRef::Lazy(lazy) = &cls
            && !allow_lazy
        {
            cls = TypeRef::Resolved(lazy.load(self.resolver.as_ref())?);
        }

        let fullname = cls.fullname().into_owned();
        let type_id = match type_id {
            Some(type_id) => type_id,
            None => cls
                .as_handle()
                .and_then(TypeHandle::default_id)
                .map(str::to_owned)
                .ok_or_else(|| {
                    FactoryError::invalid(format!(
                        "while registering '{fullname}': please declare a type ID"
                    ))
                })?,
        };

        let ids: Vec<&str> =
            std::iter::once(type_id.as_str()).chain(aliases.iter().map(String::as_str)).collect();

        if !allow_aliases && self.is_registered(&cls, overwrite.then_some(ids.as_slice())) {
            return Err(FactoryError::registered(format!("'{fullname}' is already registered")));
        }

        let mut seen = FxHashSet::default();
        for id in &ids {
            if !seen.insert(*id) {
                return Err(FactoryError::registered(format!(
                    "'{id}' is requested twice in one registration"
                )));
            }
            if let Some(existing) = self.registry.get(*id) {
                if !overwrite {
                    return Err(FactoryError::registered(format!(
                        "'{id}' is already used to reference '{}'",
                        existing.fullname()
                    )));
                }
                warn!(type_id = id, previous = %existing.fullname(), "Overwriting registry entry");
            }
        }

        if let (TypeRef::Resolved(handle), Some(name)) = (&cls, &dict_constructor)
            && !handle.has_constructor(name)
        {
            return Err(FactoryError::invalid(format!(
                "constructor '{fullname}.{name}()' does not exist"
            )));
        }

        let entry = RegistryEntry::new(cls.clone(), dict_constructor);
        for alias in &aliases {
            self.registry.insert(alias.clone(), entry.clone());
        }
        debug!(type_id, fullname, lazy = cls.is_lazy(), aliases = ?aliases, "Registered type");
        self.registry.insert(type_id, entry);

        Ok(cls)
    }

    /// Registers a batch, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the first registration error; earlier registrations stay in place.
    pub fn register_all<I>(&mut self, registrations: I) -> Result<Vec<TypeRef>, FactoryError>
    where
        I: IntoIterator<Item = Registration>,
    {
        registrations.into_iter().map(|registration| self.register_with(registration)).collect()
    }

    /// Makes `alias_id` refer to the entry registered as `type_id`.
    ///
    /// The entry is shared, not copied: resolving a lazy type through either
    /// identifier resolves it for both.
    ///
    /// # Errors
    /// Returns [`FactoryError::NotFound`] if `type_id` is not registered and
    /// [`FactoryError::AlreadyRegistered`] if `alias_id` is taken and `overwrite` is
    /// `false`.
    pub fn alias(
        &mut self,
        type_id: &str,
        alias_id: impl Into<String>,
        overwrite: bool,
    ) -> Result<(), FactoryError> {
        let alias_id = alias_id.into();
        let entry = self.registry.get(type_id).cloned().ok_or_else(|| FactoryError::not_found(type_id))?;

        if let Some(existing) = self.registry.get(&alias_id) {
            if !overwrite {
                return Err(FactoryError::registered(format!(
                    "'{alias_id}' is already used to reference '{}'",
                    existing.fullname()
                )));
            }
            warn!(type_id = alias_id, previous = %existing.fullname(), "Overwriting registry entry");
        }

        debug!(type_id, alias = alias_id, "Registered alias");
        self.registry.insert(alias_id, entry);
        Ok(())
    }

    /// Returns the concrete type registered as `type_id`, resolving (and memoizing) a
    /// lazy reference on first use.
    ///
    /// # Errors
    /// Returns [`FactoryError::NotFound`] if `type_id` is not registered and
    /// [`FactoryError::Resolution`] if its lazy reference cannot be located.
    pub fn get_type(&self, type_id: &str) -> Result<TypeHandle, FactoryError> {
        self.registry
            .get(type_id)
            .ok_or_else(|| FactoryError::not_found(type_id))?
            .resolve(self.resolver.as_ref())
            .context(format!("while resolving '{type_id}'"))
    }

    /// Creates an instance of the type registered as `type_id`.
    ///
    /// # Errors
    /// - [`FactoryError::NotFound`] / [`FactoryError::Resolution`] as in [`Factory::get_type`].
    /// - [`FactoryError::TypeNotAllowed`] if the type does not satisfy the restriction.
    /// - [`FactoryError::InvalidArgument`] if the requested alternate constructor does not exist.
    /// - [`FactoryError::Construct`] carrying the constructor's own error.
    pub fn create(&self, type_id: &str, options: CreateOptions) -> Result<Instance, FactoryError> {
        let CreateOptions { allowed, construct, args } = options;
        let cls = self.get_type(type_id)?;

        if let Some(allowed) = &allowed
            && !allowed.allows(&cls)
        {
            return Err(FactoryError::not_allowed(format!(
                "'{type_id}' does not reference allowed type {allowed} or any of its subtypes"
            )));
        }

        trace!(type_id, fullname = cls.fullname(), construct = construct.as_deref(), "Creating instance");
        cls.construct(args, construct.as_deref())
    }

    /// Converts a tagged mapping into an instance, or passes any other value through.
    ///
    /// A mapping must carry the identifier under [`TYPE_KEY`]; its remaining entries
    /// become keyword arguments of the entry's dict constructor (or the default
    /// constructor). The restriction is checked before anything is constructed. Other
    /// values are returned unchanged if they satisfy the restriction.
    ///
    /// # Errors
    /// - [`FactoryError::InvalidArgument`] if the mapping has no string [`TYPE_KEY`].
    /// - [`FactoryError::NotFound`] if the identifier is not registered.
    /// - [`FactoryError::TypeNotAllowed`] if the target or passed-through type is rejected.
    /// - Any error of [`Factory::create`].
    pub fn convert(
        &self,
        value: impl Into<Input>,
        allowed: Option<&Restriction>,
    ) -> Result<Instance, FactoryError> {
        match value.into() {
            Input::Mapping(mut mapping) => {
                let type_id = match mapping.remove(TYPE_KEY) {
                    Some(Value::String(type_id)) => type_id,
                    Some(other) => {
                        return Err(FactoryError::invalid(format!(
                            "'{TYPE_KEY}' must be a string identifier, got {other}"
                        )));
                    },
                    None => {
                        return Err(FactoryError::invalid(format!(
                            "mapping has no '{TYPE_KEY}' entry"
                        )));
                    },
                };

                let entry =
                    self.registry.get(&type_id).ok_or_else(|| FactoryError::not_found(&type_id))?;

                if let Some(allowed) = allowed {
                    let cls = entry.resolve(self.resolver.as_ref())?;
                    if !allowed.allows(&cls) {
                        return Err(FactoryError::not_allowed(format!(
                            "conversion to object type '{type_id}' ({cls}) is not allowed"
                        )));
                    }
                }

                let mut options = CreateOptions::new().kwargs(mapping);
                if let Some(name) = entry.dict_constructor() {
                    options = options.construct(name.to_owned());
                }

                trace!(type_id, "Converting mapping");
                self.create(&type_id, options)
            },
            Input::Object(instance) => match allowed {
                Some(allowed) if !instance.satisfies(allowed) => {
                    Err(FactoryError::not_allowed(format!(
                        "value type '{}' is not allowed (expected {allowed})",
                        instance.type_handle()
                    )))
                },
                _ => Ok(instance),
            },
        }
    }

    /// Returns [`Factory::convert`] with `allowed` baked in, for reuse as a converter.
    pub fn converter(
        &self,
        allowed: Option<Restriction>,
    ) -> impl Fn(Input) -> Result<Instance, FactoryError> + '_ {
        move |value| self.convert(value, allowed.as_ref())
    }

    /// Whether `cls` is registered, ignoring the identifiers in `replaced`.
    ///
    /// Resolved types are compared by identity; lazy references by full name.
    fn is_registered(&self, cls: &TypeRef, replaced: Option<&[&str]>) -> bool {
        let fullname = cls.fullname();
        self.registry.iter().any(|(id, entry)| {
            if replaced.is_some_and(|ids| ids.contains(&id.as_str())) {
                return false;
            }
            match (cls, entry.cls()) {
                (TypeRef::Resolved(handle), TypeRef::Resolved(existing)) => *handle == existing,
                (_, existing) => existing.fullname() == fullname,
            }
        })
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("registry", &self.registry)
            .field("resolver", &self.resolver)
            .finish()
    }
}
