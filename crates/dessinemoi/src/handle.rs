//! Type handles: the type-erased view of a [`Registrable`] type the factory works with.

use crate::args::Arguments;
use crate::error::{ConstructError, FactoryError};
use crate::instance::Instance;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::RwLock;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};
use tracing::warn;

/// Capability contract for types that can be registered to a [`Factory`](crate::Factory).
///
/// Usually derived:
///
/// ```rust
/// use dessinemoi::Registrable;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize, Registrable)]
/// #[registrable(type_id = "sheep")]
/// struct Sheep {
///     age: u32,
///     name: String,
/// }
///
/// assert_eq!(Sheep::TYPE_ID, Some("sheep"));
/// ```
pub trait Registrable: Any + Send + Sync + Sized {
    /// Identifier used when the type is registered without an explicit one.
    const TYPE_ID: Option<&'static str> = None;

    /// Default constructor.
    ///
    /// # Errors
    /// Returns a [`ConstructError`] if the arguments cannot be bound or are rejected.
    fn construct(args: Arguments) -> Result<Self, ConstructError>;

    /// Declares supertypes and named alternate constructors.
    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty;
    }
}

type ErasedValue = Box<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Constructor(Arc<dyn Fn(Arguments) -> Result<ErasedValue, ConstructError> + Send + Sync>);

impl Constructor {
    fn of<T: Registrable>(f: fn(Arguments) -> Result<T, ConstructError>) -> Self {
        Self(Arc::new(move |args| f(args).map(|value| Box::new(value) as ErasedValue)))
    }

    fn missing(type_name: &'static str) -> Self {
        Self(Arc::new(move |_| {
            Err(ConstructError::failed(format!("'{type_name}' has no constructor")))
        }))
    }
}

struct TypeInfo {
    type_id: TypeId,
    type_name: &'static str,
    fullname: String,
    default_id: Option<&'static str>,
    lineage: Vec<TypeId>,
    constructor: Constructor,
    alternates: FxHashMap<&'static str, Constructor>,
}

static HANDLES: LazyLock<RwLock<FxHashMap<TypeId, TypeHandle>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

static OPAQUE_HANDLES: LazyLock<RwLock<FxHashMap<TypeId, TypeHandle>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

thread_local! {
    /// Types whose `describe` is running on this thread.
    static BUILDING: RefCell<FxHashSet<TypeId>> = RefCell::new(FxHashSet::default());
}

/// Marks a type as being built until dropped.
struct Building(TypeId);

impl Building {
    fn enter(id: TypeId) -> Self {
        BUILDING.with_borrow_mut(|ids| ids.insert(id));
        Self(id)
    }

    fn contains(id: TypeId) -> bool {
        BUILDING.with_borrow(|ids| ids.contains(&id))
    }
}

impl Drop for Building {
    fn drop(&mut self) {
        BUILDING.with_borrow_mut(|ids| ids.remove(&self.0));
    }
}

/// A cheap, clonable handle to a concrete [`Registrable`] type.
///
/// Handles compare equal when they describe the same Rust type. They are built once
/// per type and shared process-wide.
#[derive(Clone)]
pub struct TypeHandle {
    info: Arc<TypeInfo>,
}

impl TypeHandle {
    /// Returns the handle of `T`.
    #[must_use]
    pub fn of<T: Registrable>() -> Self {
        let id = TypeId::of::<T>();
        if let Some(handle) = HANDLES.read().get(&id) {
            return handle.clone();
        }

        // Built outside the lock: `describe` may request supertype handles.
        let handle = Self::build::<T>();
        HANDLES.write().entry(id).or_insert(handle).clone()
    }

    /// Returns a handle for any `T`, registrable or not.
    ///
    /// The handle has no supertypes, no default identifier and no usable constructor.
    /// It only serves to carry values of foreign types through
    /// [`Factory::convert`](crate::Factory::convert) and restriction checks.
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>() -> Self {
        let id = TypeId::of::<T>();
        if let Some(handle) = OPAQUE_HANDLES.read().get(&id) {
            return handle.clone();
        }

        let type_name = std::any::type_name::<T>();
        let handle = Self {
            info: Arc::new(TypeInfo {
                type_id: id,
                type_name,
                fullname: type_name.replace("::", "."),
                default_id: None,
                lineage: vec![id],
                constructor: Constructor::missing(type_name),
                alternates: FxHashMap::default(),
            }),
        };
        OPAQUE_HANDLES.write().entry(id).or_insert(handle).clone()
    }

    fn build<T: Registrable>() -> Self {
        let mut builder = TypeBuilder::<T>::new();
        {
            let _building = Building::enter(TypeId::of::<T>());
            T::describe(&mut builder);
        }

        let type_name = std::any::type_name::<T>();
        Self {
            info: Arc::new(TypeInfo {
                type_id: TypeId::of::<T>(),
                type_name,
                fullname: type_name.replace("::", "."),
                default_id: T::TYPE_ID,
                lineage: builder.lineage,
                constructor: Constructor::of::<T>(T::construct),
                alternates: builder.alternates,
            }),
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.info.type_id
    }

    /// Rust type name, as reported by [`std::any::type_name`].
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.info.type_name
    }

    /// Fully qualified, dot-separated name (`zoo.animals.Sheep`).
    #[must_use]
    pub fn fullname(&self) -> &str {
        &self.info.fullname
    }

    /// Self-declared default identifier, if any.
    #[must_use]
    pub fn default_id(&self) -> Option<&'static str> {
        self.info.default_id
    }

    /// The type itself followed by every declared supertype.
    #[must_use]
    pub fn lineage(&self) -> &[TypeId] {
        &self.info.lineage
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.info.type_id == TypeId::of::<T>()
    }

    /// Whether `self` is `other` or declares it as a (transitive) supertype.
    #[must_use]
    pub fn is_subtype_of(&self, other: &Self) -> bool {
        self.info.lineage.contains(&other.info.type_id)
    }

    #[must_use]
    pub fn has_constructor(&self, name: &str) -> bool {
        self.info.alternates.contains_key(name)
    }

    /// Names of the alternate constructors.
    pub fn constructors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.info.alternates.keys().copied()
    }

    /// Invokes the default constructor, or the named alternate constructor.
    ///
    /// # Errors
    /// Returns [`FactoryError::InvalidArgument`] if `constructor` names no alternate
    /// constructor of this type. Constructor failures are returned unchanged as
    /// [`FactoryError::Construct`].
    pub fn construct(
        &self,
        args: Arguments,
        constructor: Option<&str>,
    ) -> Result<Instance, FactoryError> {
        let ctor = match constructor {
            None => &self.info.constructor,
            Some(name) => self.info.alternates.get(name).ok_or_else(|| {
                FactoryError::invalid(format!(
                    "constructor '{}.{name}()' does not exist",
                    self.fullname()
                ))
            })?,
        };

        let value = (ctor.0)(args)?;
        Ok(Instance::from_parts(self.clone(), value))
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.info.type_id == other.info.type_id
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.type_id.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandle")
            .field("fullname", &self.info.fullname)
            .field("default_id", &self.info.default_id)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.info.fullname)
    }
}

/// Collects what [`Registrable::describe`] declares about a type.
pub struct TypeBuilder<T> {
    lineage: Vec<TypeId>,
    alternates: FxHashMap<&'static str, Constructor>,
    _type: PhantomData<fn() -> T>,
}

impl<T: Registrable> TypeBuilder<T> {
    fn new() -> Self {
        Self {
            lineage: vec![TypeId::of::<T>()],
            alternates: FxHashMap::default(),
            _type: PhantomData,
        }
    }

    /// Declares `S` (and, transitively, its own supertypes) as a supertype.
    ///
    /// In a cycle of declarations, a type still being described contributes only itself.
    pub fn extends<S: Registrable>(&mut self) -> &mut Self {
        let id = TypeId::of::<S>();
        if Building::contains(id) {
            warn!(
                ty = std::any::type_name::<T>(),
                supertype = std::any::type_name::<S>(),
                "Cyclic supertype declaration"
            );
            if !self.lineage.contains(&id) {
                self.lineage.push(id);
            }
            return self;
        }

        let parent = TypeHandle::of::<S>();
        for id in parent.lineage() {
            if !self.lineage.contains(id) {
                self.lineage.push(*id);
            }
        }
        self
    }

    /// Registers a named alternate constructor.
    pub fn constructor(
        &mut self,
        name: &'static str,
        constructor: fn(Arguments) -> Result<T, ConstructError>,
    ) -> &mut Self {
        self.alternates.insert(name, Constructor::of::<T>(constructor));
        self
    }
}

impl<T> fmt::Debug for TypeBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBuilder")
            .field("type", &std::any::type_name::<T>())
            .field("supertypes", &self.lineage.len().saturating_sub(1))
            .field("constructors", &self.alternates.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Types a creation or conversion is restricted to.
///
/// A type satisfies the restriction when it is, or extends, any of the listed types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    allowed: Vec<TypeHandle>,
}

impl Restriction {
    #[must_use]
    pub fn of<T: Registrable>() -> Self {
        Self { allowed: vec![TypeHandle::of::<T>()] }
    }

    /// Also accepts `T`.
    #[must_use]
    pub fn or<T: Registrable>(self) -> Self {
        self.with(TypeHandle::of::<T>())
    }

    /// Also accepts the type behind `handle`.
    #[must_use]
    pub fn with(mut self, handle: TypeHandle) -> Self {
        if !self.allowed.contains(&handle) {
            self.allowed.push(handle);
        }
        self
    }

    #[must_use]
    pub fn allows(&self, ty: &TypeHandle) -> bool {
        self.allowed.iter().any(|allowed| ty.is_subtype_of(allowed))
    }

    #[must_use]
    pub fn types(&self) -> &[TypeHandle] {
        &self.allowed
    }
}

impl From<TypeHandle> for Restriction {
    fn from(handle: TypeHandle) -> Self {
        Self { allowed: vec![handle] }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ty) in self.allowed.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(ty.fullname())?;
        }
        Ok(())
    }
}

/// Plain JSON values pass through conversion as instances of [`Value`].
impl Registrable for Value {
    fn construct(args: Arguments) -> Result<Self, ConstructError> {
        let (mut positional, keyword) = args.into_parts();
        match positional.len() {
            0 => Ok(Self::Object(keyword)),
            1 if keyword.is_empty() => Ok(positional.remove(0)),
            _ => Err(ConstructError::arguments(
                "expected a single positional argument or keyword arguments only",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Animal;
    struct Sheep;
    struct Lamb;

    impl Registrable for Animal {
        fn construct(args: Arguments) -> Result<Self, ConstructError> {
            args.expect_empty().map(|()| Self)
        }
    }

    impl Registrable for Sheep {
        const TYPE_ID: Option<&'static str> = Some("sheep");

        fn construct(args: Arguments) -> Result<Self, ConstructError> {
            args.expect_empty().map(|()| Self)
        }

        fn describe(ty: &mut TypeBuilder<Self>) {
            ty.extends::<Animal>().constructor("shorn", |_| Ok(Self));
        }
    }

    impl Registrable for Lamb {
        fn construct(args: Arguments) -> Result<Self, ConstructError> {
            args.expect_empty().map(|()| Self)
        }

        fn describe(ty: &mut TypeBuilder<Self>) {
            ty.extends::<Sheep>();
        }
    }

    #[test]
    fn handles_are_memoized_and_compare_by_type() {
        let a = TypeHandle::of::<Sheep>();
        let b = TypeHandle::of::<Sheep>();
        assert!(Arc::ptr_eq(&a.info, &b.info));
        assert_eq!(a, b);
        assert_ne!(a, TypeHandle::of::<Lamb>());
        assert!(a.fullname().ends_with("handle.tests.Sheep"));
        assert_eq!(a.default_id(), Some("sheep"));
    }

    #[test]
    fn lineage_is_transitive() {
        let lamb = TypeHandle::of::<Lamb>();
        assert!(lamb.is_subtype_of(&TypeHandle::of::<Sheep>()));
        assert!(lamb.is_subtype_of(&TypeHandle::of::<Animal>()));
        assert!(!TypeHandle::of::<Animal>().is_subtype_of(&lamb));
        assert_eq!(lamb.lineage().len(), 3);
    }

    struct Ewe;
    struct Tup;

    impl Registrable for Ewe {
        fn construct(args: Arguments) -> Result<Self, ConstructError> {
            args.expect_empty().map(|()| Self)
        }

        fn describe(ty: &mut TypeBuilder<Self>) {
            ty.extends::<Tup>();
        }
    }

    impl Registrable for Tup {
        fn construct(args: Arguments) -> Result<Self, ConstructError> {
            args.expect_empty().map(|()| Self)
        }

        fn describe(ty: &mut TypeBuilder<Self>) {
            ty.extends::<Ewe>();
        }
    }

    #[test]
    fn cyclic_supertypes_terminate() {
        let ewe = TypeHandle::of::<Ewe>();
        let tup = TypeHandle::of::<Tup>();
        assert!(ewe.is_subtype_of(&tup));
        assert!(tup.is_subtype_of(&ewe));
        assert_eq!(ewe.lineage().len(), 2);
    }

    #[test]
    fn restriction_accepts_any_listed_type() {
        let restriction = Restriction::of::<Lamb>();
        assert!(restriction.allows(&TypeHandle::of::<Lamb>()));
        assert!(!restriction.allows(&TypeHandle::of::<Sheep>()));

        let restriction = restriction.or::<Animal>();
        assert!(restriction.allows(&TypeHandle::of::<Sheep>()));
        assert_eq!(restriction.types().len(), 2);
    }

    #[test]
    fn alternate_constructors_are_looked_up_by_name() {
        let sheep = TypeHandle::of::<Sheep>();
        assert!(sheep.has_constructor("shorn"));
        assert!(sheep.construct(Arguments::new(), Some("shorn")).is_ok());
        assert!(matches!(
            sheep.construct(Arguments::new(), Some("sheared")),
            Err(FactoryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn opaque_handles_have_no_constructor() {
        let handle = TypeHandle::opaque::<String>();
        assert_eq!(handle, TypeHandle::opaque::<String>());
        assert_eq!(handle.lineage(), [TypeId::of::<String>()]);
        assert_eq!(handle.default_id(), None);
        assert!(!Restriction::of::<Sheep>().allows(&handle));
        assert!(matches!(
            handle.construct(Arguments::new(), None),
            Err(FactoryError::Construct { source: ConstructError::Failed { .. } })
        ));
    }

    #[test]
    fn json_values_are_registrable() {
        assert_eq!(TypeHandle::of::<Value>().fullname(), "serde_json.value.Value");
        let value = Value::construct(Arguments::new().arg(json!(3))).unwrap();
        assert_eq!(value, json!(3));
    }
}
