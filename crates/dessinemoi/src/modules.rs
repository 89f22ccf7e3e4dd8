//! Module resolution for lazy type references.
//!
//! A [`Resolver`] maps a dotted namespace path to a [`Module`] of named types. Loading
//! a module may run population code (the analogue of executing a module body), so
//! resolvers memoize: each module is populated at most once per resolver.
//!
//! Two resolvers ship with the crate:
//! - [`LinkedModules`] collects modules declared anywhere in the binary with
//!   [`export_types!`](crate::export_types) and is the default for [`Factory::new`](crate::Factory::new).
//! - [`ModuleTable`] holds loaders declared explicitly at runtime.

use crate::handle::{Registrable, TypeHandle};
use crate::lazy::SEPARATOR;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// A namespace of named types.
#[derive(Debug, Default)]
pub struct Module {
    path: Cow<'static, str>,
    types: FxHashMap<Cow<'static, str>, TypeHandle>,
}

impl Module {
    #[must_use]
    pub fn new(path: impl Into<Cow<'static, str>>) -> Self {
        Self { path: path.into(), types: FxHashMap::default() }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Exposes `T` under `name`.
    pub fn insert<T: Registrable>(&mut self, name: impl Into<Cow<'static, str>>) -> &mut Self {
        self.insert_handle(name, TypeHandle::of::<T>())
    }

    pub fn insert_handle(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        handle: TypeHandle,
    ) -> &mut Self {
        self.types.insert(name.into(), handle);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeHandle> {
        self.types.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Loads modules by dotted path.
pub trait Resolver: Send + Sync + fmt::Debug {
    /// Returns the module at `path`, populating it on first request.
    fn load(&self, path: &str) -> Option<Arc<Module>>;
}

/// A link-time module declaration, submitted by [`export_types!`](crate::export_types).
#[derive(Debug)]
pub struct ModuleDecl {
    path: &'static str,
    populate: fn(&mut Module),
}

impl ModuleDecl {
    /// `path` is a Rust module path (`zoo::animals`); it is matched in dotted form.
    #[must_use]
    pub const fn new(path: &'static str, populate: fn(&mut Module)) -> Self {
        Self { path, populate }
    }

    fn matches(&self, dotted: &str) -> bool {
        let mut segments = self.path.split("::");
        let mut wanted = dotted.split(SEPARATOR);
        loop {
            match (segments.next(), wanted.next()) {
                (Some(a), Some(b)) if a == b => {},
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

inventory::collect!(ModuleDecl);

static LINKED: LazyLock<Arc<LinkedModules>> = LazyLock::new(|| Arc::new(LinkedModules::new()));

/// Resolver over every [`ModuleDecl`] linked into the binary.
///
/// Several declarations for the same path are merged into one module.
#[derive(Debug, Default)]
pub struct LinkedModules {
    loaded: RwLock<FxHashMap<String, Arc<Module>>>,
}

impl LinkedModules {
    /// Creates a resolver with its own (empty) load cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance used by [`Factory::new`](crate::Factory::new).
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&LINKED)
    }

    /// Dotted paths of all declared modules.
    #[must_use]
    pub fn declared() -> Vec<String> {
        let mut paths = Vec::new();
        for decl in inventory::iter::<ModuleDecl> {
            paths.push(decl.path.replace("::", "."));
        }
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

impl Resolver for LinkedModules {
    fn load(&self, path: &str) -> Option<Arc<Module>> {
        if let Some(module) = self.loaded.read().get(path) {
            return Some(Arc::clone(module));
        }

        let mut module = Module::new(path.to_owned());
        let mut found = false;
        for decl in inventory::iter::<ModuleDecl> {
            if decl.matches(path) {
                (decl.populate)(&mut module);
                found = true;
            }
        }
        if !found {
            return None;
        }

        debug!(namespace = path, types = module.len(), "Loaded linked module");
        let module = Arc::new(module);
        Some(Arc::clone(self.loaded.write().entry(path.to_owned()).or_insert(module)))
    }
}

type Loader = Box<dyn Fn(&mut Module) + Send + Sync>;

/// Resolver over loaders declared at runtime.
///
/// # Examples
/// ```rust
/// use dessinemoi::{ModuleTable, Resolver};
/// use serde_json::Value;
///
/// let table = ModuleTable::new();
/// table.declare("json", |module| {
///     module.insert::<Value>("Value");
/// });
///
/// let module = table.load("json").unwrap();
/// assert!(module.get("Value").is_some());
/// assert!(table.load("yaml").is_none());
/// ```
#[derive(Default)]
pub struct ModuleTable {
    loaders: RwLock<FxHashMap<String, Arc<Loader>>>,
    loaded: RwLock<FxHashMap<String, Arc<Module>>>,
}

impl ModuleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the loader for `path`. It runs on the first [`Resolver::load`] of
    /// that path; redeclaring a path that was already loaded has no effect on the
    /// cached module.
    pub fn declare(
        &self,
        path: impl Into<String>,
        populate: impl Fn(&mut Module) + Send + Sync + 'static,
    ) -> &Self {
        self.loaders.write().insert(path.into(), Arc::new(Box::new(populate)));
        self
    }

    /// Whether `path` has been loaded already.
    #[must_use]
    pub fn is_loaded(&self, path: &str) -> bool {
        self.loaded.read().contains_key(path)
    }
}

impl Resolver for ModuleTable {
    fn load(&self, path: &str) -> Option<Arc<Module>> {
        if let Some(module) = self.loaded.read().get(path) {
            return Some(Arc::clone(module));
        }

        let loader = self.loaders.read().get(path).cloned()?;
        let mut module = Module::new(path.to_owned());
        loader(&mut module);

        debug!(namespace = path, types = module.len(), "Loaded declared module");
        let module = Arc::new(module);
        Some(Arc::clone(self.loaded.write().entry(path.to_owned()).or_insert(module)))
    }
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleTable")
            .field("declared", &self.loaders.read().keys().collect::<Vec<_>>())
            .field("loaded", &self.loaded.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Exposes types to lazy resolution under the current module path.
///
/// The types become reachable as `<module path>.<TypeName>`, with `::` written as
/// `.`. Declared at link time; nothing runs until the module is first resolved.
///
/// ```rust,ignore
/// mod animals {
///     dessinemoi::export_types!(Sheep, Ram);
/// }
/// // "my_crate.animals.Sheep" now resolves through `LinkedModules`.
/// ```
#[macro_export]
macro_rules! export_types {
    ($($ty:ident),+ $(,)?) => {
        #[allow(unsafe_code)]
        const _: () = {
            fn __populate(module: &mut $crate::Module) {
                $( module.insert::<$ty>(stringify!($ty)); )+
            }

            $crate::__private::inventory::submit! {
                $crate::ModuleDecl::new(module_path!(), __populate)
            }
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn decl_paths_match_in_dotted_form() {
        fn noop(_: &mut Module) {}
        let decl = ModuleDecl::new("zoo::animals", noop);
        assert!(decl.matches("zoo.animals"));
        assert!(!decl.matches("zoo"));
        assert!(!decl.matches("zoo.animals.Sheep"));
        assert!(!decl.matches("zoo::animals"));
    }

    #[test]
    fn table_populates_each_module_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let table = ModuleTable::new();
        table.declare("json", |module| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            module.insert::<Value>("Value");
        });

        assert!(!table.is_loaded("json"));
        let first = table.load("json").unwrap();
        let second = table.load("json").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(first.names().collect::<Vec<_>>(), ["Value"]);
        assert!(table.is_loaded("json"));
    }

    #[test]
    fn linked_modules_ignore_unknown_paths() {
        assert!(LinkedModules::new().load("no.such.module").is_none());
    }
}
