use dessinemoi::{Arguments, ConstructError, Factory, Registrable};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Registrable)]
#[registrable(type_id = "sheep", constructors(old))]
pub struct Sheep {
    pub age: u32,
    pub name: String,
}

impl Sheep {
    /// Alternate constructor: a 15 year old sheep.
    pub fn old(args: Arguments) -> Result<Self, ConstructError> {
        #[derive(Deserialize)]
        struct Params {
            name: String,
        }

        let Params { name } = args.bind(&["name"])?;
        Ok(Self { age: 15, name })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Registrable)]
#[registrable(type_id = "ram", extends(Sheep))]
pub struct Ram {
    pub age: u32,
    #[serde(default = "gorki")]
    pub name: String,
}

fn gorki() -> String {
    "Gorki".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Registrable)]
#[registrable(type_id = "lamb", extends(Ram), constructors(merino))]
pub struct Lamb {
    #[serde(default = "some_wool")]
    pub wool: String,
}

impl Lamb {
    /// Dict constructor ignoring the mapping: a lot of wool.
    pub fn merino(args: Arguments) -> Result<Self, ConstructError> {
        args.expect_empty()?;
        Ok(Self { wool: "lots".to_owned() })
    }

    #[must_use]
    pub fn new(wool: &str) -> Self {
        Self { wool: wool.to_owned() }
    }
}

fn some_wool() -> String {
    "some".to_owned()
}

/// Registered only under explicit identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Registrable)]
pub struct Fleece(pub u32);

dessinemoi::export_types!(Sheep, Ram, Lamb, Fleece);

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh factory with `Sheep`, `Ram` and `Lamb` registered under their own identifiers.
/// # Panics
/// * If registration fails.
#[must_use]
pub fn flock() -> Factory {
    init_tracing();

    let mut factory = Factory::new();
    factory.register::<Sheep>().expect("register sheep");
    factory.register::<Ram>().expect("register ram");
    factory.register::<Lamb>().expect("register lamb");
    factory
}

/// Dotted path under which the fixtures are exported in the given test binary.
#[must_use]
pub fn exported(crate_name: &str, ty: &str) -> String {
    format!("{crate_name}.fixtures.{ty}")
}
