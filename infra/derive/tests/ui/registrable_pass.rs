use dessinemoi::{Arguments, ConstructError, Registrable, TypeHandle};
use serde::Deserialize;

#[derive(Debug, PartialEq, Deserialize, Registrable)]
#[registrable(type_id = "sheep")]
struct Sheep {
    age: u32,
    name: String,
}

#[derive(Debug, PartialEq, Deserialize, Registrable)]
#[registrable(type_id = "ram", extends(Sheep), constructors(shorn))]
struct Ram {
    age: u32,
    #[serde(default = "gorki")]
    name: String,
}

impl Ram {
    fn shorn(args: Arguments) -> Result<Self, ConstructError> {
        let age: u32 = args.bind_single()?;
        Ok(Self { age, name: "Shorn".to_owned() })
    }
}

fn gorki() -> String {
    "Gorki".to_owned()
}

#[derive(Debug, PartialEq, Deserialize, Registrable)]
struct Fleece(u32, String);

#[derive(Debug, PartialEq, Deserialize, Registrable)]
struct Age(u32);

#[derive(Debug, PartialEq, Registrable)]
struct Lamb;

fn main() {
    assert_eq!(Sheep::TYPE_ID, Some("sheep"));
    assert_eq!(Fleece::TYPE_ID, None);

    let ram = Ram::construct(Arguments::new().arg(7)).unwrap();
    assert_eq!(ram, Ram { age: 7, name: "Gorki".to_owned() });

    let handle = TypeHandle::of::<Ram>();
    assert!(handle.is_subtype_of(&TypeHandle::of::<Sheep>()));
    assert!(handle.has_constructor("shorn"));

    assert_eq!(
        Fleece::construct(Arguments::new().arg(3).arg("white")).unwrap(),
        Fleece(3, "white".to_owned())
    );
    assert_eq!(Age::construct(Arguments::new().arg(4)).unwrap(), Age(4));
    assert_eq!(Lamb::construct(Arguments::new()).unwrap(), Lamb);
    assert!(Lamb::construct(Arguments::new().arg(1)).is_err());
}
