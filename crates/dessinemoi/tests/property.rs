use dessinemoi::{FactoryError, LazyType};
use proptest::prelude::*;

const SEGMENT: &str = "[a-z_][a-z0-9_]{0,8}";

proptest! {
    #[test]
    fn dotted_names_split_on_the_last_separator(
        segments in proptest::collection::vec(SEGMENT, 1..5),
        name in SEGMENT,
    ) {
        let namespace = segments.join(".");
        let lazy: LazyType = format!("{namespace}.{name}").parse().unwrap();

        prop_assert_eq!(lazy.namespace(), namespace.as_str());
        prop_assert_eq!(lazy.name(), name.as_str());
        prop_assert_eq!(lazy.fullname(), format!("{namespace}.{name}"));
        prop_assert_eq!(lazy.to_string().parse::<LazyType>().unwrap(), lazy);
    }

    #[test]
    fn names_without_a_separator_are_rejected(name in SEGMENT) {
        let bare = name.parse::<LazyType>();
        let relative = format!(".{name}").parse::<LazyType>();
        let bare_rejected = matches!(bare, Err(FactoryError::InvalidArgument { .. }));
        let relative_rejected = matches!(relative, Err(FactoryError::InvalidArgument { .. }));
        prop_assert!(bare_rejected);
        prop_assert!(relative_rejected);
    }
}
