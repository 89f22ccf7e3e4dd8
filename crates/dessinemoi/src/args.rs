use crate::error::ConstructError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Positional and keyword arguments handed to a constructor.
///
/// Values are plain JSON values; a constructor binds them onto its own parameters,
/// usually through [`Arguments::bind`].
///
/// # Examples
/// ```rust
/// use dessinemoi::Arguments;
///
/// let args = Arguments::new().arg(5).kwarg("name", "Dolly");
/// assert_eq!(args.positional().len(), 1);
/// assert_eq!(args.keyword()["name"], "Dolly");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    keyword: Map<String, Value>,
}

impl Arguments {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument, replacing a previous value under the same name.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Merges a whole keyword mapping.
    #[must_use]
    pub fn kwargs(mut self, keyword: Map<String, Value>) -> Self {
        self.keyword.extend(keyword);
        self
    }

    #[must_use]
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    #[must_use]
    pub const fn keyword(&self) -> &Map<String, Value> {
        &self.keyword
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Splits the set into its positional and keyword parts.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Value>, Map<String, Value>) {
        (self.positional, self.keyword)
    }

    /// Binds positional arguments onto `params` (in order), merges keyword arguments
    /// and deserializes the result into `T`.
    ///
    /// Parameters absent from both lists are left to `T`'s own deserialization, so
    /// `#[serde(default)]` fields behave like defaulted constructor parameters.
    ///
    /// # Errors
    /// Returns [`ConstructError::Arguments`] if more positional arguments than
    /// parameters are given, if a keyword names no parameter, or if a parameter
    /// receives both a positional and a keyword value. Returns [`ConstructError::Value`] if deserialization fails.
    pub fn bind<T: DeserializeOwned>(self, params: &[&str]) -> Result<T, ConstructError> {
        if self.positional.len() > params.len() {
            return Err(ConstructError::arguments(format!(
                "takes {} positional arguments but {} were given",
                params.len(),
                self.positional.len()
            )));
        }

        let mut bound = Map::with_capacity(self.positional.len() + self.keyword.len());
        for (param, value) in params.iter().zip(self.positional) {
            bound.insert((*param).to_owned(), value);
        }

        for (name, value) in self.keyword {
            if !params.contains(&name.as_str()) {
                return Err(ConstructError::arguments(format!(
                    "got an unexpected keyword argument '{name}'"
                )));
            }
            if bound.contains_key(&name) {
                return Err(ConstructError::arguments(format!(
                    "got multiple values for argument '{name}'"
                )));
            }
            bound.insert(name, value);
        }

        Ok(serde_json::from_value(Value::Object(bound))?)
    }

    /// Deserializes the positional arguments as a sequence (tuple structs).
    ///
    /// # Errors
    /// Returns [`ConstructError::Arguments`] if keyword arguments are present and
    /// [`ConstructError::Value`] if deserialization fails.
    pub fn bind_sequence<T: DeserializeOwned>(self) -> Result<T, ConstructError> {
        self.reject_keywords()?;
        Ok(serde_json::from_value(Value::Array(self.positional))?)
    }

    /// Deserializes a single positional argument (newtype structs).
    ///
    /// # Errors
    /// Returns [`ConstructError::Arguments`] unless exactly one positional argument
    /// and no keyword argument is given, and [`ConstructError::Value`] if
    /// deserialization fails.
    pub fn bind_single<T: DeserializeOwned>(mut self) -> Result<T, ConstructError> {
        self.reject_keywords()?;
        if self.positional.len() != 1 {
            return Err(ConstructError::arguments(format!(
                "takes 1 positional argument but {} were given",
                self.positional.len()
            )));
        }
        Ok(serde_json::from_value(self.positional.remove(0))?)
    }

    /// Ensures that no argument was supplied (unit structs).
    ///
    /// # Errors
    /// Returns [`ConstructError::Arguments`] if any argument is present.
    pub fn expect_empty(self) -> Result<(), ConstructError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ConstructError::arguments(format!(
                "takes no arguments but {} were given",
                self.positional.len() + self.keyword.len()
            )))
        }
    }

    fn reject_keywords(&self) -> Result<(), ConstructError> {
        match self.keyword.keys().next() {
            Some(name) => Err(ConstructError::arguments(format!(
                "got an unexpected keyword argument '{name}'"
            ))),
            None => Ok(()),
        }
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(keyword: Map<String, Value>) -> Self {
        Self { positional: Vec::new(), keyword }
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(positional: Vec<Value>) -> Self {
        Self { positional, keyword: Map::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Sheep {
        age: u32,
        #[serde(default = "dolly")]
        name: String,
    }

    fn dolly() -> String {
        "Dolly".to_owned()
    }

    #[test]
    fn binds_positional_then_keyword() {
        let sheep: Sheep =
            Arguments::new().arg(5).kwarg("name", "Shaun").bind(&["age", "name"]).unwrap();
        assert_eq!(sheep, Sheep { age: 5, name: "Shaun".to_owned() });

        let sheep: Sheep = Arguments::new().arg(7).bind(&["age", "name"]).unwrap();
        assert_eq!(sheep.name, "Dolly");
    }

    #[test]
    fn rejects_surplus_and_duplicate_arguments() {
        let err = Arguments::new().arg(1).arg("a").arg(true).bind::<Sheep>(&["age", "name"]);
        assert!(matches!(err, Err(ConstructError::Arguments { .. })));

        let err = Arguments::new().arg(1).kwarg("age", 2).bind::<Sheep>(&["age", "name"]);
        assert!(
            matches!(err, Err(ConstructError::Arguments { message }) if message.contains("'age'"))
        );
    }

    #[test]
    fn rejects_unknown_keywords() {
        let err = Arguments::new().arg(1).kwarg("colour", "white").bind::<Sheep>(&["age", "name"]);
        assert!(
            matches!(err, Err(ConstructError::Arguments { message }) if message.contains("'colour'"))
        );
    }

    #[test]
    fn missing_required_parameter_is_a_value_error() {
        let err = Arguments::new().kwarg("name", "x").bind::<Sheep>(&["age", "name"]);
        assert!(matches!(err, Err(ConstructError::Value { .. })));
    }

    #[test]
    fn sequence_single_and_empty_binding() {
        let pair: (u8, String) = Arguments::new().arg(1).arg("x").bind_sequence().unwrap();
        assert_eq!(pair, (1, "x".to_owned()));
        assert!(Arguments::new().kwarg("a", 1).bind_sequence::<(u8,)>().is_err());

        let single: u8 = Arguments::new().arg(3).bind_single().unwrap();
        assert_eq!(single, 3);
        assert!(Arguments::new().bind_single::<u8>().is_err());

        assert!(Arguments::new().expect_empty().is_ok());
        assert!(Arguments::new().arg(1).expect_empty().is_err());
    }
}
