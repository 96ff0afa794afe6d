//! Validators attached to attribute types.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::value::Value;

type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A named check run against attribute values.
///
/// Validators are part of a class definition and are shared by every
/// instance of that class.
#[derive(Clone)]
pub struct Validator {
    name: String,
    arguments: Vec<serde_json::Value>,
    message: String,
    predicate: Predicate,
}

impl Validator {
    /// A validator backed by an arbitrary predicate.
    pub fn custom<F>(name: impl Into<String>, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            message: message.into(),
            predicate: Arc::new(predicate),
        }
    }

    fn with_arguments(mut self, arguments: Vec<serde_json::Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Strings and lists must not be empty.
    pub fn not_empty() -> Self {
        Self::custom("notEmpty", "The validator `notEmpty()` failed", |value| {
            match length_of(value) {
                Some(length) => length > 0,
                None => true,
            }
        })
    }

    pub fn min_length(min: usize) -> Self {
        Self::custom(
            "minLength",
            format!("The validator `minLength({min})` failed"),
            move |value| length_of(value).map_or(true, |length| length >= min),
        )
        .with_arguments(vec![min.into()])
    }

    pub fn max_length(max: usize) -> Self {
        Self::custom(
            "maxLength",
            format!("The validator `maxLength({max})` failed"),
            move |value| length_of(value).map_or(true, |length| length <= max),
        )
        .with_arguments(vec![max.into()])
    }

    pub fn min(min: f64) -> Self {
        Self::custom(
            "min",
            format!("The validator `min({min})` failed"),
            move |value| value.as_f64().map_or(true, |n| n >= min),
        )
        .with_arguments(vec![min.into()])
    }

    pub fn max(max: f64) -> Self {
        Self::custom(
            "max",
            format!("The validator `max({max})` failed"),
            move |value| value.as_f64().map_or(true, |n| n <= max),
        )
        .with_arguments(vec![max.into()])
    }

    pub fn integer() -> Self {
        Self::custom("integer", "The validator `integer()` failed", |value| {
            value.as_f64().map_or(true, |n| n.fract() == 0.0)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether `value` passes.
    pub fn run(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }

    pub fn introspect(&self) -> ValidatorIntrospection {
        ValidatorIntrospection {
            name: self.name.clone(),
            arguments: self.arguments.clone(),
            message: self.message.clone(),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Observable(observable) => Some(observable.len()),
        _ => None,
    }
}

/// Serializable description of a validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatorIntrospection {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<serde_json::Value>,
    pub message: String,
}

/// A validator that rejected a value, and where.
#[derive(Debug, Clone)]
pub struct FailedValidator {
    pub validator: Validator,
    /// Path relative to the attribute (`""` for the value itself, `"[2]"` for
    /// the third item of a list).
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_validators() {
        assert!(Validator::not_empty().run(&Value::from("x")));
        assert!(!Validator::not_empty().run(&Value::from("")));
        assert!(!Validator::min_length(3).run(&Value::from("ab")));
        assert!(Validator::max_length(2).run(&Value::array([Value::Null])));
    }

    #[test]
    fn numeric_validators() {
        assert!(Validator::min(1.0).run(&Value::from(1.0)));
        assert!(!Validator::max(1.0).run(&Value::from(1.5)));
        assert!(!Validator::integer().run(&Value::from(1.5)));
    }

    #[test]
    fn introspection_lists_arguments() {
        let introspection = Validator::min_length(3).introspect();
        assert_eq!(introspection.name, "minLength");
        assert_eq!(introspection.arguments, vec![serde_json::json!(3)]);
    }
}
