//! Value Types
//!
//! A [`ValueType`] describes what an attribute accepts: a kind (`string`,
//! `number`, a component name, ...), whether `undefined` is allowed, the
//! validators to run, and for arrays the type of the items.
//!
//! Types are written the same way they are introspected:
//!
//! ```rust,ignore
//! let title: ValueType = "string".parse()?;
//! let rating: ValueType = "number?".parse()?;
//! let cast = ValueType::array(ValueType::component("Actor"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::validator::{FailedValidator, Validator, ValidatorIntrospection};
use crate::error::{Error, Result};
use crate::value::Value;

/// The kind of value a type accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Any,
    Boolean,
    Number,
    String,
    Object,
    Array,
    Date,
    /// An instance of the named component class.
    Component(String),
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Boolean => f.write_str("boolean"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::Object => f.write_str("object"),
            Self::Array => f.write_str("array"),
            Self::Date => f.write_str("Date"),
            Self::Component(name) => f.write_str(name),
        }
    }
}

/// Type descriptor of an attribute.
#[derive(Debug, Clone)]
pub struct ValueType {
    kind: TypeKind,
    optional: bool,
    validators: Vec<Validator>,
    items: Option<Box<ValueType>>,
}

impl ValueType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
            validators: Vec::new(),
            items: None,
        }
    }

    pub fn any() -> Self {
        Self::new(TypeKind::Any)
    }

    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean)
    }

    pub fn number() -> Self {
        Self::new(TypeKind::Number)
    }

    pub fn string() -> Self {
        Self::new(TypeKind::String)
    }

    pub fn object() -> Self {
        Self::new(TypeKind::Object)
    }

    pub fn date() -> Self {
        Self::new(TypeKind::Date)
    }

    /// An array whose items have type `items`.
    pub fn array(items: ValueType) -> Self {
        Self::new(TypeKind::Array).with_items(items)
    }

    pub fn component(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Component(name.into()))
    }

    /// Accept `undefined` as well.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_items(mut self, items: ValueType) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn items(&self) -> Option<&ValueType> {
        self.items.as_deref()
    }

    /// Reject values this type does not accept.
    ///
    /// `attribute` names the attribute being written, for the error message.
    pub fn check_value(&self, value: &Value, attribute: &str) -> Result<()> {
        self.check_value_at(value, attribute, "")
    }

    fn check_value_at(&self, value: &Value, attribute: &str, path: &str) -> Result<()> {
        if self.accepts(value) {
            if let (Some(items_type), Some(items)) = (self.items(), value.list_items()) {
                for (index, item) in items.iter().enumerate() {
                    items_type.check_value_at(item, attribute, &format!("{path}[{index}]"))?;
                }
            }
            return Ok(());
        }

        Err(Error::TypeMismatch {
            attribute: attribute.to_string(),
            path: path.to_string(),
            expected: self.to_string(),
            actual: value.type_name(),
        })
    }

    fn accepts(&self, value: &Value) -> bool {
        if value.is_undefined() {
            return self.optional || self.kind == TypeKind::Any;
        }

        match (&self.kind, value) {
            (TypeKind::Any, _) => true,
            (TypeKind::Boolean, Value::Bool(_)) => true,
            (TypeKind::Number, Value::Number(_)) => true,
            (TypeKind::String, Value::String(_)) => true,
            (TypeKind::Date, Value::Date(_)) => true,
            (TypeKind::Object, Value::Object(_)) => true,
            (TypeKind::Object, Value::Observable(observable)) => !observable.is_list(),
            (TypeKind::Array, Value::Array(_)) => true,
            (TypeKind::Array, Value::Observable(observable)) => observable.is_list(),
            (TypeKind::Component(name), Value::Component(component)) => {
                component.class_name() == name
            }
            _ => false,
        }
    }

    /// Run every validator, including item validators for arrays.
    ///
    /// `undefined` values are not validated.
    pub fn run_validators(&self, value: &Value) -> Vec<FailedValidator> {
        let mut failures = Vec::new();
        self.collect_failures(value, "", &mut failures);
        failures
    }

    fn collect_failures(&self, value: &Value, path: &str, failures: &mut Vec<FailedValidator>) {
        if value.is_undefined() {
            return;
        }

        for validator in &self.validators {
            if !validator.run(value) {
                failures.push(FailedValidator {
                    validator: validator.clone(),
                    path: path.to_string(),
                });
            }
        }

        if let (Some(items_type), Some(items)) = (self.items(), value.list_items()) {
            for (index, item) in items.iter().enumerate() {
                items_type.collect_failures(item, &format!("{path}[{index}]"), failures);
            }
        }
    }

    pub fn introspect(&self) -> TypeIntrospection {
        TypeIntrospection {
            value_type: self.to_string(),
            validators: self.validators.iter().map(Validator::introspect).collect(),
            items: self.items().map(|items| Box::new(items.introspect())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// Deepest array nesting a type string may describe.
const MAX_ARRAY_DEPTH: usize = 64;

impl FromStr for ValueType {
    type Err = Error;

    /// Parse `kind`, `kind?`, `array(items)` or `items[]`.
    ///
    /// Any identifier that is not a built-in kind is taken as a component
    /// name. At most `MAX_ARRAY_DEPTH` array layers are accepted.
    fn from_str(source: &str) -> Result<Self> {
        let invalid = || Error::InvalidType(source.to_string());

        // Optional flags of the enclosing array layers, outermost first.
        let mut layers = Vec::new();
        let mut rest = source.trim();
        let (name, optional) = loop {
            let (body, optional) = match rest.strip_suffix('?') {
                Some(body) => (body.trim_end(), true),
                None => (rest, false),
            };
            let items = body.strip_suffix("[]").or_else(|| {
                body.strip_prefix("array(")
                    .and_then(|inner| inner.strip_suffix(')'))
            });
            match items {
                Some(_) if layers.len() == MAX_ARRAY_DEPTH => return Err(invalid()),
                Some(items) => {
                    layers.push(optional);
                    rest = items.trim();
                }
                None => break (body, optional),
            }
        };

        let kind = match name {
            "any" => TypeKind::Any,
            "boolean" => TypeKind::Boolean,
            "number" => TypeKind::Number,
            "string" => TypeKind::String,
            "object" => TypeKind::Object,
            "array" => TypeKind::Array,
            "Date" => TypeKind::Date,
            component if is_identifier(component) => TypeKind::Component(component.to_string()),
            _ => return Err(invalid()),
        };

        let mut value_type = Self::new(kind);
        if optional {
            value_type = value_type.optional();
        }
        for optional in layers.into_iter().rev() {
            value_type = Self::array(value_type);
            if optional {
                value_type = value_type.optional();
            }
        }
        Ok(value_type)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Serializable description of a type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeIntrospection {
    #[serde(rename = "valueType")]
    pub value_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValidatorIntrospection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<TypeIntrospection>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kinds() {
        let title: ValueType = "string".parse().unwrap();
        assert_eq!(title.kind(), &TypeKind::String);
        assert!(!title.is_optional());

        let rating: ValueType = "number?".parse().unwrap();
        assert!(rating.is_optional());
        assert_eq!(rating.to_string(), "number?");

        let actor: ValueType = "Actor".parse().unwrap();
        assert_eq!(actor.kind(), &TypeKind::Component("Actor".into()));

        assert!("?".parse::<ValueType>().is_err());
    }

    #[test]
    fn parse_array_items() {
        let tags: ValueType = "array(string)".parse().unwrap();
        assert_eq!(tags.kind(), &TypeKind::Array);
        assert_eq!(tags.items().map(ValueType::kind), Some(&TypeKind::String));

        let cast: ValueType = "Actor?[]".parse().unwrap();
        assert!(!cast.is_optional());
        let actor = cast.items().unwrap();
        assert_eq!(actor.kind(), &TypeKind::Component("Actor".into()));
        assert!(actor.is_optional());

        let grid: ValueType = "array(number[])?".parse().unwrap();
        assert!(grid.is_optional());
        let row = grid.items().unwrap();
        assert_eq!(row.kind(), &TypeKind::Array);
        assert_eq!(row.items().map(ValueType::kind), Some(&TypeKind::Number));
        assert!(grid
            .check_value(&Value::array([Value::array([Value::from(1.0)])]), "grid")
            .is_ok());

        let nested = |depth: usize| format!("{}string{}", "array(".repeat(depth), ")".repeat(depth));
        assert!(nested(MAX_ARRAY_DEPTH).parse::<ValueType>().is_ok());
        assert!(nested(10_000).parse::<ValueType>().is_err());

        for malformed in ["array(", "array()", "[]", "string[", "Actor name", "1st", "array(string))"] {
            assert!(
                matches!(malformed.parse::<ValueType>(), Err(Error::InvalidType(_))),
                "{malformed} should be rejected"
            );
        }
    }

    #[test]
    fn check_value_reports_path() {
        let tags = ValueType::array(ValueType::string());
        let value = Value::array([Value::from("a"), Value::from(2.0)]);

        match tags.check_value(&value, "tags") {
            Err(Error::TypeMismatch { path, expected, actual, .. }) => {
                assert_eq!(path, "[1]");
                assert_eq!(expected, "string");
                assert_eq!(actual, "number");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn undefined_requires_optional() {
        assert!(ValueType::string().check_value(&Value::Undefined, "x").is_err());
        assert!(ValueType::string().optional().check_value(&Value::Undefined, "x").is_ok());
        assert!(ValueType::any().check_value(&Value::Undefined, "x").is_ok());
    }

    #[test]
    fn item_validators_carry_index_path() {
        let tags = ValueType::array(ValueType::string().with_validator(Validator::not_empty()))
            .with_validator(Validator::max_length(5));
        let value = Value::array([Value::from("ok"), Value::from("")]);

        let failures = tags.run_validators(&value);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "[1]");
        assert_eq!(failures[0].validator.name(), "notEmpty");
    }

    #[test]
    fn introspection_nests_items() {
        let introspection = ValueType::array(ValueType::number()).introspect();
        assert_eq!(introspection.value_type, "array");
        assert_eq!(introspection.items.unwrap().value_type, "number");
    }
}
