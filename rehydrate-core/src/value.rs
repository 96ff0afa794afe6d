//! The Value Model
//!
//! [`Value`] is the materialized form of a serialized tree. Scalars are held
//! by value. Aggregates are reference counted so that two references to the
//! same aggregate compare as identical, which is what change detection keys on.
//!
//! # Equality
//!
//! Two notions of equality exist:
//!
//! - [`Value::is_identical`] is the cheap identity/primitive comparison used
//!   to decide whether a write is a change. Scalars and dates compare by
//!   value; aggregates, observables, components and functions compare by
//!   reference.
//! - `PartialEq` is structural for data (arrays, objects and observables are
//!   compared by contents) and by reference for components, component classes
//!   and functions.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::function::Function;
use crate::model::{Component, ComponentClass};
use crate::observe::{Aggregate, Observable, Observe};

/// A materialized value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    /// A plain list, shared.
    Array(Arc<Vec<Value>>),
    /// A plain map, shared.
    Object(Arc<IndexMap<String, Value>>),
    Observable(Observable),
    Component(Component),
    ComponentClass(Arc<ComponentClass>),
    Function(Function),
}

impl Value {
    /// A plain array value.
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::Array(Arc::new(items.into_iter().collect()))
    }

    /// A plain object value.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(_) => "boolean".to_string(),
            Self::Number(_) => "number".to_string(),
            Self::String(_) => "string".to_string(),
            Self::Date(_) => "Date".to_string(),
            Self::Array(_) => "array".to_string(),
            Self::Object(_) => "object".to_string(),
            Self::Observable(observable) if observable.is_list() => "array".to_string(),
            Self::Observable(_) => "object".to_string(),
            Self::Component(component) => component.class_name().to_string(),
            Self::ComponentClass(class) => format!("typeof {}", class.name()),
            Self::Function(_) => "function".to_string(),
        }
    }

    /// Identity/primitive comparison.
    ///
    /// `NaN` is never identical to itself.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Observable(a), Self::Observable(b)) => a.ptr_eq(b),
            (Self::Component(a), Self::Component(b)) => a.ptr_eq(b),
            (Self::ComponentClass(a), Self::ComponentClass(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Whether the value may be wrapped by [`Observable::wrap`].
    pub fn can_be_observed(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_) | Self::Observable(_))
    }

    pub fn is_observable(&self) -> bool {
        matches!(self, Self::Observable(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// The observation capability of this value, if it has one.
    ///
    /// Both observable aggregates and components qualify, so a component
    /// stored inside another value propagates its changes outward.
    pub fn as_observe(&self) -> Option<&dyn Observe> {
        match self {
            Self::Observable(observable) => Some(observable),
            Self::Component(component) => Some(component),
            _ => None,
        }
    }

    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Self::Observable(observable) => Some(observable),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Date(date) => Some(date),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Self::Component(component) => Some(component),
            _ => None,
        }
    }

    pub fn as_component_class(&self) -> Option<&Arc<ComponentClass>> {
        match self {
            Self::ComponentClass(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Elements of a plain or observable list.
    pub fn list_items(&self) -> Option<Vec<Value>> {
        match self {
            Self::Array(items) => Some(items.as_ref().clone()),
            Self::Observable(observable) if observable.is_list() => Some(observable.values()),
            _ => None,
        }
    }

    /// Entries of a plain or observable map.
    pub fn map_entries(&self) -> Option<IndexMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map.as_ref().clone()),
            Self::Observable(observable) => match observable.snapshot() {
                Aggregate::Map(map) => Some(map),
                Aggregate::List(_) => None,
            },
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_identical(other) {
            return true;
        }
        match (self, other) {
            (Self::Component(_), _)
            | (Self::ComponentClass(_), _)
            | (Self::Function(_), _) => false,
            _ => {
                if let (Some(a), Some(b)) = (self.list_items(), other.list_items()) {
                    return a == b;
                }
                if let (Some(a), Some(b)) = (self.map_entries(), other.map_entries()) {
                    return a == b;
                }
                false
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Date(date) => f.debug_tuple("Date").field(date).finish(),
            Self::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Self::Observable(observable) => observable.fmt(f),
            Self::Component(component) => component.fmt(f),
            Self::ComponentClass(class) => write!(f, "ComponentClass({})", class.name()),
            Self::Function(function) => function.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(Arc::new(items))
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self::Object(Arc::new(map))
    }
}

impl From<Observable> for Value {
    fn from(observable: Observable) -> Self {
        Self::Observable(observable)
    }
}

impl From<Component> for Value {
    fn from(component: Component) -> Self {
        Self::Component(component)
    }
}

impl From<Arc<ComponentClass>> for Value {
    fn from(class: Arc<ComponentClass>) -> Self {
        Self::ComponentClass(class)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_compare_by_value() {
        assert!(Value::from(1.0).is_identical(&Value::from(1.0)));
        assert!(Value::from("a").is_identical(&Value::from("a")));
        assert!(!Value::from(1.0).is_identical(&Value::from("1")));
        assert!(!Value::Number(f64::NAN).is_identical(&Value::Number(f64::NAN)));
        assert!(Value::Undefined.is_identical(&Value::Undefined));
        assert!(!Value::Undefined.is_identical(&Value::Null));
    }

    #[test]
    fn aggregates_compare_by_reference() {
        let a = Value::array([Value::from(1.0)]);
        let b = Value::array([Value::from(1.0)]);

        assert!(a.is_identical(&a.clone()));
        assert!(!a.is_identical(&b));
        // Structural equality still holds.
        assert_eq!(a, b);
    }

    #[test]
    fn observable_and_plain_contents_are_equal() {
        let plain = Value::object([("x", Value::from(1.0))]);
        let observable = Value::Observable(Observable::wrap(plain.clone()).unwrap());
        assert_eq!(plain, observable);
    }

    #[test]
    fn dates_are_not_observable() {
        let date = Value::from(Utc::now());
        assert!(!date.can_be_observed());
        assert_eq!(date.type_name(), "Date");
    }
}
