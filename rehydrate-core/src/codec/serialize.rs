//! Encoding values back into the envelope format.

use chrono::SecondsFormat;
use serde_json::{json, Map, Value as JsonValue};

use super::envelope::{
    COMPONENT_CLASS_KEY, COMPONENT_KEY, CONTEXT_KEY, DATE_KEY, FUNCTION_KEY, UNDEFINED_KEY,
};
use crate::observe::Aggregate;
use crate::value::Value;

/// Encode `value` as a serialized tree.
///
/// Components carry their set attributes in declaration order. Attributes
/// backed by a getter are computed, so they are left out. Non-finite numbers
/// become `null`.
pub fn serialize(value: &Value) -> JsonValue {
    match value {
        Value::Undefined => json!({ UNDEFINED_KEY: true }),
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => serialize_number(*n),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Date(date) => json!({ DATE_KEY: date.to_rfc3339_opts(SecondsFormat::Millis, true) }),
        Value::Array(items) => JsonValue::Array(items.iter().map(serialize).collect()),
        Value::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), serialize(value)))
                .collect(),
        ),
        Value::Observable(observable) => match observable.snapshot() {
            Aggregate::List(items) => JsonValue::Array(items.iter().map(serialize).collect()),
            Aggregate::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), serialize(value)))
                    .collect(),
            ),
        },
        Value::Component(component) => {
            let mut object = Map::new();
            object.insert(COMPONENT_KEY.to_string(), component.class_name().into());
            for attribute in component.attributes() {
                if attribute.descriptor().has_getter() {
                    continue;
                }
                if let Some(value) = attribute.value() {
                    object.insert(attribute.name().to_string(), serialize(&value));
                }
            }
            JsonValue::Object(object)
        }
        Value::ComponentClass(class) => json!({ COMPONENT_CLASS_KEY: class.name() }),
        Value::Function(function) => {
            let mut object = Map::new();
            object.insert(FUNCTION_KEY.to_string(), function.source().into());
            if !function.context().is_empty() {
                let context = function
                    .context()
                    .iter()
                    .map(|(key, value)| (key.clone(), serialize(value)))
                    .collect();
                object.insert(CONTEXT_KEY.to_string(), JsonValue::Object(context));
            }
            for (key, value) in function.properties() {
                object.insert(key, serialize(&value));
            }
            JsonValue::Object(object)
        }
    }
}

/// Integral numbers are written as integers so that `1` survives a
/// round-trip unchanged. Negative zero stays a float to keep its sign.
fn serialize_number(n: f64) -> JsonValue {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    let negative_zero = n == 0.0 && n.is_sign_negative();
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER && !negative_zero {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
    }
}
