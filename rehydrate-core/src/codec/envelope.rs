//! Envelope classification by marker keys.

use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};

/// Names a component class; the envelope denotes the class itself.
pub const COMPONENT_CLASS_KEY: &str = "__Component";
/// Names a component class; the envelope denotes an instance.
pub const COMPONENT_KEY: &str = "__component";
/// `true` selects the `new` construction path.
pub const NEW_KEY: &str = "__new";
/// Function source code.
pub const FUNCTION_KEY: &str = "__function";
/// Free variables of a function envelope.
pub const CONTEXT_KEY: &str = "__context";
/// `{"__undefined": true}` encodes `undefined`.
pub const UNDEFINED_KEY: &str = "__undefined";
/// `{"__date": "<RFC 3339>"}` encodes a date.
pub const DATE_KEY: &str = "__date";

/// What a serialized object stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    ComponentClass(String),
    ComponentInstance { name: String, construct: bool },
    Function(String),
    Plain,
}

impl Envelope {
    /// Inspect the marker keys of `object`.
    ///
    /// The class marker takes precedence over the instance marker, and both
    /// over the function marker. A `null` or empty component name leaves the
    /// object plain.
    pub fn classify(object: &Map<String, JsonValue>) -> Result<Self> {
        let component = match object.get(COMPONENT_CLASS_KEY) {
            Some(marker) if !marker.is_null() => Some((marker_string(COMPONENT_CLASS_KEY, marker)?, true)),
            _ => match object.get(COMPONENT_KEY) {
                Some(marker) if !marker.is_null() => Some((marker_string(COMPONENT_KEY, marker)?, false)),
                _ => None,
            },
        };

        if let Some((name, is_class)) = component {
            if name.is_empty() {
                return Ok(Self::Plain);
            }
            return Ok(if is_class {
                Self::ComponentClass(name.to_string())
            } else {
                Self::ComponentInstance {
                    name: name.to_string(),
                    construct: object.get(NEW_KEY) == Some(&JsonValue::Bool(true)),
                }
            });
        }

        match object.get(FUNCTION_KEY) {
            Some(source) if !source.is_null() => {
                Ok(Self::Function(marker_string(FUNCTION_KEY, source)?.to_string()))
            }
            _ => Ok(Self::Plain),
        }
    }
}

/// Keys that never reach attribute storage.
pub fn is_component_marker(key: &str) -> bool {
    matches!(key, COMPONENT_CLASS_KEY | COMPONENT_KEY | NEW_KEY)
}

fn marker_string<'a>(key: &str, marker: &'a JsonValue) -> Result<&'a str> {
    marker
        .as_str()
        .ok_or_else(|| Error::InvalidEnvelope(format!("'{key}' must be a string (got {marker})")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(value: JsonValue) -> Result<Envelope> {
        match value {
            JsonValue::Object(object) => Envelope::classify(&object),
            _ => unreachable!("test inputs are objects"),
        }
    }

    #[test]
    fn markers() {
        assert_eq!(
            classify(json!({"__Component": "Movie"})).unwrap(),
            Envelope::ComponentClass("Movie".into())
        );
        assert_eq!(
            classify(json!({"__component": "Movie", "title": "Inception"})).unwrap(),
            Envelope::ComponentInstance {
                name: "Movie".into(),
                construct: false
            }
        );
        assert_eq!(
            classify(json!({"__component": "Movie", "__new": true})).unwrap(),
            Envelope::ComponentInstance {
                name: "Movie".into(),
                construct: true
            }
        );
        assert_eq!(
            classify(json!({"__function": "() => 1"})).unwrap(),
            Envelope::Function("() => 1".into())
        );
        assert_eq!(classify(json!({"title": "x"})).unwrap(), Envelope::Plain);
    }

    #[test]
    fn class_marker_wins() {
        assert_eq!(
            classify(json!({"__component": "A", "__Component": "B"})).unwrap(),
            Envelope::ComponentClass("B".into())
        );
    }

    #[test]
    fn empty_or_null_names_are_plain() {
        assert_eq!(classify(json!({"__component": ""})).unwrap(), Envelope::Plain);
        assert_eq!(classify(json!({"__component": null})).unwrap(), Envelope::Plain);
    }

    #[test]
    fn non_string_markers_are_rejected() {
        assert!(matches!(
            classify(json!({"__component": 42})),
            Err(Error::InvalidEnvelope(_))
        ));
        assert!(matches!(
            classify(json!({"__function": ["x"]})),
            Err(Error::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn marker_keys() {
        assert!(is_component_marker("__new"));
        assert!(!is_component_marker("title"));
        assert!(!is_component_marker(CONTEXT_KEY));
    }
}
