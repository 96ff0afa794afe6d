//! The Deserialization Pipeline
//!
//! Walks a serialized tree and rebuilds live values from it.
//!
//! # How It Works
//!
//! 1. Scalars and arrays decode structurally.
//! 2. Objects are offered to the caller's object handlers, in order. The
//!    first one to return `Some` decides the value.
//! 3. Otherwise the marker keys classify the object: a component class, a
//!    component instance, a function (when enabled) or plain data.
//! 4. Component instances are created through the registry, then every
//!    payload key is matched to an attribute, filtered, decoded and assigned
//!    in payload order. The first error aborts the remaining keys.
//!
//! The walk is a single future. [`Deserializer::deserialize`] polls it once
//! and returns [`Deferred::Ready`] when no hook had to wait.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, trace};

use super::deferred::Deferred;
use super::envelope::{
    is_component_marker, Envelope, CONTEXT_KEY, DATE_KEY, FUNCTION_KEY, UNDEFINED_KEY,
};
use super::options::DeserializeOptions;
use crate::error::{Error, Result};
use crate::function;
use crate::model::ComponentRegistry;
use crate::value::Value;

struct DeserializerInner {
    options: DeserializeOptions,
    registry: ComponentRegistry,
}

/// Rehydrates serialized trees with a fixed set of options.
///
/// Cloning is cheap; clones share options and registry.
#[derive(Clone)]
pub struct Deserializer {
    inner: Arc<DeserializerInner>,
}

impl Deserializer {
    pub fn new(options: DeserializeOptions) -> Self {
        let registry = ComponentRegistry::from_known(&options.known_components);
        Self {
            inner: Arc::new(DeserializerInner { options, registry }),
        }
    }

    pub fn options(&self) -> &DeserializeOptions {
        &self.inner.options
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    /// Rehydrate a JSON value.
    pub fn deserialize(&self, value: JsonValue) -> Deferred<Result<Value>> {
        Deferred::settle(self.decode(value))
    }

    /// Parse and rehydrate JSON text.
    pub fn deserialize_json(&self, text: &str) -> Deferred<Result<Value>> {
        match serde_json::from_str(text) {
            Ok(value) => self.deserialize(value),
            Err(err) => Deferred::Ready(Err(err.into())),
        }
    }

    /// Parse and rehydrate MessagePack bytes.
    pub fn deserialize_msgpack(&self, bytes: &[u8]) -> Deferred<Result<Value>> {
        match rmp_serde::from_slice(bytes) {
            Ok(value) => self.deserialize(value),
            Err(err) => Deferred::Ready(Err(err.into())),
        }
    }

    /// Decode a nested value with this deserializer's options.
    ///
    /// Object handlers use this to decode the values they wrap.
    pub fn decode(&self, value: JsonValue) -> BoxFuture<'static, Result<Value>> {
        let this = self.clone();
        async move {
            match value {
                JsonValue::Null => Ok(Value::Null),
                JsonValue::Bool(b) => Ok(Value::Bool(b)),
                JsonValue::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or(f64::NAN))),
                JsonValue::String(s) => Ok(Value::String(s)),
                JsonValue::Array(items) => {
                    let mut decoded = Vec::with_capacity(items.len());
                    for item in items {
                        decoded.push(this.decode(item).await?);
                    }
                    Ok(Value::array(decoded))
                }
                JsonValue::Object(object) => this.decode_object(object).await,
            }
        }
        .boxed()
    }

    async fn decode_object(&self, object: Map<String, JsonValue>) -> Result<Value> {
        for handler in &self.inner.options.object_handlers {
            if let Some(deferred) = handler(&object, self) {
                return deferred.await;
            }
        }

        match Envelope::classify(&object)? {
            Envelope::ComponentClass(name) => {
                let class = self.inner.registry.resolve(&name)?;
                debug!(component = %name, "resolved component class");
                Ok(Value::ComponentClass(class))
            }
            Envelope::ComponentInstance { name, construct } => {
                self.decode_component(&name, construct, object).await
            }
            Envelope::Function(source) if self.inner.options.deserialize_functions => {
                for handler in &self.inner.options.function_handlers {
                    if let Some(deferred) = handler(&object, self) {
                        return deferred.await;
                    }
                }
                self.decode_function(&source, object).await
            }
            Envelope::Function(_) | Envelope::Plain => self.decode_plain(object).await,
        }
    }

    async fn decode_component(
        &self,
        name: &str,
        construct: bool,
        object: Map<String, JsonValue>,
    ) -> Result<Value> {
        let class = self.inner.registry.resolve(name)?;
        let component = if construct {
            class.construct()?
        } else {
            class.instantiate()?
        };
        debug!(component = %name, construct, "rehydrating component");

        for (key, serialized) in object {
            if is_component_marker(&key) {
                continue;
            }

            let Some(attribute) = component.get_attribute(&key) else {
                trace!(component = %name, attribute = %key, "skipping unknown attribute");
                continue;
            };

            if let Some(filter) = &self.inner.options.attribute_filter {
                if !filter(&component, &attribute).await {
                    trace!(component = %name, attribute = %key, "attribute filtered out");
                    continue;
                }
            }

            let value = self.decode(serialized).await?;
            attribute.set_value(value)?;
            trace!(component = %name, attribute = %key, "attribute assigned");
        }

        Ok(Value::Component(component))
    }

    async fn decode_function(&self, source: &str, object: Map<String, JsonValue>) -> Result<Value> {
        let mut context = None;
        let mut properties = IndexMap::new();

        for (key, serialized) in object {
            match key.as_str() {
                FUNCTION_KEY => {}
                CONTEXT_KEY => {
                    context = match self.decode(serialized).await? {
                        Value::Undefined | Value::Null => None,
                        value => Some(value.map_entries().ok_or_else(|| {
                            Error::InvalidEnvelope(format!(
                                "'{CONTEXT_KEY}' must be an object (got {})",
                                value.type_name()
                            ))
                        })?),
                    };
                }
                _ => {
                    let value = self.decode(serialized).await?;
                    properties.insert(key, value);
                }
            }
        }

        let function = function::compile(source, context)?;
        for (key, value) in properties {
            function.set_property(key, value);
        }
        Ok(Value::Function(function))
    }

    async fn decode_plain(&self, object: Map<String, JsonValue>) -> Result<Value> {
        if object.len() == 1 {
            if object.get(UNDEFINED_KEY) == Some(&JsonValue::Bool(true)) {
                return Ok(Value::Undefined);
            }
            if let Some(date) = object.get(DATE_KEY) {
                return decode_date(date);
            }
        }

        let mut map = IndexMap::with_capacity(object.len());
        for (key, serialized) in object {
            let value = self.decode(serialized).await?;
            map.insert(key, value);
        }
        Ok(Value::from(map))
    }
}

impl std::fmt::Debug for Deserializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deserializer")
            .field("options", &self.inner.options)
            .finish()
    }
}

fn decode_date(date: &JsonValue) -> Result<Value> {
    let text = date
        .as_str()
        .ok_or_else(|| Error::InvalidEnvelope(format!("'{DATE_KEY}' must be a string (got {date})")))?;
    let parsed = DateTime::parse_from_rfc3339(text)
        .map_err(|err| Error::InvalidEnvelope(format!("invalid date '{text}': {err}")))?;
    Ok(Value::Date(parsed.with_timezone(&Utc)))
}

/// Rehydrate `value` with `options`.
pub fn deserialize(value: JsonValue, options: DeserializeOptions) -> Deferred<Result<Value>> {
    Deserializer::new(options).deserialize(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDescriptor, ComponentClass, ValueType};
    use serde_json::json;

    fn movie_options() -> DeserializeOptions {
        let movie = ComponentClass::builder("Movie")
            .attribute(AttributeDescriptor::new("title", ValueType::string()))
            .attribute(AttributeDescriptor::new("year", ValueType::number().optional()))
            .build();
        DeserializeOptions::new().known_component(movie)
    }

    fn ready(deferred: Deferred<Result<Value>>) -> Result<Value> {
        deferred.ready().expect("synchronous hooks complete immediately")
    }

    #[test]
    fn scalars_and_arrays() {
        let value = ready(deserialize(json!([1, "a", true, null]), DeserializeOptions::new())).unwrap();
        assert_eq!(
            value,
            Value::array([Value::from(1.0), Value::from("a"), Value::Bool(true), Value::Null])
        );
    }

    #[test]
    fn tagged_scalars() {
        let value = ready(deserialize(
            json!({"missing": {"__undefined": true}, "at": {"__date": "2020-01-02T03:04:05.000Z"}}),
            DeserializeOptions::new(),
        ))
        .unwrap();
        let map = value.map_entries().unwrap();
        assert!(map["missing"].is_undefined());
        assert_eq!(map["at"].as_date().unwrap().timestamp(), 1_577_934_245);

        let err = ready(deserialize(json!({"__date": "yesterday"}), DeserializeOptions::new()));
        assert!(matches!(err, Err(Error::InvalidEnvelope(_))));
    }

    #[test]
    fn plain_objects_keep_key_order() {
        let value = ready(deserialize(json!({"b": 1, "a": 2}), DeserializeOptions::new())).unwrap();
        let keys: Vec<String> = value.map_entries().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn component_instance() {
        let value = ready(deserialize(
            json!({"__component": "Movie", "title": "Inception", "year": 2010}),
            movie_options(),
        ))
        .unwrap();
        let movie = value.as_component().unwrap();
        assert_eq!(movie.class_name(), "Movie");
        assert_eq!(movie.get("title"), Some(Value::from("Inception")));
        assert_eq!(movie.get("year"), Some(Value::from(2010.0)));
    }

    #[test]
    fn component_class() {
        let value = ready(deserialize(json!({"__Component": "Movie", "ignored": 1}), movie_options())).unwrap();
        assert_eq!(value.as_component_class().unwrap().name(), "Movie");
    }

    #[test]
    fn functions_are_plain_data_unless_enabled() {
        let payload = json!({"__function": "(x) => x"});
        let value = ready(deserialize(payload.clone(), DeserializeOptions::new())).unwrap();
        assert_eq!(
            value.map_entries().unwrap()["__function"],
            Value::from("(x) => x")
        );

        let value = ready(deserialize(payload, DeserializeOptions::new().deserialize_functions(true))).unwrap();
        assert!(value.as_function().is_some());
    }

    #[test]
    fn function_properties_and_context() {
        let value = ready(deserialize(
            json!({"__function": "(x) => x * factor", "__context": {"factor": 3}, "displayName": "triple"}),
            DeserializeOptions::new().deserialize_functions(true),
        ))
        .unwrap();
        let triple = value.as_function().unwrap();
        assert_eq!(triple.call(&[Value::from(2.0)]).unwrap(), Value::from(6.0));
        assert_eq!(triple.property("displayName"), Some(Value::from("triple")));
        assert!(triple.property(CONTEXT_KEY).is_none());

        let err = ready(deserialize(
            json!({"__function": "() => 1", "__context": [1]}),
            DeserializeOptions::new().deserialize_functions(true),
        ));
        assert!(matches!(err, Err(Error::InvalidEnvelope(_))));
    }

    #[test]
    fn object_handlers_run_first() {
        let options = movie_options().object_handler(|object, _| {
            object
                .contains_key("$ref")
                .then(|| Deferred::Ready(Ok(Value::from("resolved"))))
        });

        let value = ready(deserialize(json!([{"$ref": 1}, {"a": 1}]), options)).unwrap();
        let items = value.list_items().unwrap();
        assert_eq!(items[0], Value::from("resolved"));
        assert!(items[1].map_entries().is_some());
    }

    #[test]
    fn handlers_can_decode_nested_values() {
        let options = DeserializeOptions::new().object_handler(|object, deserializer| {
            let wrapped = object.get("$wrapped")?.clone();
            let nested = deserializer.decode(wrapped);
            Some(Deferred::pending(nested))
        });

        let value = ready(deserialize(json!({"$wrapped": {"__undefined": true}}), options)).unwrap();
        assert!(value.is_undefined());
    }

    #[test]
    fn input_formats() {
        let deserializer = Deserializer::new(movie_options());
        let value = ready(deserializer.deserialize_json(r#"{"__component": "Movie", "title": "Up"}"#)).unwrap();
        assert_eq!(value.as_component().unwrap().get("title"), Some(Value::from("Up")));

        let bytes = rmp_serde::to_vec_named(&json!({"__component": "Movie", "title": "Up"})).unwrap();
        let value = ready(deserializer.deserialize_msgpack(&bytes)).unwrap();
        assert_eq!(value.as_component().unwrap().get("title"), Some(Value::from("Up")));

        assert!(matches!(ready(deserializer.deserialize_json("{")), Err(Error::Json(_))));
        assert!(matches!(
            ready(deserializer.deserialize_msgpack(&[0xc1])),
            Err(Error::MessagePack(_))
        ));
    }
}
