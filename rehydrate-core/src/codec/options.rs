//! Options for a deserialization call.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use super::deferred::Deferred;
use super::deserialize::Deserializer;
use crate::error::Result;
use crate::model::{Attribute, Component, ComponentClass};
use crate::value::Value;

/// Recognizer consulted before the built-in envelope cases.
///
/// Returning `None` declines the object; the next recognizer (and finally the
/// built-in handling) gets a chance. The [`Deserializer`] argument decodes
/// nested values with the same options.
pub type ObjectHandler =
    Arc<dyn Fn(&Map<String, JsonValue>, &Deserializer) -> Option<Deferred<Result<Value>>> + Send + Sync>;

/// Decides whether an incoming attribute value is applied.
pub type AttributeFilter = Arc<dyn Fn(&Component, &Attribute) -> Deferred<bool> + Send + Sync>;

/// Configuration of a deserialization call.
///
/// Options are shared, read-only, by every nested step of the call.
#[derive(Clone, Default)]
pub struct DeserializeOptions {
    pub object_handlers: Vec<ObjectHandler>,
    /// Consulted for function envelopes, only when functions are enabled.
    pub function_handlers: Vec<ObjectHandler>,
    pub known_components: Vec<Arc<ComponentClass>>,
    pub attribute_filter: Option<AttributeFilter>,
    /// Compile `__function` envelopes. Off by default: compiling runs code
    /// supplied by the payload.
    pub deserialize_functions: bool,
}

impl DeserializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_component(mut self, class: Arc<ComponentClass>) -> Self {
        self.known_components.push(class);
        self
    }

    pub fn known_components<I>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = Arc<ComponentClass>>,
    {
        self.known_components.extend(classes);
        self
    }

    pub fn object_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Map<String, JsonValue>, &Deserializer) -> Option<Deferred<Result<Value>>>
            + Send
            + Sync
            + 'static,
    {
        self.object_handlers.push(Arc::new(handler));
        self
    }

    pub fn function_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Map<String, JsonValue>, &Deserializer) -> Option<Deferred<Result<Value>>>
            + Send
            + Sync
            + 'static,
    {
        self.function_handlers.push(Arc::new(handler));
        self
    }

    pub fn attribute_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Component, &Attribute) -> Deferred<bool> + Send + Sync + 'static,
    {
        self.attribute_filter = Some(Arc::new(filter));
        self
    }

    pub fn deserialize_functions(mut self, enabled: bool) -> Self {
        self.deserialize_functions = enabled;
        self
    }
}

impl fmt::Debug for DeserializeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeserializeOptions")
            .field("object_handlers", &self.object_handlers.len())
            .field("function_handlers", &self.function_handlers.len())
            .field(
                "known_components",
                &self
                    .known_components
                    .iter()
                    .map(|class| class.name())
                    .collect::<Vec<_>>(),
            )
            .field("attribute_filter", &self.attribute_filter.is_some())
            .field("deserialize_functions", &self.deserialize_functions)
            .finish()
    }
}
