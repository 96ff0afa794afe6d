//! Name-keyed lookup of the component classes a call may rehydrate.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::component::ComponentClass;
use crate::error::{Error, Result};

/// Component classes known to a deserialization call.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    classes: IndexMap<String, Arc<ComponentClass>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of classes. Later entries win over
    /// earlier ones with the same name.
    pub fn from_known<'a, I>(classes: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<ComponentClass>>,
    {
        let mut registry = Self::new();
        for class in classes {
            registry.register(class.clone());
        }
        registry
    }

    /// Register a class under its own name.
    pub fn register(&mut self, class: Arc<ComponentClass>) {
        let name = class.name().to_string();
        if self.classes.insert(name.clone(), class).is_some() {
            debug!(component = %name, "component registered twice, keeping the latest");
        }
    }

    /// Exact-match lookup.
    pub fn resolve(&self, name: &str) -> Result<Arc<ComponentClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownComponent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
