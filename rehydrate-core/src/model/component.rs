//! Components
//!
//! A [`ComponentClass`] is a named set of attribute descriptors. A
//! [`Component`] is an instance of a class: one [`Attribute`] slot per
//! descriptor, plus its own observer set, which is notified whenever any of
//! its attributes (or a value nested in one) changes.
//!
//! # Construction
//!
//! There are two ways to obtain an instance:
//!
//! - [`ComponentClass::construct`] is the `new` path. Attribute defaults are
//!   applied.
//! - [`ComponentClass::instantiate`] is the factory path. Every attribute
//!   starts unset, unless the class installs its own factory. This is the path
//!   used to rehydrate existing data.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use super::attribute::{Attribute, AttributeDescriptor, AttributeWrite};
use crate::error::{Error, Result};
use crate::observe::{Notifier, Observe};
use crate::value::Value;

type Factory = Arc<dyn Fn(&Arc<ComponentClass>) -> Result<Component> + Send + Sync>;

/// A named component definition.
pub struct ComponentClass {
    name: String,
    attributes: IndexMap<String, Arc<AttributeDescriptor>>,
    factory: Option<Factory>,
}

impl ComponentClass {
    pub fn builder(name: impl Into<String>) -> ComponentClassBuilder {
        ComponentClassBuilder {
            name: name.into(),
            attributes: IndexMap::new(),
            factory: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute descriptors in declaration order.
    pub fn attribute_descriptors(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values().map(|descriptor| descriptor.as_ref())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Create an instance through the factory path.
    pub fn instantiate(self: &Arc<Self>) -> Result<Component> {
        match &self.factory {
            Some(factory) => factory(self),
            None => Ok(Component::blank(self)),
        }
    }

    /// Create an instance through the `new` path, applying defaults.
    pub fn construct(self: &Arc<Self>) -> Result<Component> {
        let component = Component::blank(self);
        for attribute in component.attributes() {
            if let Some(default) = attribute.descriptor().default_value() {
                attribute.set_value(default)?;
            }
        }
        Ok(component)
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`ComponentClass`].
pub struct ComponentClassBuilder {
    name: String,
    attributes: IndexMap<String, Arc<AttributeDescriptor>>,
    factory: Option<Factory>,
}

impl ComponentClassBuilder {
    /// Declare an attribute. A later declaration with the same name replaces
    /// the earlier one.
    pub fn attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.attributes
            .insert(descriptor.name().to_string(), Arc::new(descriptor));
        self
    }

    /// Replace the default factory used by [`ComponentClass::instantiate`].
    ///
    /// Factories typically start from [`Component::blank`].
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Arc<ComponentClass>) -> Result<Component> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Arc<ComponentClass> {
        Arc::new(ComponentClass {
            name: self.name,
            attributes: self.attributes,
            factory: self.factory,
        })
    }
}

struct ComponentInner {
    class: Arc<ComponentClass>,
    attributes: IndexMap<String, Attribute>,
    notifier: Notifier,
}

/// An instance of a [`ComponentClass`].
///
/// Cloning shares the instance.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl Component {
    /// An instance with every attribute unset.
    pub fn blank(class: &Arc<ComponentClass>) -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let attributes = class
                .attributes
                .iter()
                .map(|(name, descriptor)| {
                    let parent = WeakComponent(weak.clone());
                    (name.clone(), Attribute::new(descriptor.clone(), parent))
                })
                .collect();

            ComponentInner {
                class: class.clone(),
                attributes,
                notifier: Notifier::new(),
            }
        });
        Self { inner }
    }

    pub fn class(&self) -> &Arc<ComponentClass> {
        &self.inner.class
    }

    pub fn class_name(&self) -> &str {
        self.inner.class.name()
    }

    /// Look up an attribute, returning `None` if the class does not declare it.
    pub fn get_attribute(&self, name: &str) -> Option<Attribute> {
        self.inner.attributes.get(name).cloned()
    }

    /// Look up an attribute, failing if the class does not declare it.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        self.get_attribute(name).ok_or_else(|| Error::UnknownAttribute {
            component: self.class_name().to_string(),
            attribute: name.to_string(),
        })
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.inner.attributes.values()
    }

    /// Current value of an attribute, `None` if unknown or unset.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_attribute(name).and_then(|attribute| attribute.value())
    }

    /// Assign an attribute.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<AttributeWrite> {
        self.attribute(name)?.set_value(value)
    }

    /// Validate every attribute.
    pub fn validate(&self) -> Result<()> {
        self.attributes().try_for_each(Attribute::validate)
    }

    pub fn is_valid(&self) -> Result<bool> {
        for attribute in self.attributes() {
            if !attribute.is_valid()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Observe for Component {
    fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = self
            .attributes()
            .filter(|attribute| attribute.is_set())
            .map(Attribute::name)
            .collect();
        f.debug_struct("Component")
            .field("class", &self.class_name())
            .field("set_attributes", &set)
            .finish()
    }
}

/// Non-owning reference to a [`Component`], held by its attributes.
#[derive(Clone)]
pub struct WeakComponent(Weak<ComponentInner>);

impl WeakComponent {
    pub fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(|inner| Component { inner })
    }
}

impl fmt::Debug for WeakComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakComponent")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;

    fn counter_class() -> Arc<ComponentClass> {
        ComponentClass::builder("Counter")
            .attribute(
                AttributeDescriptor::new("count", ValueType::number())
                    .with_default(|| Value::from(0.0)),
            )
            .attribute(AttributeDescriptor::new("label", ValueType::string().optional()))
            .build()
    }

    #[test]
    fn construct_applies_defaults() {
        let counter = counter_class().construct().unwrap();
        assert_eq!(counter.get("count"), Some(Value::from(0.0)));
        assert!(counter.get("label").is_none());
    }

    #[test]
    fn instantiate_leaves_attributes_unset() {
        let counter = counter_class().instantiate().unwrap();
        assert!(counter.attributes().all(|attribute| !attribute.is_set()));
    }

    #[test]
    fn custom_factory_is_used_by_instantiate() {
        let class = ComponentClass::builder("Tagged")
            .attribute(AttributeDescriptor::new("tag", ValueType::string()))
            .factory(|class| {
                let component = Component::blank(class);
                component.set("tag", "from-factory")?;
                Ok(component)
            })
            .build();

        let tagged = class.instantiate().unwrap();
        assert_eq!(tagged.get("tag"), Some(Value::from("from-factory")));
    }

    #[test]
    fn unknown_attribute_lookup() {
        let counter = counter_class().instantiate().unwrap();
        assert!(counter.get_attribute("missing").is_none());
        assert!(matches!(
            counter.attribute("missing"),
            Err(Error::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn attributes_point_back_to_parent() {
        let counter = counter_class().instantiate().unwrap();
        let count = counter.attribute("count").unwrap();
        assert!(count.parent().unwrap().ptr_eq(&counter));
    }

    #[test]
    fn validate_requires_every_attribute_set() {
        let counter = counter_class().construct().unwrap();
        assert!(matches!(counter.validate(), Err(Error::UnsetAttribute(_))));

        counter.set("label", "clicks").unwrap();
        assert!(counter.validate().is_ok());
        assert!(counter.is_valid().unwrap());
    }
}
