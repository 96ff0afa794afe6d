//! Typed Attributes
//!
//! An attribute is a named, typed value slot on a component.
//!
//! # Descriptor and slot
//!
//! The [`AttributeDescriptor`] (name, type, default, accessor override) is
//! created once with its class and shared by every instance. Each instance
//! gets its own [`Attribute`]: the value slot, an observer set, and a weak
//! link back to the owning component (the attribute's *parent*).
//!
//! # The write path
//!
//! `set_value` checks the value against the type, wraps plain objects and
//! arrays into observables, stores the value and, if it changed, moves the
//! {attribute, parent} subscriptions from the old value to the new one before
//! firing the attribute's observers and then the parent's.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::trace;

use super::component::{Component, WeakComponent};
use super::types::{TypeIntrospection, ValueType};
use super::validator::FailedValidator;
use crate::error::{Error, Result};
use crate::observe::{Notifier, Observable, Observe};
use crate::value::Value;

type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;
type Getter = Arc<dyn Fn(&Component) -> Value + Send + Sync>;
type Setter = Arc<dyn Fn(&Component, Value) -> Result<()> + Send + Sync>;

/// Getter/setter pair replacing an attribute's storage.
#[derive(Clone)]
pub struct Accessor {
    getter: Getter,
    setter: Option<Setter>,
}

/// Class-level definition of an attribute.
#[derive(Clone)]
pub struct AttributeDescriptor {
    name: String,
    value_type: ValueType,
    default: Option<DefaultFn>,
    accessor: Option<Accessor>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: None,
            accessor: None,
        }
    }

    /// Value assigned when an instance is constructed with `new`.
    pub fn with_default<F>(mut self, default: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(default));
        self
    }

    /// Replace storage with a computed getter.
    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&Component) -> Value + Send + Sync + 'static,
    {
        let setter = self.accessor.take().and_then(|accessor| accessor.setter);
        self.accessor = Some(Accessor {
            getter: Arc::new(getter),
            setter,
        });
        self
    }

    /// Route writes of a getter-backed attribute. Has no effect without a getter.
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&Component, Value) -> Result<()> + Send + Sync + 'static,
    {
        if let Some(accessor) = self.accessor.as_mut() {
            accessor.setter = Some(Arc::new(setter));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn has_getter(&self) -> bool {
        self.accessor.is_some()
    }

    /// The default value, if one is declared.
    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(|default| default())
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type.to_string())
            .field("has_default", &self.default.is_some())
            .field("has_getter", &self.has_getter())
            .finish()
    }
}

/// Outcome of [`Attribute::set_value`].
#[derive(Debug, Clone)]
pub struct AttributeWrite {
    /// `None` if the slot was unset (or the write went through a setter).
    pub previous_value: Option<Value>,
    pub new_value: Value,
}

/// Outcome of [`Attribute::unset_value`].
#[derive(Debug, Clone)]
pub struct AttributeUnset {
    pub previous_value: Value,
}

/// Serializable description of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeIntrospection {
    pub name: String,
    #[serde(flatten)]
    pub value_type: TypeIntrospection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(rename = "hasGetter", skip_serializing_if = "std::ops::Not::not")]
    pub has_getter: bool,
}

struct AttributeInner {
    descriptor: Arc<AttributeDescriptor>,
    slot: RwLock<Option<Value>>,
    notifier: Notifier,
    parent: WeakComponent,
}

/// Per-instance attribute slot.
///
/// Cloning shares the slot.
#[derive(Clone)]
pub struct Attribute {
    inner: Arc<AttributeInner>,
}

impl Attribute {
    pub(crate) fn new(descriptor: Arc<AttributeDescriptor>, parent: WeakComponent) -> Self {
        Self {
            inner: Arc::new(AttributeInner {
                descriptor,
                slot: RwLock::new(None),
                notifier: Notifier::new(),
                parent,
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.descriptor.name()
    }

    pub fn descriptor(&self) -> &AttributeDescriptor {
        &self.inner.descriptor
    }

    pub fn value_type(&self) -> &ValueType {
        self.inner.descriptor.value_type()
    }

    /// The owning component, if it is still alive.
    pub fn parent(&self) -> Option<Component> {
        self.inner.parent.upgrade()
    }

    /// Whether the slot holds a value. Getter-backed attributes are always set.
    pub fn is_set(&self) -> bool {
        self.inner.descriptor.has_getter() || self.inner.slot.read().is_some()
    }

    /// The current value, or `None` when unset.
    pub fn value(&self) -> Option<Value> {
        if let Some(accessor) = &self.inner.descriptor.accessor {
            return self.parent().map(|parent| (accessor.getter)(&parent));
        }
        self.inner.slot.read().clone()
    }

    /// Assign a value.
    ///
    /// Fails before any mutation if the type rejects the value.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<AttributeWrite> {
        let value = value.into();
        let descriptor = &self.inner.descriptor;
        descriptor.value_type().check_value(&value, descriptor.name())?;

        if let Some(accessor) = &descriptor.accessor {
            let setter = accessor
                .setter
                .as_ref()
                .ok_or_else(|| Error::MissingSetter(descriptor.name().to_string()))?;
            let parent = self
                .parent()
                .ok_or_else(|| Error::DetachedAttribute(descriptor.name().to_string()))?;
            setter(&parent, value.clone())?;
            return Ok(AttributeWrite {
                previous_value: None,
                new_value: value,
            });
        }

        let value = if value.can_be_observed() && !value.is_observable() {
            Value::Observable(Observable::wrap(value)?)
        } else {
            value
        };

        let previous = self.inner.slot.write().replace(value.clone());
        let previous_value = previous.clone().unwrap_or_default();

        if !value.is_identical(&previous_value) {
            trace!(attribute = %self.name(), "attribute value changed");
            let parent = self.parent();
            self.unsubscribe_from(&previous_value, parent.as_ref())?;
            self.subscribe_to(&value, parent.as_ref())?;

            self.notify()?;
            if let Some(parent) = &parent {
                parent.notify()?;
            }
        }

        Ok(AttributeWrite {
            previous_value: previous,
            new_value: value,
        })
    }

    /// Clear the slot. Returns `None` if it was already unset.
    pub fn unset_value(&self) -> Result<Option<AttributeUnset>> {
        let Some(previous_value) = self.inner.slot.write().take() else {
            return Ok(None);
        };

        let parent = self.parent();
        self.unsubscribe_from(&previous_value, parent.as_ref())?;

        self.notify()?;
        if let Some(parent) = &parent {
            parent.notify()?;
        }

        Ok(Some(AttributeUnset { previous_value }))
    }

    fn subscribe_to(&self, value: &Value, parent: Option<&Component>) -> Result<()> {
        if let Some(target) = value.as_observe() {
            target.observe(self.as_observer())?;
            if let Some(parent) = parent {
                target.observe(parent.as_observer())?;
            }
        }
        Ok(())
    }

    fn unsubscribe_from(&self, value: &Value, parent: Option<&Component>) -> Result<()> {
        if let Some(target) = value.as_observe() {
            target.unobserve(&self.as_observer())?;
            if let Some(parent) = parent {
                target.unobserve(&parent.as_observer())?;
            }
        }
        Ok(())
    }

    /// Run every validator against the current value.
    pub fn run_validators(&self) -> Result<Vec<FailedValidator>> {
        let value = self
            .value()
            .ok_or_else(|| Error::UnsetAttribute(self.name().to_string()))?;
        Ok(self.value_type().run_validators(&value))
    }

    /// Fail with [`Error::Validation`] if any validator rejects the value.
    pub fn validate(&self) -> Result<()> {
        let failures = self.run_validators()?;
        if failures.is_empty() {
            return Ok(());
        }

        let details = failures
            .iter()
            .map(|failure| format!("{} (path: '{}')", failure.validator.message(), failure.path))
            .collect::<Vec<_>>()
            .join(", ");

        Err(Error::Validation {
            attribute: self.name().to_string(),
            details,
            failures,
        })
    }

    pub fn is_valid(&self) -> Result<bool> {
        Ok(self.run_validators()?.is_empty())
    }

    pub fn introspect(&self) -> AttributeIntrospection {
        let descriptor = &self.inner.descriptor;
        AttributeIntrospection {
            name: descriptor.name().to_string(),
            value_type: descriptor.value_type().introspect(),
            default: descriptor
                .default_value()
                .map(|value| crate::codec::serialize(&value)),
            has_getter: descriptor.has_getter(),
        }
    }

    pub fn ptr_eq(&self, other: &Attribute) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Observe for Attribute {
    fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name())
            .field("value", &*self.inner.slot.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComponentClass, Validator};
    use crate::observe::Observer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn movie_class() -> Arc<ComponentClass> {
        ComponentClass::builder("Movie")
            .attribute(AttributeDescriptor::new(
                "title",
                ValueType::string().with_validator(Validator::not_empty()),
            ))
            .attribute(AttributeDescriptor::new("tags", ValueType::array(ValueType::string())))
            .attribute(AttributeDescriptor::new("metadata", ValueType::object().optional()))
            .build()
    }

    fn count_notifications(target: &impl Observe) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        target
            .observe(Observer::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        count
    }

    #[test]
    fn unequal_write_fires_attribute_and_parent_once() {
        let movie = movie_class().instantiate().unwrap();
        let title = movie.attribute("title").unwrap();
        let attribute_count = count_notifications(&title);
        let parent_count = count_notifications(&movie);

        title.set_value("Inception").unwrap();
        assert_eq!(attribute_count.load(Ordering::SeqCst), 1);
        assert_eq!(parent_count.load(Ordering::SeqCst), 1);

        let write = title.set_value("Inception").unwrap();
        assert_eq!(attribute_count.load(Ordering::SeqCst), 1);
        assert_eq!(parent_count.load(Ordering::SeqCst), 1);
        assert_eq!(write.previous_value, Some(Value::from("Inception")));
    }

    #[test]
    fn rejected_value_leaves_slot_untouched() {
        let movie = movie_class().instantiate().unwrap();
        let title = movie.attribute("title").unwrap();

        let err = title.set_value(42.0).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(!title.is_set());
    }

    #[test]
    fn aggregates_are_wrapped_on_write() {
        let movie = movie_class().instantiate().unwrap();
        let tags = movie.attribute("tags").unwrap();

        let write = tags.set_value(Value::array([Value::from("drama")])).unwrap();
        let observable = write.new_value.as_observable().unwrap().clone();
        assert_eq!(observable.observer_count(), 2);

        let attribute_count = count_notifications(&tags);
        let parent_count = count_notifications(&movie);
        observable.push("thriller").unwrap();
        assert_eq!(attribute_count.load(Ordering::SeqCst), 1);
        assert_eq!(parent_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn only_latest_value_stays_subscribed() {
        let movie = movie_class().instantiate().unwrap();
        let tags = movie.attribute("tags").unwrap();

        let values: Vec<Observable> = (0..3)
            .map(|_| Observable::list(Vec::new()).unwrap())
            .collect();
        for value in &values {
            tags.set_value(Value::Observable(value.clone())).unwrap();
        }

        assert_eq!(values[0].observer_count(), 0);
        assert_eq!(values[1].observer_count(), 0);
        assert_eq!(values[2].observer_count(), 2);
        assert_eq!(values[2].notifier().count_of(&tags.as_observer()), 1);
        assert_eq!(values[2].notifier().count_of(&movie.as_observer()), 1);
    }

    #[test]
    fn same_observable_twice_is_not_a_change() {
        let movie = movie_class().instantiate().unwrap();
        let tags = movie.attribute("tags").unwrap();
        let list = Observable::list(Vec::new()).unwrap();

        tags.set_value(Value::Observable(list.clone())).unwrap();
        let count = count_notifications(&tags);
        tags.set_value(Value::Observable(list.clone())).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(list.observer_count(), 2);
    }

    #[test]
    fn unset_detaches_and_notifies() {
        let movie = movie_class().instantiate().unwrap();
        let metadata = movie.attribute("metadata").unwrap();
        assert!(metadata.unset_value().unwrap().is_none());

        let write = metadata
            .set_value(Value::object([("year", Value::from(2010.0))]))
            .unwrap();
        let observable = write.new_value.as_observable().unwrap().clone();
        let count = count_notifications(&movie);

        let unset = metadata.unset_value().unwrap().unwrap();
        assert!(unset.previous_value.is_identical(&write.new_value));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(observable.observer_count(), 0);
        assert!(!metadata.is_set());
    }

    #[test]
    fn validate_lists_failures() {
        let movie = movie_class().instantiate().unwrap();
        let title = movie.attribute("title").unwrap();

        assert!(matches!(title.validate(), Err(Error::UnsetAttribute(_))));

        title.set_value("").unwrap();
        let err = title.validate().unwrap_err();
        assert_eq!(err.failed_validators().len(), 1);
        assert!(err.to_string().contains("notEmpty"));
        assert!(!title.is_valid().unwrap());

        title.set_value("Inception").unwrap();
        assert!(title.validate().is_ok());
    }

    #[test]
    fn getter_override_bypasses_storage() {
        let class = ComponentClass::builder("Person")
            .attribute(AttributeDescriptor::new("name", ValueType::string()))
            .attribute(
                AttributeDescriptor::new("shout", ValueType::string())
                    .with_getter(|person| match person.get("name") {
                        Some(Value::String(name)) => Value::from(name.to_uppercase()),
                        _ => Value::Undefined,
                    })
                    .with_setter(|person, value| person.set("name", value).map(|_| ())),
            )
            .attribute(
                AttributeDescriptor::new("readonly", ValueType::string())
                    .with_getter(|_| Value::from("fixed")),
            )
            .build();

        let person = class.instantiate().unwrap();
        let shout = person.attribute("shout").unwrap();
        let shout_count = count_notifications(&shout);

        let write = shout.set_value("ada").unwrap();
        assert!(write.previous_value.is_none());
        assert_eq!(shout.value(), Some(Value::from("ADA")));
        assert_eq!(shout_count.load(Ordering::SeqCst), 0);

        let readonly = person.attribute("readonly").unwrap();
        assert!(matches!(readonly.set_value("x"), Err(Error::MissingSetter(_))));
    }

    #[test]
    fn introspection_merges_type() {
        let movie = movie_class().instantiate().unwrap();
        let introspection = movie.attribute("title").unwrap().introspect();
        let json = serde_json::to_value(&introspection).unwrap();

        assert_eq!(json["name"], "title");
        assert_eq!(json["valueType"], "string");
        assert_eq!(json["validators"][0]["name"], "notEmpty");
    }
}
