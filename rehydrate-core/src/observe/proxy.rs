//! Observable Values
//!
//! An [`Observable`] wraps a map-like or list-like aggregate and intercepts
//! every write. Reads go straight to the target; writes and deletes rewire
//! nested-observable subscriptions and then notify the wrapper's observers.
//!
//! # Reserved names
//!
//! `observe`, `unobserve` and `notify` belong to the wrapper. A map that
//! already owns one of those keys cannot be wrapped, and the wrapper refuses
//! to set or delete them.
//!
//! # Nested observables
//!
//! When an observable value is stored inside another one, the outer wrapper
//! subscribes its own notifier to the inner value, so a mutation deep in the
//! tree reaches everyone observing any enclosing value.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::notifier::{Notifier, Observe};
use crate::error::{Error, Result};
use crate::value::Value;

/// Property names synthesized by the wrapper.
pub const RESERVED_NAMES: [&str; 3] = ["observe", "unobserve", "notify"];

fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Longest run of holes a single write past the end of a list may open.
pub const MAX_LIST_GAP: usize = 1 << 16;

/// Address of a property inside an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(String),
    Index(usize),
}

impl PropertyKey {
    fn reserved_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) if is_reserved(name) => Some(name),
            _ => None,
        }
    }

    fn into_map_key(self) -> String {
        match self {
            Self::Name(name) => name,
            Self::Index(index) => index.to_string(),
        }
    }

    fn to_list_index(&self) -> Result<usize> {
        match self {
            Self::Index(index) => Ok(*index),
            Self::Name(name) => name.parse().map_err(|_| Error::InvalidKey {
                key: name.clone(),
                target: "array",
            }),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// The container wrapped by an [`Observable`].
#[derive(Debug, Clone)]
pub enum Aggregate {
    Map(IndexMap<String, Value>),
    List(Vec<Value>),
}

impl Aggregate {
    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Self::Map(map) => Box::new(map.values()),
            Self::List(items) => Box::new(items.iter()),
        }
    }

    fn get(&self, key: &PropertyKey) -> Option<&Value> {
        match self {
            Self::Map(map) => match key {
                PropertyKey::Name(name) => map.get(name),
                PropertyKey::Index(index) => map.get(&index.to_string()),
            },
            Self::List(items) => key.to_list_index().ok().and_then(|i| items.get(i)),
        }
    }

    /// Store `value`, returning what was there.
    fn insert(&mut self, key: PropertyKey, value: Value) -> Result<Option<Value>> {
        match self {
            Self::Map(map) => Ok(map.insert(key.into_map_key(), value)),
            Self::List(items) => {
                let index = key.to_list_index()?;
                if index < items.len() {
                    Ok(Some(std::mem::replace(&mut items[index], value)))
                } else if index - items.len() > MAX_LIST_GAP {
                    Err(Error::InvalidKey {
                        key: index.to_string(),
                        target: "array",
                    })
                } else {
                    items.resize(index, Value::Undefined);
                    items.push(value);
                    Ok(None)
                }
            }
        }
    }

    /// Remove the entry at `key`. List slots become holes (`Undefined`).
    fn remove(&mut self, key: PropertyKey) -> Result<Option<Value>> {
        match self {
            Self::Map(map) => Ok(map.shift_remove(&key.into_map_key())),
            Self::List(items) => {
                let index = key.to_list_index()?;
                Ok(items
                    .get_mut(index)
                    .map(|slot| std::mem::replace(slot, Value::Undefined)))
            }
        }
    }
}

struct ObservableInner {
    target: RwLock<Aggregate>,
    notifier: Notifier,
}

/// A map or list whose mutations notify observers.
///
/// Cloning shares the wrapper, so clones observe the same target.
#[derive(Clone)]
pub struct Observable {
    inner: Arc<ObservableInner>,
}

impl Observable {
    /// Make `value` observable.
    ///
    /// Already observable values are returned unchanged. Plain objects and
    /// arrays are wrapped; anything else is rejected.
    pub fn wrap(value: Value) -> Result<Self> {
        match value {
            Value::Observable(observable) => Ok(observable),
            Value::Array(items) => Self::from_aggregate(Aggregate::List(Arc::unwrap_or_clone(items))),
            Value::Object(map) => Self::from_aggregate(Aggregate::Map(Arc::unwrap_or_clone(map))),
            other => Err(Error::InvalidObservableTarget(other.type_name())),
        }
    }

    /// An observable list.
    pub fn list<I>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        Self::from_aggregate(Aggregate::List(items.into_iter().collect()))
    }

    /// An observable map.
    pub fn map<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::from_aggregate(Aggregate::Map(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    fn from_aggregate(target: Aggregate) -> Result<Self> {
        if let Aggregate::Map(map) = &target {
            if let Some(name) = map.keys().find(|key| is_reserved(key)) {
                return Err(Error::ReservedNameConflict(name.clone()));
            }
        }

        let nested: Vec<Value> = target
            .values()
            .filter(|value| value.as_observe().is_some())
            .cloned()
            .collect();

        let observable = Self {
            inner: Arc::new(ObservableInner {
                target: RwLock::new(target),
                notifier: Notifier::new(),
            }),
        };

        for value in nested.iter().filter_map(Value::as_observe) {
            value.observe(observable.as_observer())?;
        }

        Ok(observable)
    }

    /// Read a property.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Option<Value> {
        self.inner.target.read().get(&key.into()).cloned()
    }

    /// Existence check. The reserved accessors always exist.
    pub fn has(&self, key: impl Into<PropertyKey>) -> bool {
        let key = key.into();
        key.reserved_name().is_some() || self.inner.target.read().get(&key).is_some()
    }

    /// Write a property and notify observers if the value changed.
    ///
    /// The write always happens. Observers are notified only when the new
    /// value is not identical to the previous one. Returns the previous value.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        if let Some(name) = key.reserved_name() {
            return Err(Error::ReservedNameConflict(name.to_string()));
        }
        let value = value.into();

        let previous = self.inner.target.write().insert(key, value.clone())?;
        let previous_value = previous.clone().unwrap_or_default();

        if !value.is_identical(&previous_value) {
            if let Some(previous_target) = previous_value.as_observe() {
                previous_target.unobserve(&self.as_observer())?;
            }
            if let Some(next_target) = value.as_observe() {
                next_target.observe(self.as_observer())?;
            }
            self.notify()?;
        }

        Ok(previous)
    }

    /// Append to a list.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let index = match &*self.inner.target.read() {
            Aggregate::List(items) => items.len(),
            Aggregate::Map(_) => {
                return Err(Error::InvalidKey {
                    key: "push".to_string(),
                    target: "object",
                })
            }
        };
        self.set(index, value).map(|_| ())
    }

    /// Delete a property and notify observers unconditionally.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> Result<Option<Value>> {
        let key = key.into();
        if let Some(name) = key.reserved_name() {
            return Err(Error::ReservedNameConflict(name.to_string()));
        }

        let removed = self.inner.target.write().remove(key)?;
        if let Some(removed_target) = removed.as_ref().and_then(Value::as_observe) {
            removed_target.unobserve(&self.as_observer())?;
        }

        self.notify()?;
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        match &*self.inner.target.read() {
            Aggregate::Map(map) => map.len(),
            Aggregate::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_list(&self) -> bool {
        matches!(&*self.inner.target.read(), Aggregate::List(_))
    }

    /// Keys in iteration order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        match &*self.inner.target.read() {
            Aggregate::Map(map) => map.keys().cloned().map(PropertyKey::Name).collect(),
            Aggregate::List(items) => (0..items.len()).map(PropertyKey::Index).collect(),
        }
    }

    /// Values in iteration order.
    pub fn values(&self) -> Vec<Value> {
        self.inner.target.read().values().cloned().collect()
    }

    /// A copy of the current target.
    pub fn snapshot(&self) -> Aggregate {
        self.inner.target.read().clone()
    }

    /// A plain (unobserved) copy of the current target.
    pub fn to_plain(&self) -> Value {
        match self.snapshot() {
            Aggregate::Map(map) => Value::Object(Arc::new(map)),
            Aggregate::List(items) => Value::Array(Arc::new(items)),
        }
    }

    /// Number of observers registered on this value.
    pub fn observer_count(&self) -> usize {
        self.inner.notifier.observer_count()
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Observe for Observable {
    fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("target", &*self.inner.target.read())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::Observer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn watch(observable: &Observable) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        observable
            .observe(Observer::new(move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        count
    }

    #[test]
    fn scalars_and_dates_are_rejected() {
        assert!(matches!(
            Observable::wrap(Value::from(1.0)),
            Err(Error::InvalidObservableTarget(_))
        ));
        assert!(matches!(
            Observable::wrap(Value::Date(chrono::Utc::now())),
            Err(Error::InvalidObservableTarget(_))
        ));
    }

    #[test]
    fn reserved_keys_block_wrapping() {
        let target = Value::object([("notify", Value::from(true))]);
        assert!(matches!(
            Observable::wrap(target),
            Err(Error::ReservedNameConflict(name)) if name == "notify"
        ));
    }

    #[test]
    fn reserved_keys_cannot_be_written_or_deleted() {
        let observable = Observable::map([("title", Value::from("Inception"))]).unwrap();

        assert!(observable.has("observe"));
        assert!(matches!(
            observable.set("unobserve", 1.0),
            Err(Error::ReservedNameConflict(_))
        ));
        assert!(matches!(
            observable.delete("observe"),
            Err(Error::ReservedNameConflict(_))
        ));
    }

    #[test]
    fn wrapping_is_idempotent() {
        let observable = Observable::list([Value::from(1.0)]).unwrap();
        let again = Observable::wrap(Value::Observable(observable.clone())).unwrap();
        assert!(again.ptr_eq(&observable));
    }

    #[test]
    fn set_notifies_only_on_change() {
        let observable = Observable::map([("count", Value::from(1.0))]).unwrap();
        let count = watch(&observable);

        observable.set("count", 1.0).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        observable.set("count", 2.0).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(observable.get("count"), Some(Value::from(2.0)));
    }

    #[test]
    fn delete_always_notifies() {
        let observable = Observable::map([("a", Value::from(1.0))]).unwrap();
        let count = watch(&observable);

        observable.delete("a").unwrap();
        observable.delete("missing").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!observable.has("a"));
    }

    #[test]
    fn list_writes_past_the_end_leave_holes() {
        let observable = Observable::list([]).unwrap();
        observable.set(2usize, "c").unwrap();

        assert_eq!(observable.len(), 3);
        assert_eq!(observable.get(0usize), Some(Value::Undefined));
        assert!(matches!(
            observable.set("title", 1.0),
            Err(Error::InvalidKey { .. })
        ));

        observable.delete(2usize).unwrap();
        assert_eq!(observable.len(), 3);
        assert_eq!(observable.get(2usize), Some(Value::Undefined));
    }

    #[test]
    fn far_out_of_range_list_writes_are_rejected() {
        let observable = Observable::list([Value::from("a")]).unwrap();
        let count = watch(&observable);

        assert!(matches!(
            observable.set(usize::MAX, 1.0),
            Err(Error::InvalidKey { .. })
        ));
        assert!(matches!(
            observable.set("99999999999999", 1.0),
            Err(Error::InvalidKey { .. })
        ));
        assert_eq!(observable.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        observable.set(1 + MAX_LIST_GAP, "z").unwrap();
        assert_eq!(observable.len(), MAX_LIST_GAP + 2);
    }

    #[test]
    fn nested_mutations_bubble_up() {
        let inner = Observable::list([Value::from(1.0)]).unwrap();
        let outer = Observable::map([("items", Value::Observable(inner.clone()))]).unwrap();
        let count = watch(&outer);

        inner.push(2.0).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Detached values stop propagating.
        outer.delete("items").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        inner.push(3.0).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(inner.observer_count(), 0);
    }

    #[test]
    fn replacing_nested_value_moves_subscription() {
        let first = Observable::list([]).unwrap();
        let second = Observable::list([]).unwrap();
        let outer = Observable::map(Vec::<(String, Value)>::new()).unwrap();

        outer.set("child", Value::Observable(first.clone())).unwrap();
        outer.set("child", Value::Observable(second.clone())).unwrap();

        assert_eq!(first.observer_count(), 0);
        assert_eq!(second.observer_count(), 1);
    }
}
