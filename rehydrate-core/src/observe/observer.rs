//! Observer types for the observation layer.
//!
//! An Observer is anything that wants to hear about a change: either a
//! plain callback, or another observable that forwards the notification to
//! its own observers (this is how a nested value reaches the attribute and
//! component holding it).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use super::notifier::WeakNotifier;
use crate::error::{Error, Result};

/// Unique identifier for a callback observer.
///
/// Clones of an [`Observer`] share the same ID, which is what removal
/// compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Generate a new unique observer ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Something that can be notified of a change.
#[derive(Clone)]
pub enum Observer {
    /// A zero-argument callback.
    Callback { id: ObserverId, callback: Callback },

    /// Another observable; calling it fires that observable's observers.
    Forward(WeakNotifier),
}

impl Observer {
    /// Create a callback observer that cannot fail.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::fallible(move || {
            callback();
            Ok(())
        })
    }

    /// Create a callback observer whose error aborts the notification round.
    pub fn fallible<F>(callback: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self::Callback {
            id: ObserverId::new(),
            callback: Arc::new(callback),
        }
    }

    /// Whether calling this observer can reach anything.
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Callback { .. } => true,
            Self::Forward(target) => target.is_alive(),
        }
    }

    /// Identity comparison used for removal.
    pub fn same_as(&self, other: &Observer) -> bool {
        match (self, other) {
            (Self::Callback { id: a, .. }, Self::Callback { id: b, .. }) => a == b,
            (Self::Forward(a), Self::Forward(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Invoke the observer.
    pub fn call(&self) -> Result<()> {
        match self {
            Self::Callback { callback, .. } => callback(),
            Self::Forward(target) => match target.upgrade() {
                Some(notifier) => notifier.notify(),
                // The forwarding target was dropped after subscribing.
                None => Ok(()),
            },
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback { id, .. } => f.debug_tuple("Callback").field(id).finish(),
            Self::Forward(target) => f.debug_tuple("Forward").field(target).finish(),
        }
    }
}

/// Ordered collection of observers. Duplicates are permitted.
#[derive(Debug, Clone, Default)]
pub struct ObserverSet {
    observers: SmallVec<[Observer; 4]>,
}

impl ObserverSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer.
    pub fn add(&mut self, observer: Observer) -> Result<()> {
        if !observer.is_callable() {
            return Err(Error::InvalidObserver);
        }
        self.observers.push(observer);
        Ok(())
    }

    /// Remove the first observer with the same identity, if any.
    pub fn remove(&mut self, observer: &Observer) -> Result<()> {
        if !observer.is_callable() {
            return Err(Error::InvalidObserver);
        }
        if let Some(index) = self.observers.iter().position(|o| o.same_as(observer)) {
            self.observers.remove(index);
        }
        Ok(())
    }

    /// Invoke every observer in registration order.
    ///
    /// The first failing observer stops the round and its error is returned.
    pub fn fire(&self) -> Result<()> {
        for observer in &self.observers {
            observer.call()?;
        }
        Ok(())
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Number of entries sharing the identity of `observer`.
    pub fn count_of(&self, observer: &Observer) -> usize {
        self.observers.iter().filter(|o| o.same_as(observer)).count()
    }
}
