//! The observation capability.
//!
//! [`Notifier`] is a shareable handle over an [`ObserverSet`]. Anything that
//! can be observed (observable values, attributes, components) embeds one and
//! implements [`Observe`] to expose `observe`, `unobserve` and `notify`.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::context::NotificationContext;
use super::observer::{Observer, ObserverSet};
use crate::error::Result;

/// Shared handle to an observer set.
///
/// Cloning the handle shares the set.
#[derive(Clone, Default)]
pub struct Notifier {
    observers: Arc<Mutex<ObserverSet>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn observe(&self, observer: Observer) -> Result<()> {
        self.observers.lock().add(observer)
    }

    /// Remove the first registration of `observer`.
    pub fn unobserve(&self, observer: &Observer) -> Result<()> {
        self.observers.lock().remove(observer)
    }

    /// Fire every observer in registration order.
    ///
    /// Observers run against a snapshot of the set with no lock held, so they
    /// may freely observe, unobserve or write. A notifier that is already
    /// firing on this thread is not re-entered.
    pub fn notify(&self) -> Result<()> {
        let Some(_ctx) = NotificationContext::enter(self.key()) else {
            trace!("skipping re-entrant notification");
            return Ok(());
        };

        let snapshot = self.observers.lock().clone();
        trace!(
            observers = snapshot.len(),
            depth = NotificationContext::depth(),
            "notifying observers"
        );
        snapshot.fire()
    }

    /// Whether this notifier is in the middle of a round on this thread.
    pub fn is_notifying(&self) -> bool {
        NotificationContext::is_firing(self.key())
    }

    /// An observer that forwards to this notifier.
    pub fn as_observer(&self) -> Observer {
        Observer::Forward(self.downgrade())
    }

    pub fn downgrade(&self) -> WeakNotifier {
        WeakNotifier(Arc::downgrade(&self.observers))
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Number of registrations sharing the identity of `observer`.
    pub fn count_of(&self, observer: &Observer) -> usize {
        self.observers.lock().count_of(observer)
    }

    pub fn ptr_eq(&self, other: &Notifier) -> bool {
        Arc::ptr_eq(&self.observers, &other.observers)
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.observers) as usize
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

/// Non-owning reference to a [`Notifier`], held by forwarding observers.
#[derive(Clone)]
pub struct WeakNotifier(Weak<Mutex<ObserverSet>>);

impl WeakNotifier {
    pub fn upgrade(&self) -> Option<Notifier> {
        self.0.upgrade().map(|observers| Notifier { observers })
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn ptr_eq(&self, other: &WeakNotifier) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for WeakNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNotifier")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Observation capability composed onto a type through its [`Notifier`].
pub trait Observe {
    /// The notifier backing this observable.
    fn notifier(&self) -> &Notifier;

    fn observe(&self, observer: Observer) -> Result<()> {
        self.notifier().observe(observer)
    }

    fn unobserve(&self, observer: &Observer) -> Result<()> {
        self.notifier().unobserve(observer)
    }

    fn notify(&self) -> Result<()> {
        self.notifier().notify()
    }

    /// An observer that forwards notifications to this observable.
    fn as_observer(&self) -> Observer {
        self.notifier().as_observer()
    }
}
