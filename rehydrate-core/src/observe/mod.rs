//! Observation Primitives
//!
//! This module implements the change-notification layer that ties values,
//! attributes and components together.
//!
//! # Concepts
//!
//! ## Observers
//!
//! An [`Observer`] is either a zero-argument callback or a forwarding edge
//! to another observable. Observer sets are ordered and fire in registration
//! order.
//!
//! ## The Observe capability
//!
//! Rather than injecting methods through inheritance, every observable type
//! embeds a [`Notifier`] and implements [`Observe`], which supplies
//! `observe`, `unobserve` and `notify`.
//!
//! ## Observable values
//!
//! An [`Observable`] wraps a map or a list. Writes through the wrapper
//! notify its observers and keep nested-observable subscriptions in sync
//! with the stored contents.
//!
//! # Termination
//!
//! Structural cycles are allowed. A thread-local stack of firing notifiers
//! keeps each round acyclic in effect: a notifier already firing on the
//! current thread is skipped.

mod context;
mod notifier;
mod observer;
mod proxy;

pub use notifier::{Notifier, Observe, WeakNotifier};
pub use observer::{Observer, ObserverId, ObserverSet};
pub use proxy::{Aggregate, Observable, PropertyKey, MAX_LIST_GAP, RESERVED_NAMES};
