//! Notification Context
//!
//! Tracks which notifiers are currently firing on this thread. Observation
//! edges are allowed to form cycles in structure (an observable that holds
//! itself, a parent observer that writes another attribute of the same
//! parent), but a notifier that is already firing is never re-entered, so
//! every round terminates.
//!
//! # Implementation
//!
//! A thread-local stack holds the identity of every notifier in the middle
//! of a `notify()` call. Entering pushes, dropping the guard pops.

use std::cell::RefCell;

thread_local! {
    static FIRING_STACK: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the notifier when dropped.
///
/// This keeps the stack balanced even when an observer returns early with
/// an error.
pub(crate) struct NotificationContext {
    notifier: usize,
}

impl NotificationContext {
    /// Mark `notifier` as firing, unless it already is.
    pub(crate) fn enter(notifier: usize) -> Option<Self> {
        FIRING_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&notifier) {
                return None;
            }
            stack.push(notifier);
            Some(Self { notifier })
        })
    }

    /// Check whether `notifier` is firing on this thread.
    pub(crate) fn is_firing(notifier: usize) -> bool {
        FIRING_STACK.with(|stack| stack.borrow().contains(&notifier))
    }

    /// Depth of nested notification rounds on this thread.
    pub(crate) fn depth() -> usize {
        FIRING_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for NotificationContext {
    fn drop(&mut self) {
        FIRING_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.notifier),
                "NotificationContext mismatch"
            );
        });
    }
}
