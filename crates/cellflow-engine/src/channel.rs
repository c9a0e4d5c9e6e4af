//! Minimal publish/subscribe primitive.
//!
//! Listeners are invoked synchronously, in registration order. Publishing works
//! on a snapshot of the listener list, so a listener may subscribe new listeners
//! or publish again on the same channel while it runs. Terminating such
//! recursion is the caller's job.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A shared listener callback.
pub type Listener<E> = Rc<dyn Fn(&E)>;

pub struct Channel<E> {
    listeners: RefCell<Vec<Listener<E>>>,
}

impl<E> Channel<E> {
    pub fn new() -> Self {
        Channel {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Register a listener. Registering the same `Rc` twice is a no-op.
    /// Returns whether the listener was added.
    pub fn subscribe(&self, listener: Listener<E>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        if listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Invoke every registered listener with `event`.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self.listeners.borrow().clone();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl<E> Default for Channel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("listeners", &self.len())
            .finish()
    }
}
