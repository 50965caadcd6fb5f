//! Subscriber registries for connection events.
//!
//! Handlers are stored under a handle id. Dispatch takes a snapshot of the
//! handlers first, so no lock is held while user code runs and a handler may
//! subscribe or unsubscribe from inside a callback. A panicking handler is
//! logged and skipped; the remaining handlers still run.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

/// A set of handlers for one event kind.
pub(crate) struct Subscribers<T> {
    kind: &'static str,
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: 'static> Subscribers<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub(crate) fn subscribe(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.handlers.push((id, Arc::new(handler)));
            id
        };

        let slots: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                slots.lock().handlers.retain(|(handle, _)| *handle != id);
            }
        })
    }

    /// Call every handler with `event`. Returns how many handlers ran.
    pub(crate) fn dispatch(&self, event: &T) -> usize {
        let snapshot: Vec<Handler<T>> = self
            .slots
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                tracing::error!(
                    kind = self.kind,
                    panic = panic_message(panic.as_ref()),
                    "subscriber panicked"
                );
            }
        }
        snapshot.len()
    }

    pub(crate) fn clear(&self) {
        self.slots.lock().handlers.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().handlers.len()
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("kind", &self.kind)
            .field("handlers", &self.slots.lock().handlers.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Handle returned by the `on_*` registration methods.
///
/// Dropping the handle keeps the handler registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
pub struct Subscription {
    remove: Box<dyn FnOnce() + Send + Sync>,
}

impl Subscription {
    fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Box::new(remove),
        }
    }

    /// Remove the handler. Other handlers are unaffected.
    pub fn unsubscribe(self) {
        (self.remove)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
