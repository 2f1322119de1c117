//! Instance Capabilities
//!
//! Two capabilities every instance carries regardless of its component
//! type:
//!
//! - [`Disposable`]: idempotent disposal plus registered cleanups
//!   ([`Disposer`] is the embeddable implementation).
//! - [`EventEmitter`]: named events with ordered listeners ([`Emitter`] is
//!   the embeddable implementation).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::{Callback, Value};

/// Something that can be disposed exactly once.
pub trait Disposable {
    /// Release everything owned. Calling it again does nothing.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// Disposal state and cleanup callbacks.
#[derive(Default)]
pub struct Disposer {
    disposed: AtomicBool,
    cleanups: Mutex<Vec<Cleanup>>,
}

impl Disposer {
    /// Register a cleanup. Cleanups run last-registered first; one
    /// registered after disposal runs immediately.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + Send + 'static) {
        if self.is_disposed() {
            cleanup();
            return;
        }
        self.cleanups.lock().push(Box::new(cleanup));
    }

    /// Mark disposed. Returns false if disposal already started.
    pub fn begin(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }

    /// Run the registered cleanups, most recent first.
    pub fn run_cleanups(&self) {
        loop {
            // The lock is released before each cleanup runs.
            let Some(cleanup) = self.cleanups.lock().pop() else {
                break;
            };
            cleanup();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Disposable for Disposer {
    fn dispose(&self) {
        if self.begin() {
            self.run_cleanups();
        }
    }

    fn is_disposed(&self) -> bool {
        Disposer::is_disposed(self)
    }
}

/// Handle returned by [`EventEmitter::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Something that emits named events.
pub trait EventEmitter {
    /// Add a listener for `event`. Listeners run in registration order.
    fn on(&self, event: &str, listener: Callback) -> ListenerId;

    /// Remove a listener. Returns whether it was registered.
    fn off(&self, listener: ListenerId) -> bool;

    /// Emit `event` with `args`.
    fn trigger(&self, event: &str, args: &[Value]);
}

struct Listener {
    id: ListenerId,
    event: Arc<str>,
    callback: Callback,
}

/// Listener table.
#[derive(Default)]
pub struct Emitter {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl Emitter {
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|l| &*l.event == event)
            .count()
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

impl EventEmitter for Emitter {
    fn on(&self, event: &str, listener: Callback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push(Listener {
            id,
            event: Arc::from(event),
            callback: listener,
        });
        id
    }

    fn off(&self, listener: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != listener);
        listeners.len() != before
    }

    fn trigger(&self, event: &str, args: &[Value]) {
        let matching: Vec<Callback> = self
            .listeners
            .lock()
            .iter()
            .filter(|l| &*l.event == event)
            .map(|l| l.callback.clone())
            .collect();
        for callback in matching {
            callback.call(args);
        }
    }
}
