//! # Event Bus
//!
//! A topic-based publish/subscribe channel shared by every widget on the page.
//!
//! Dispatch is synchronous: [`EventBus::emit`] returns after every callback ran.
//! Callbacks see the subscriber list as it was when the emit started, so
//! subscribing or unsubscribing from inside a callback only affects later emits.
//! A panicking callback is logged and skipped; its siblings still run.
//!
//! ```
//! use std::{cell::Cell, rc::Rc};
//!
//! use serde_json::{Value, json};
//! use waterui_embed::bus::{Callback, EventBus};
//!
//! let bus = EventBus::new();
//! let total = Rc::new(Cell::new(0));
//! let callback: Callback = {
//!     let total = Rc::clone(&total);
//!     Rc::new(move |args: &[Value]| total.set(total.get() + args[0].as_i64().unwrap()))
//! };
//!
//! let subscription = bus.on("cart:add", Rc::clone(&callback));
//! bus.emit("cart:add", &[json!(3)]);
//! subscription.unsubscribe();
//! bus.emit("cart:add", &[json!(4)]);
//!
//! assert_eq!(total.get(), 3);
//! ```

use core::fmt::{self, Debug};
use std::{
    cell::RefCell,
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    rc::{Rc, Weak},
};

use serde_json::Value;

use crate::logging::panic_message;

/// A subscriber callback. Identity is pointer identity of the `Rc`.
pub type Callback = Rc<dyn Fn(&[Value])>;

type Topics = HashMap<String, Vec<Callback>>;

/// A topic-based publish/subscribe channel.
#[derive(Clone, Default)]
pub struct EventBus {
    topics: Rc<RefCell<Topics>>,
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.borrow();
        f.debug_map()
            .entries(topics.iter().map(|(topic, callbacks)| (topic, callbacks.len())))
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback` to `topic`.
    ///
    /// Subscribing the same callback twice to one topic keeps a single subscription.
    pub fn on(&self, topic: impl Into<String>, callback: Callback) -> Subscription {
        let topic = topic.into();
        {
            let mut topics = self.topics.borrow_mut();
            let callbacks = topics.entry(topic.clone()).or_default();
            if !callbacks.iter().any(|existing| Rc::ptr_eq(existing, &callback)) {
                callbacks.push(Rc::clone(&callback));
            }
        }
        Subscription {
            topics: Rc::downgrade(&self.topics),
            topic,
            callback,
        }
    }

    /// Removes `callback` from `topic`. Unknown topics and callbacks are ignored.
    pub fn off(&self, topic: &str, callback: &Callback) {
        remove(&self.topics, topic, callback);
    }

    /// Calls every callback subscribed to `topic` with `args`.
    ///
    /// Returns the number of callbacks that completed without panicking.
    pub fn emit(&self, topic: &str, args: &[Value]) -> usize {
        let snapshot = self.topics.borrow().get(topic).cloned().unwrap_or_default();

        let mut completed = 0;
        for callback in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(args))) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    tracing::error!(
                        topic,
                        "Event callback panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        completed
    }

    /// Drops every subscription on every topic.
    pub fn clear(&self) {
        let topics = core::mem::take(&mut *self.topics.borrow_mut());
        drop(topics);
    }

    /// Number of callbacks subscribed to `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics.borrow().get(topic).map_or(0, Vec::len)
    }
}

fn remove(topics: &RefCell<Topics>, topic: &str, callback: &Callback) {
    let removed = {
        let mut topics = topics.borrow_mut();
        let Some(callbacks) = topics.get_mut(topic) else {
            return;
        };
        let position = callbacks
            .iter()
            .position(|existing| Rc::ptr_eq(existing, callback));
        let removed = position.map(|position| callbacks.remove(position));
        if callbacks.is_empty() {
            topics.remove(topic);
        }
        removed
    };
    drop(removed);
}

/// Handle returned by [`EventBus::on`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to end it.
pub struct Subscription {
    topics: Weak<RefCell<Topics>>,
    topic: String,
    callback: Callback,
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// The subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Ends the subscription. Same as calling `off` with the original callback.
    pub fn unsubscribe(self) {
        if let Some(topics) = self.topics.upgrade() {
            remove(&topics, &self.topic, &self.callback);
        }
    }
}

thread_local! {
    static BUS: EventBus = EventBus::new();
}

/// The page-wide bus shared by every widget on this thread.
#[must_use]
pub fn bus() -> EventBus {
    BUS.with(EventBus::clone)
}

/// [`EventBus::on`] on the page-wide bus.
pub fn on(topic: impl Into<String>, callback: Callback) -> Subscription {
    bus().on(topic, callback)
}

/// [`EventBus::off`] on the page-wide bus.
pub fn off(topic: &str, callback: &Callback) {
    bus().off(topic, callback);
}

/// [`EventBus::emit`] on the page-wide bus.
pub fn emit(topic: &str, args: &[Value]) -> usize {
    bus().emit(topic, args)
}

/// [`EventBus::clear`] on the page-wide bus.
pub fn clear() {
    bus().clear();
}
