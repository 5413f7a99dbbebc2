//! # Signal Store
//!
//! A page-wide registry of reactive values, keyed by name.
//!
//! Widgets mounted independently can share state by asking for the same key:
//! the first [`get_signal`] creates the value, later calls return the same
//! [`Binding`] and ignore their initial value.
//!
//! ```
//! use waterui_embed::signal::get_signal;
//!
//! let count = get_signal("docs:count", 0).unwrap();
//! let again = get_signal("docs:count", 100).unwrap();
//! count.set(5);
//! assert_eq!(again.get(), 5);
//! ```

use core::any::Any;
use std::{cell::RefCell, collections::BTreeMap, collections::HashMap, rc::Rc};

use nami::{Binding, Computed, SignalExt, binding};
use serde_json::Value;
use waterui_embed_core::{EmbedError, Props, props};

thread_local! {
    static SIGNALS: RefCell<BTreeMap<String, Box<dyn Any>>> = RefCell::new(BTreeMap::new());
}

/// Returns the reactive value stored under `key`, creating it from `initial` on
/// first access.
///
/// # Errors
///
/// Returns [`EmbedError::SignalTypeMismatch`] if `key` already holds a value of
/// another type.
pub fn get_signal<T>(key: &str, initial: T) -> Result<Binding<T>, EmbedError>
where
    T: Clone + 'static,
{
    SIGNALS.with(|signals| {
        let mut signals = signals.borrow_mut();
        if let Some(existing) = signals.get(key) {
            return existing
                .downcast_ref::<Binding<T>>()
                .cloned()
                .ok_or_else(|| EmbedError::SignalTypeMismatch {
                    key: key.to_string(),
                });
        }

        let created: Binding<T> = binding(initial);
        signals.insert(key.to_string(), Box::new(created.clone()));
        tracing::trace!("Created signal `{key}`");
        Ok(created)
    })
}

/// Returns `true` if a value is stored under `key`.
#[must_use]
pub fn has_signal(key: &str) -> bool {
    SIGNALS.with(|signals| signals.borrow().contains_key(key))
}

/// Removes the value stored under `key`.
///
/// Handles obtained earlier keep working but are no longer shared with later
/// [`get_signal`] calls.
pub fn delete_signal(key: &str) -> bool {
    let removed = SIGNALS.with(|signals| signals.borrow_mut().remove(key));
    removed.is_some()
}

/// Removes every stored value.
pub fn clear_signals() {
    let removed = SIGNALS.with(|signals| core::mem::take(&mut *signals.borrow_mut()));
    drop(removed);
}

/// Keys of every stored value, in sorted order.
#[must_use]
pub fn signal_keys() -> Vec<String> {
    SIGNALS.with(|signals| signals.borrow().keys().cloned().collect())
}

/// Derives a value from `source` that follows its changes.
pub fn computed<T, U, F>(source: &Binding<T>, f: F) -> Computed<U>
where
    T: Clone + 'static,
    U: Clone + 'static,
    F: Fn(T) -> U + Clone + 'static,
{
    source.clone().map(f).computed()
}

/// An update function bound to a [`Store`].
///
/// Receives the current state and the dispatch arguments, and returns the fields
/// to change, if any.
pub type Action = Rc<dyn Fn(&Props, &[Value]) -> Option<Props>>;

/// A reactive object together with the named actions that update it.
#[derive(Clone)]
pub struct Store {
    key: String,
    state: Binding<Props>,
    actions: HashMap<String, Action>,
}

impl core::fmt::Debug for Store {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut actions: Vec<_> = self.actions.keys().collect();
        actions.sort();
        f.debug_struct("Store")
            .field("key", &self.key)
            .field("state", &self.state.get())
            .field("actions", &actions)
            .finish()
    }
}

/// Creates a store whose state lives in the signal registry under `key`.
///
/// Stores created with the same key share their state.
///
/// # Errors
///
/// Returns [`EmbedError::SignalTypeMismatch`] if `key` already holds a value that is
/// not an object.
///
/// ```
/// use serde_json::{Map, json};
/// use waterui_embed::signal::create_store;
///
/// let counter = create_store("docs:counter", Map::new())
///     .unwrap()
///     .action("increment", |state, _| {
///         let count = state.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
///         json!({ "count": count + 1 }).as_object().cloned()
///     });
///
/// counter.dispatch("increment", &[]);
/// assert_eq!(counter.snapshot()["count"], 1);
/// ```
pub fn create_store(key: &str, initial: Props) -> Result<Store, EmbedError> {
    Ok(Store {
        key: key.to_string(),
        state: get_signal(key, initial)?,
        actions: HashMap::new(),
    })
}

impl Store {
    /// Binds `f` as the action called `name`, replacing any action of that name.
    #[must_use]
    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Props, &[Value]) -> Option<Props> + 'static,
    {
        self.actions.insert(name.into(), Rc::new(f));
        self
    }

    /// Runs the action called `name` and merges its result in a single update.
    ///
    /// Returns `false` if no such action exists.
    pub fn dispatch(&self, name: &str, args: &[Value]) -> bool {
        let Some(action) = self.actions.get(name).cloned() else {
            tracing::warn!(store = %self.key, "Unknown action `{name}`");
            return false;
        };

        let mut state = self.state.get();
        if let Some(partial) = action(&state, args) {
            props::merge(&mut state, partial);
            self.state.set(state);
        }
        true
    }

    /// The reactive state, for watching or deriving from.
    #[must_use]
    pub const fn state(&self) -> &Binding<Props> {
        &self.state
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Props {
        self.state.get()
    }
}
