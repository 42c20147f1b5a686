//! [`SelectorTable`] – per-object registry of named capabilities.
//!
//! An object that wants to expose runtime-discoverable behaviour owns a
//! `SelectorTable<Self>` and registers one handler per selector name.  The
//! table only indexes behaviour; it never drives dispatch on its own.
//!
//! [`SelectorSet`] is the object-safe, read-only view of a table.  It lets
//! code that does not know the owner type (for example the protocol
//! registry) ask which selectors an object declares.

use std::collections::HashMap;
use std::fmt;

use switchyard_types::{Event, SwitchyardError};
use tracing::debug;

/// Handler stored under a selector: `(responder, event) -> event`.
pub type Handler<R> = Box<dyn Fn(&R, &Event) -> Event + Send + Sync>;

/// Read-only view of the selectors an object declares.
pub trait SelectorSet {
    /// `true` when a handler is registered under `name`.
    fn has_selector(&self, name: &str) -> bool;

    /// All registered selector names, sorted.
    fn selector_names(&self) -> Vec<&str>;

    /// Number of registered selectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An object that exposes its selector table for inspection.
pub trait Selectable {
    fn selectors(&self) -> &dyn SelectorSet;
}

/// Mapping from selector name to a typed handler for responders of type `R`.
///
/// # Example
///
/// ```
/// use switchyard_dispatch::selector::{SelectorSet, SelectorTable};
/// use switchyard_types::Event;
///
/// struct Lamp;
///
/// let mut table = SelectorTable::<Lamp>::new();
/// table
///     .register("toggle", |_lamp, event| event.respond("lamp", "on".into()))
///     .unwrap();
///
/// assert!(table.has_selector("toggle"));
/// assert!(table.invoke("toggle", &Lamp, &Event::new("toggle")).is_some());
/// assert!(table.invoke("dim", &Lamp, &Event::new("dim")).is_none());
/// ```
pub struct SelectorTable<R> {
    handlers: HashMap<String, Handler<R>>,
}

impl<R> SelectorTable<R> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` under `name`, replacing any previous handler.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchyardError::EmptySelector`] when `name` is empty.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> Result<(), SwitchyardError>
    where
        F: Fn(&R, &Event) -> Event + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(SwitchyardError::EmptySelector);
        }
        if self.handlers.insert(name.clone(), Box::new(handler)).is_some() {
            debug!(selector = %name, "selector handler replaced");
        }
        Ok(())
    }

    /// Remove the handler registered under `name`.  Returns whether one was
    /// present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    /// `true` when a handler is registered under `name`.
    pub fn has_selector(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Call the handler registered under `name` with `responder` and
    /// `event`.  Returns `None` when no such selector exists.
    pub fn invoke(&self, name: &str, responder: &R, event: &Event) -> Option<Event> {
        self.handlers.get(name).map(|handler| handler(responder, event))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<R> Default for SelectorTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> SelectorSet for SelectorTable<R> {
    fn has_selector(&self, name: &str) -> bool {
        SelectorTable::has_selector(self, name)
    }

    fn selector_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn len(&self) -> usize {
        SelectorTable::len(self)
    }
}

impl<R> fmt::Debug for SelectorTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorTable")
            .field("selectors", &self.selector_names())
            .finish()
    }
}
