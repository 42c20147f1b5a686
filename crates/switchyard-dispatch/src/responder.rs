//! [`Responder`] – a ready-made leaf [`Respondable`] driven by its own
//! [`SelectorTable`].
//!
//! A `Responder` answers an event when its table declares a selector equal
//! to the event's `kind`, and answers it by invoking that selector.  Any
//! per-responder data lives in the user-supplied `state`, which handlers
//! receive through the responder reference.

use std::fmt;

use switchyard_types::{Event, SwitchyardError};

use crate::respondable::Respondable;
use crate::selector::{SelectorSet, SelectorTable, Selectable};

/// Leaf responder whose behaviour is defined entirely by its selectors.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use switchyard_dispatch::{Respondable, Responder};
/// use switchyard_types::Event;
///
/// let counter = Responder::new("counter", "metrics", AtomicU32::new(0))
///     .with_selector("tick", |me, event| {
///         let n = me.state().fetch_add(1, Ordering::SeqCst) + 1;
///         event.respond(me.name(), n.into())
///     })
///     .unwrap();
///
/// assert!(counter.responds_to(&Event::new("tick")));
/// counter.invoke(&Event::new("tick"));
/// assert_eq!(counter.state().load(Ordering::SeqCst), 1);
/// ```
pub struct Responder<S = ()> {
    name: String,
    type_name: String,
    state: S,
    selectors: SelectorTable<Responder<S>>,
}

impl<S> Responder<S> {
    /// Create a responder with an empty selector table.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, state: S) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            state,
            selectors: SelectorTable::new(),
        }
    }

    /// Builder form of [`Responder::register`].
    ///
    /// # Errors
    ///
    /// Returns [`SwitchyardError::EmptySelector`] when `selector` is empty.
    pub fn with_selector<F>(mut self, selector: impl Into<String>, handler: F) -> Result<Self, SwitchyardError>
    where
        F: Fn(&Responder<S>, &Event) -> Event + Send + Sync + 'static,
    {
        self.register(selector, handler)?;
        Ok(self)
    }

    /// Register (or replace) the handler for `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchyardError::EmptySelector`] when `selector` is empty.
    pub fn register<F>(&mut self, selector: impl Into<String>, handler: F) -> Result<(), SwitchyardError>
    where
        F: Fn(&Responder<S>, &Event) -> Event + Send + Sync + 'static,
    {
        self.selectors.register(selector, handler)
    }

    /// Remove the handler for `selector`.  Returns whether one was present.
    pub fn unregister(&mut self, selector: &str) -> bool {
        self.selectors.unregister(selector)
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn table(&self) -> &SelectorTable<Responder<S>> {
        &self.selectors
    }
}

impl<S: Send + Sync> Respondable for Responder<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn responds_to(&self, event: &Event) -> bool {
        self.selectors.has_selector(&event.kind)
    }

    fn invoke(&self, event: &Event) -> Event {
        // Chains only invoke after `responds_to`; a direct call for an
        // undeclared selector passes the event through.
        self.selectors
            .invoke(&event.kind, self, event)
            .unwrap_or_else(|| event.clone())
    }
}

impl<S> Selectable for Responder<S> {
    fn selectors(&self) -> &dyn SelectorSet {
        &self.selectors
    }
}

impl<S> fmt::Debug for Responder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("selectors", &self.selectors)
            .finish_non_exhaustive()
    }
}
