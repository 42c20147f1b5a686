//! [`Chain`] – priority-ordered responder chain with several dispatch
//! policies.
//!
//! # Ordering
//!
//! Entries are kept sorted by descending priority; entries added earlier
//! at the same priority come first.  The order is re-established after
//! every mutation, so iteration is deterministic.
//!
//! # Dispatch policies
//!
//! | Method | Invokes |
//! |---|---|
//! | [`Chain::send_first`] | the first responding entry, then stops |
//! | [`Chain::send_all`] | every responding entry, in order |
//! | [`Chain::send_named`] | the entry with the given name, if it responds |
//! | [`Chain::send_type`] | every responding entry of the given type, in order |
//!
//! # Nesting
//!
//! A `Chain` is itself [`Respondable`], so chains can be added to other
//! chains.  As an entry, a chain responds when any of its descendants does,
//! and invoking it applies [`Chain::send_first`] to the sub-chain.  When the
//! sub-chain finds no responder the original event is passed through
//! unchanged.
//!
//! # Concurrency
//!
//! Membership sits behind a [`RwLock`].  Every dispatch copies the entry
//! list under the read lock and releases the lock before calling into any
//! responder, so a responder may add or remove entries on the chain that is
//! dispatching to it; the change applies to the next dispatch.
//!
//! A chain must not contain itself.  Direct self-containment is rejected by
//! [`Chain::add`]; deeper cycles are cut off by a per-thread depth guard
//! (see [`Chain::with_max_depth`]) that makes the chain behave as empty
//! once the nesting limit is reached.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use switchyard_types::{Event, SwitchyardError};
use tracing::{debug, trace, warn};

use crate::respondable::{Respondable, same_responder};

/// Priority used by [`Chain::add`] unless overridden with
/// [`Chain::with_default_priority`].
pub const DEFAULT_PRIORITY: i32 = 0;

/// Default limit on how many chains may be nested inside one dispatch.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Type name reported by a chain used as an entry, unless overridden.
pub const CHAIN_TYPE: &str = "chain";

thread_local! {
    static DISPATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Opaque handle returned by [`Chain::add`], usable with
/// [`Chain::remove_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

/// Snapshot of one chain entry, as returned by [`Chain::members`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub token: Token,
    pub name: String,
    pub type_name: String,
    pub priority: i32,
}

/// Outcome of [`Chain::send_named`].
#[derive(Debug, Clone, PartialEq)]
pub enum NamedDispatch {
    /// No entry has the requested name.
    NotFound,
    /// The entry exists but does not respond to the event.
    Declined,
    /// The entry was invoked and returned this event.
    Invoked(Event),
}

impl NamedDispatch {
    pub fn found(&self) -> bool {
        !matches!(self, NamedDispatch::NotFound)
    }

    pub fn invoked(&self) -> bool {
        matches!(self, NamedDispatch::Invoked(_))
    }

    /// The invoked entry's result, if any.
    pub fn into_event(self) -> Option<Event> {
        match self {
            NamedDispatch::Invoked(event) => Some(event),
            _ => None,
        }
    }
}

/// Membership state guarded by the chain's lock.  Sequence numbers are
/// handed out under the same write lock that inserts the entry, so `seq`
/// order is visibility order.
#[derive(Default)]
struct Entries {
    next_seq: u64,
    list: Vec<Entry>,
}

#[derive(Clone)]
struct Entry {
    seq: u64,
    priority: i32,
    responder: Arc<dyn Respondable>,
}

impl Entry {
    fn token(&self) -> Token {
        Token(self.seq)
    }
}

/// Decrements the thread's dispatch depth on drop.
struct DepthGuard;

impl DepthGuard {
    fn enter(max_depth: usize) -> Option<Self> {
        DISPATCH_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= max_depth {
                None
            } else {
                depth.set(current + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// An ordered, priority-sorted collection of [`Respondable`] entries.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use switchyard_dispatch::{Chain, Respondable, Responder};
/// use switchyard_types::Event;
///
/// let low = Responder::new("low", "greeter", ())
///     .with_selector("greet", |me, e| e.respond(me.name(), "low".into()))
///     .unwrap();
/// let high = Responder::new("high", "greeter", ())
///     .with_selector("greet", |me, e| e.respond(me.name(), "high".into()))
///     .unwrap();
///
/// let chain = Chain::new("root");
/// chain.add_with_priority(Arc::new(low), 5).unwrap();
/// chain.add_with_priority(Arc::new(high), 10).unwrap();
///
/// let result = chain.send_first(&Event::new("greet")).unwrap();
/// assert_eq!(result.source, "high");
/// assert_eq!(chain.send_all(&Event::new("greet")).len(), 2);
/// assert!(chain.send_first(&Event::new("unknown")).is_none());
/// ```
pub struct Chain {
    name: String,
    type_name: String,
    default_priority: i32,
    max_depth: usize,
    entries: RwLock<Entries>,
}

impl Chain {
    /// Create an empty chain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: CHAIN_TYPE.to_string(),
            default_priority: DEFAULT_PRIORITY,
            max_depth: DEFAULT_MAX_DEPTH,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Override the type name this chain reports when nested.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Override the priority used by [`Chain::add`].
    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    /// Limit how deeply chains may be nested within a single dispatch that
    /// reaches this chain.  A limit of `0` disables the chain entirely.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add `responder` at the chain's default priority.
    ///
    /// # Errors
    ///
    /// See [`Chain::add_with_priority`].
    pub fn add(&self, responder: Arc<dyn Respondable>) -> Result<Token, SwitchyardError> {
        self.add_with_priority(responder, self.default_priority)
    }

    /// Add `responder` with an explicit priority.  Higher priorities are
    /// served first; ties keep insertion order.
    ///
    /// # Errors
    ///
    /// * [`SwitchyardError::EmptyName`] when the responder's name is empty.
    /// * [`SwitchyardError::SelfContainment`] when `responder` is this chain.
    pub fn add_with_priority(
        &self,
        responder: Arc<dyn Respondable>,
        priority: i32,
    ) -> Result<Token, SwitchyardError> {
        if responder.name().is_empty() {
            return Err(SwitchyardError::EmptyName);
        }
        if std::ptr::addr_eq(Arc::as_ptr(&responder), self as *const Chain) {
            return Err(SwitchyardError::SelfContainment {
                chain: self.name.clone(),
            });
        }

        let name = responder.name().to_string();
        let seq = {
            let mut entries = self.entries.write();
            let seq = entries.next_seq;
            entries.next_seq += 1;
            entries.list.push(Entry {
                seq,
                priority,
                responder,
            });
            Self::sort(&mut entries.list);
            seq
        };
        debug!(chain = %self.name, responder = %name, priority, "responder added");
        Ok(Token(seq))
    }

    /// Remove the first entry that is the same object as `responder`.
    /// Returns whether an entry was removed.
    pub fn remove<R: ?Sized>(&self, responder: &Arc<R>) -> bool {
        self.remove_where(|entry| same_responder(&entry.responder, responder))
    }

    /// Remove the entry created by the [`Chain::add`] call that returned
    /// `token`.  Returns whether an entry was removed.
    pub fn remove_token(&self, token: Token) -> bool {
        self.remove_where(|entry| entry.token() == token)
    }

    fn remove_where(&self, matches: impl Fn(&Entry) -> bool) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            let Some(index) = entries.list.iter().position(matches) else {
                return false;
            };
            let removed = entries.list.remove(index);
            Self::sort(&mut entries.list);
            removed
        };
        debug!(
            chain = %self.name,
            responder = %removed.responder.name(),
            "responder removed"
        );
        true
    }

    fn sort(entries: &mut [Entry]) {
        entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().list.is_empty()
    }

    /// Ordered snapshot of the current entries.
    pub fn members(&self) -> Vec<Member> {
        self.entries
            .read()
            .list
            .iter()
            .map(|entry| Member {
                token: entry.token(),
                name: entry.responder.name().to_string(),
                type_name: entry.responder.type_name().to_string(),
                priority: entry.priority,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// `true` when at least one entry responds to `event`.
    pub fn responds_to(&self, event: &Event) -> bool {
        let Some(_guard) = self.enter() else {
            return false;
        };
        self.snapshot()
            .iter()
            .any(|entry| entry.responder.responds_to(event))
    }

    /// Invoke the highest-priority entry that responds to `event` and
    /// return its result.  `None` when no entry responds.
    pub fn send_first(&self, event: &Event) -> Option<Event> {
        let _guard = self.enter()?;
        let entry = self
            .snapshot()
            .into_iter()
            .find(|entry| entry.responder.responds_to(event))?;
        trace!(
            chain = %self.name,
            responder = %entry.responder.name(),
            kind = %event.kind,
            "send_first invoking"
        );
        Some(entry.responder.invoke(event))
    }

    /// Invoke every entry that responds to `event`, in order, and collect
    /// the results.  Non-responding entries contribute nothing.
    pub fn send_all(&self, event: &Event) -> Vec<Event> {
        self.dispatch_matching(event, |_| true)
    }

    /// Invoke the entry named `name` if it responds to `event`.
    pub fn send_named(&self, name: &str, event: &Event) -> NamedDispatch {
        let Some(_guard) = self.enter() else {
            return NamedDispatch::NotFound;
        };
        let Some(entry) = self
            .snapshot()
            .into_iter()
            .find(|entry| entry.responder.name() == name)
        else {
            return NamedDispatch::NotFound;
        };
        if !entry.responder.responds_to(event) {
            trace!(chain = %self.name, responder = %name, kind = %event.kind, "named entry declined");
            return NamedDispatch::Declined;
        }
        NamedDispatch::Invoked(entry.responder.invoke(event))
    }

    /// Like [`Chain::send_all`], restricted to entries whose
    /// [`Respondable::type_name`] equals `type_name`.
    pub fn send_type(&self, type_name: &str, event: &Event) -> Vec<Event> {
        self.dispatch_matching(event, |entry| entry.responder.type_name() == type_name)
    }

    fn dispatch_matching(&self, event: &Event, filter: impl Fn(&Entry) -> bool) -> Vec<Event> {
        let Some(_guard) = self.enter() else {
            return Vec::new();
        };
        self.snapshot()
            .into_iter()
            .filter(|entry| filter(entry) && entry.responder.responds_to(event))
            .map(|entry| {
                trace!(
                    chain = %self.name,
                    responder = %entry.responder.name(),
                    kind = %event.kind,
                    "invoking"
                );
                entry.responder.invoke(event)
            })
            .collect()
    }

    fn snapshot(&self) -> Vec<Entry> {
        self.entries.read().list.clone()
    }

    fn enter(&self) -> Option<DepthGuard> {
        let guard = DepthGuard::enter(self.max_depth);
        if guard.is_none() {
            warn!(
                chain = %self.name,
                max_depth = self.max_depth,
                "dispatch depth limit reached; chain treated as empty"
            );
        }
        guard
    }
}

impl Respondable for Chain {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn responds_to(&self, event: &Event) -> bool {
        Chain::responds_to(self, event)
    }

    fn invoke(&self, event: &Event) -> Event {
        self.send_first(event).unwrap_or_else(|| event.clone())
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("members", &self.members())
            .finish_non_exhaustive()
    }
}
