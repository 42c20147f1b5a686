//! The [`Respondable`] capability contract.
//!
//! Every participant in a [`Chain`][crate::chain::Chain] implements this
//! trait, leaf responders and chains alike, which is what allows chains to
//! nest inside one another.

use std::sync::Arc;

use switchyard_types::Event;

/// An object capable of receiving and reacting to an [`Event`].
pub trait Respondable: Send + Sync {
    /// Identifier that is unique among the siblings of a chain.
    ///
    /// [`Chain::send_named`][crate::chain::Chain::send_named] relies on this
    /// uniqueness; with duplicate sibling names it may pick either entry.
    fn name(&self) -> &str;

    /// Caller-defined classification used by
    /// [`Chain::send_type`][crate::chain::Chain::send_type].
    fn type_name(&self) -> &str;

    /// Whether this object wants to handle `event`.
    ///
    /// Must be a pure predicate: chains may call it any number of times.
    fn responds_to(&self, event: &Event) -> bool;

    /// Handle `event` and return the resulting event.
    ///
    /// Failures are encoded in the returned event (see [`Event::fail`]); a
    /// responder never reports an error to the chain.
    fn invoke(&self, event: &Event) -> Event;
}

/// Identity comparison for shared responders.
///
/// Compares the data pointers only, so two `Arc`s of the same allocation are
/// equal even when they were coerced through different vtables.
pub fn same_responder<A, B>(a: &Arc<A>, b: &Arc<B>) -> bool
where
    A: ?Sized,
    B: ?Sized,
{
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
