//! `switchyard-dispatch` – selectors, responders and priority chains.
//!
//! Routes events between independent in-process objects.  Delivery is
//! synchronous and runs on the caller's thread.
//!
//! # Modules
//!
//! - [`selector`] – [`SelectorTable`]: per-object mapping from selector name
//!   to handler, plus the [`SelectorSet`] / [`Selectable`] view used for
//!   protocol conformance checks.
//! - [`respondable`] – [`Respondable`]: the capability contract every chain
//!   participant implements.
//! - [`responder`] – [`Responder`]: a leaf respondable whose behaviour is
//!   defined by its selector table.
//! - [`chain`] – [`Chain`]: priority-sorted, nestable collection of
//!   respondables with first / all / named / by-type dispatch.

pub mod chain;
pub mod respondable;
pub mod responder;
pub mod selector;

pub use chain::{Chain, Member, NamedDispatch, Token, DEFAULT_MAX_DEPTH, DEFAULT_PRIORITY};
pub use respondable::{Respondable, same_responder};
pub use responder::Responder;
pub use selector::{Handler, Selectable, SelectorSet, SelectorTable};
