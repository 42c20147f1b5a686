//! `switchyard-protocol` – protocol conformance for responders.
//!
//! A protocol is a named set of selectors an object must declare.  The
//! registry answers two questions about an object: does it have the right
//! shape ([`ProtocolRegistry::validate`]) and does it behave correctly
//! ([`ProtocolRegistry::verify`]).
//!
//! # Modules
//!
//! - [`protocol`] – [`Protocol`]: immutable name + required selector set.
//! - [`registry`] – [`ProtocolRegistry`]: thread-safe map of protocols and
//!   their optional [`Verifier`]s.
//! - [`verifiers`] – the [`Verifier`] trait, a closure adapter and the
//!   built-in naming / count / grouping checks.
//! - [`admission`] – [`AdmissionGate`]: runs both checks before adding a
//!   responder to a [`Chain`][switchyard_dispatch::Chain].

pub mod admission;
pub mod protocol;
pub mod registry;
pub mod verifiers;

pub use admission::AdmissionGate;
pub use protocol::Protocol;
pub use registry::ProtocolRegistry;
pub use verifiers::{
    AllOf, FnVerifier, RequiresTogether, RuleViolation, SelectorCount, SelectorNaming, Verifier,
    verifier_fn,
};
