//! [`ProtocolRegistry`] – named protocols with optional verifiers.
//!
//! Offers two tiers of conformance checking:
//!
//! * [`ProtocolRegistry::validate`] – structural: does the object declare
//!   every selector the protocol requires?  Cheap, never runs any code of
//!   the object.
//! * [`ProtocolRegistry::verify`] – semantic: runs the verifier supplied at
//!   registration time.  Protocols registered without a verifier (and
//!   unknown protocols) fail with [`SwitchyardError::NoVerifier`].
//!
//! The registry is safe to share between threads.  Registrations take the
//! write lock; checks take the read lock, and verifiers run after the lock
//! has been released.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use switchyard_dispatch::Selectable;
use switchyard_types::SwitchyardError;
use tracing::{debug, warn};

use crate::protocol::Protocol;
use crate::verifiers::Verifier;

#[derive(Clone)]
struct Registration {
    protocol: Arc<Protocol>,
    verifier: Option<Arc<dyn Verifier>>,
}

/// Maps protocol names to their definitions and verifiers.
///
/// # Example
///
/// ```
/// use switchyard_dispatch::Responder;
/// use switchyard_protocol::{Protocol, ProtocolRegistry, SelectorNaming};
///
/// let registry = ProtocolRegistry::new();
/// registry.register_with_verifier(
///     Protocol::new("greeter", ["greet"]).unwrap(),
///     SelectorNaming::snake_case(),
/// );
///
/// let alice = Responder::new("alice", "person", ())
///     .with_selector("greet", |_, e| e.clone())
///     .unwrap();
///
/// assert!(registry.validate("greeter", &alice));
/// assert!(registry.verify("greeter", &alice).is_ok());
/// assert!(!registry.validate("unknown", &alice));
/// ```
#[derive(Default)]
pub struct ProtocolRegistry {
    entries: RwLock<HashMap<String, Registration>>,
}

impl ProtocolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `protocol` without a verifier, replacing any previous
    /// definition (and verifier) under the same name.
    pub fn register(&self, protocol: Protocol) {
        self.register_with(protocol, None);
    }

    /// Register `protocol` together with its semantic `verifier`.
    pub fn register_with_verifier(&self, protocol: Protocol, verifier: impl Verifier + 'static) {
        self.register_with(protocol, Some(Arc::new(verifier)));
    }

    /// Register `protocol` with an optional shared verifier.
    pub fn register_with(&self, protocol: Protocol, verifier: Option<Arc<dyn Verifier>>) {
        let name = protocol.name().to_string();
        debug!(
            protocol = %name,
            selectors = protocol.selectors().len(),
            verifier = verifier.as_ref().map(|v| v.name()),
            "protocol registered"
        );
        let previous = self.entries.write().insert(
            name.clone(),
            Registration {
                protocol: Arc::new(protocol),
                verifier,
            },
        );
        if previous.is_some() {
            warn!(protocol = %name, "protocol definition replaced");
        }
    }

    /// Remove the protocol registered under `name`.  Returns whether one
    /// was present.
    pub fn unregister(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    /// Structural conformance: `true` iff `name` is registered and `subject`
    /// declares every selector the protocol requires.
    pub fn validate(&self, name: &str, subject: &dyn Selectable) -> bool {
        self.protocol(name)
            .is_some_and(|protocol| protocol.is_satisfied_by(subject.selectors()))
    }

    /// Required selectors of `name` that `subject` does not declare.
    /// `None` when the protocol is not registered.
    pub fn missing_selectors(&self, name: &str, subject: &dyn Selectable) -> Option<Vec<String>> {
        self.protocol(name)
            .map(|protocol| protocol.missing_from(subject.selectors()))
    }

    /// Semantic conformance: run the verifier registered for `name`.
    ///
    /// # Errors
    ///
    /// * [`SwitchyardError::NoVerifier`] when `name` has no verifier,
    ///   including when it is not registered at all.
    /// * [`SwitchyardError::Rejected`] wrapping the verifier's own error,
    ///   unchanged, as its source.
    pub fn verify(&self, name: &str, subject: &dyn Selectable) -> Result<(), SwitchyardError> {
        let verifier = self
            .entries
            .read()
            .get(name)
            .and_then(|registration| registration.verifier.clone());
        let Some(verifier) = verifier else {
            return Err(SwitchyardError::NoVerifier {
                protocol: name.to_string(),
            });
        };
        verifier
            .verify(subject)
            .map_err(|source| SwitchyardError::Rejected {
                protocol: name.to_string(),
                source,
            })
    }

    /// The protocol registered under `name`.
    pub fn protocol(&self, name: &str) -> Option<Arc<Protocol>> {
        self.entries
            .read()
            .get(name)
            .map(|registration| registration.protocol.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn has_verifier(&self, name: &str) -> bool {
        self.entries
            .read()
            .get(name)
            .is_some_and(|registration| registration.verifier.is_some())
    }

    /// Registered protocol names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .finish()
    }
}
