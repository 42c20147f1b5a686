//! [`AdmissionGate`] – protocol-checked entry into a chain.
//!
//! Before a responder is allowed to participate in a [`Chain`] under a
//! protocol, [`AdmissionGate::admit`] runs the registry's two checks in
//! order:
//!
//! 1. **Structural** ([`ProtocolRegistry::validate`]): the responder must
//!    declare every selector the protocol requires.  Failures return
//!    [`SwitchyardError::NotConformant`] listing the missing selectors.
//! 2. **Semantic** ([`ProtocolRegistry::verify`]): the protocol's verifier,
//!    if one is registered, must accept the responder.  A protocol without a
//!    verifier has no semantic policy and is admitted on shape alone.
//!
//! Only when both pass is the responder added to the chain.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use switchyard_dispatch::{Chain, Responder};
//! use switchyard_protocol::{AdmissionGate, Protocol, ProtocolRegistry};
//!
//! let registry = Arc::new(ProtocolRegistry::new());
//! registry.register(Protocol::new("greeter", ["greet"]).unwrap());
//! let gate = AdmissionGate::new(registry);
//!
//! let chain = Chain::new("root");
//! let alice = Responder::new("alice", "person", ())
//!     .with_selector("greet", |_, e| e.clone())
//!     .unwrap();
//! let mute = Responder::new("mute", "person", ());
//!
//! assert!(gate.admit(&chain, Arc::new(alice), "greeter", 0).is_ok());
//! assert!(gate.admit(&chain, Arc::new(mute), "greeter", 0).is_err());
//! assert_eq!(chain.len(), 1);
//! ```

use std::sync::Arc;

use switchyard_dispatch::{Chain, Respondable, Selectable, Token};
use switchyard_types::SwitchyardError;
use tracing::{debug, info};

use crate::registry::ProtocolRegistry;

/// Admits responders into chains only when they conform to a protocol.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    registry: Arc<ProtocolRegistry>,
}

impl AdmissionGate {
    pub fn new(registry: Arc<ProtocolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProtocolRegistry> {
        &self.registry
    }

    /// Run the structural and semantic checks of `protocol` against
    /// `subject` without touching any chain.
    ///
    /// # Errors
    ///
    /// * [`SwitchyardError::UnknownProtocol`] – `protocol` is not registered.
    /// * [`SwitchyardError::NotConformant`] – required selectors are missing.
    /// * [`SwitchyardError::Rejected`] – the protocol's verifier said no.
    pub fn check(&self, protocol: &str, subject: &dyn Selectable) -> Result<(), SwitchyardError> {
        let Some(missing) = self.registry.missing_selectors(protocol, subject) else {
            return Err(SwitchyardError::UnknownProtocol(protocol.to_string()));
        };
        if !missing.is_empty() {
            return Err(SwitchyardError::NotConformant {
                protocol: protocol.to_string(),
                missing,
            });
        }
        match self.registry.verify(protocol, subject) {
            Err(err) if err.is_no_verifier() => {
                debug!(protocol, "no verifier registered; structural check only");
                Ok(())
            }
            other => other,
        }
    }

    /// Check `responder` against `protocol` and, when it conforms, add it to
    /// `chain` with `priority`.
    ///
    /// # Errors
    ///
    /// Any error of [`AdmissionGate::check`], plus the errors of
    /// [`Chain::add_with_priority`].
    pub fn admit<R>(
        &self,
        chain: &Chain,
        responder: Arc<R>,
        protocol: &str,
        priority: i32,
    ) -> Result<Token, SwitchyardError>
    where
        R: Respondable + Selectable + 'static,
    {
        self.check(protocol, &*responder)?;
        let token = chain.add_with_priority(responder.clone(), priority)?;
        info!(
            chain = %Respondable::name(chain),
            responder = %responder.name(),
            protocol,
            priority,
            "responder admitted"
        );
        Ok(token)
    }
}
