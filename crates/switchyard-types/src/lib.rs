//! `switchyard-types` – shared vocabulary for the Switchyard dispatch core.
//!
//! Every layer of the workspace speaks in terms of the [`Event`] value and
//! the [`SwitchyardError`] type defined here.  Events are immutable once
//! constructed: responders never modify the event they are handed, they
//! return a new one (usually derived with [`Event::respond`] or
//! [`Event::fail`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Opaque error produced by a protocol verifier.
///
/// The core never interprets it; it is carried as the `source` of
/// [`SwitchyardError::Rejected`] so callers can downcast to their own type.
pub type VerifyError = Box<dyn std::error::Error + Send + Sync>;

/// An immutable occurrence routed through responder chains.
///
/// `kind` is the selector used for routing: a leaf responder responds to an
/// event when it exposes a selector with exactly that name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Routing selector, e.g. `"greet"` or `"battery.low"`.
    pub kind: String,
    /// Free-form origin label, e.g. `"switchyard-cli"`.
    pub source: String,
    pub payload: EventPayload,
}

/// Variants of data an [`Event`] can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    /// A bare signal with no body.
    Empty,
    /// A generic message body.
    Message(Value),
    /// A response paired with the request it answers.
    Response { request_id: Uuid, body: Value },
    /// A responder-encoded failure for the request it answers.
    Failure { request_id: Uuid, error: String },
}

impl Event {
    /// Create an event of the given kind with an [`EventPayload::Empty`]
    /// payload, stamped with a fresh id and the current time.
    pub fn new(kind: impl Into<String>) -> Self {
        Self::with_payload(kind, EventPayload::Empty)
    }

    /// Create an event carrying an [`EventPayload::Message`] body.
    pub fn message(kind: impl Into<String>, body: Value) -> Self {
        Self::with_payload(kind, EventPayload::Message(body))
    }

    fn with_payload(kind: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: kind.into(),
            source: String::new(),
            payload,
        }
    }

    /// Set the origin label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Derive a response to this event.
    ///
    /// The response keeps this event's `kind`, gets its own id and
    /// timestamp, and references this event through `request_id`.
    pub fn respond(&self, source: impl Into<String>, body: Value) -> Event {
        Self::with_payload(
            self.kind.clone(),
            EventPayload::Response {
                request_id: self.id,
                body,
            },
        )
        .with_source(source)
    }

    /// Derive a failure response to this event.
    pub fn fail(&self, source: impl Into<String>, error: impl Into<String>) -> Event {
        Self::with_payload(
            self.kind.clone(),
            EventPayload::Failure {
                request_id: self.id,
                error: error.into(),
            },
        )
        .with_source(source)
    }

    /// The id of the request this event answers, if it is a response or a
    /// failure.
    pub fn request_id(&self) -> Option<Uuid> {
        match &self.payload {
            EventPayload::Response { request_id, .. } | EventPayload::Failure { request_id, .. } => {
                Some(*request_id)
            }
            _ => None,
        }
    }

    /// Whether this event encodes a responder failure.
    pub fn is_failure(&self) -> bool {
        matches!(self.payload, EventPayload::Failure { .. })
    }
}

/// Global error type spanning selector registration, chain membership,
/// protocol conformance and the CLI configuration layer.
///
/// "Not found" outcomes of dispatch and structural validation are not
/// errors; they are reported through `Option`, `bool` and
/// `NamedDispatch` return values instead.
#[derive(Error, Debug)]
pub enum SwitchyardError {
    #[error("selector name must not be empty")]
    EmptySelector,

    #[error("responder name must not be empty")]
    EmptyName,

    #[error("chain '{chain}' cannot contain itself")]
    SelfContainment { chain: String },

    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("protocol '{0}' is not registered")]
    UnknownProtocol(String),

    #[error("subject does not conform to protocol '{protocol}': missing {missing:?}")]
    NotConformant {
        protocol: String,
        missing: Vec<String>,
    },

    #[error("no verifier registered for protocol '{protocol}'")]
    NoVerifier { protocol: String },

    #[error("protocol '{protocol}' rejected subject: {source}")]
    Rejected {
        protocol: String,
        #[source]
        source: VerifyError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("topology error: {0}")]
    Topology(String),
}

impl SwitchyardError {
    /// `true` for [`SwitchyardError::NoVerifier`], i.e. "no policy defined"
    /// as opposed to "policy check failed".
    pub fn is_no_verifier(&self) -> bool {
        matches!(self, SwitchyardError::NoVerifier { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_event_is_empty_and_unsourced() {
        let event = Event::new("greet");
        assert_eq!(event.kind, "greet");
        assert!(event.source.is_empty());
        assert_eq!(event.payload, EventPayload::Empty);
        assert_eq!(event.request_id(), None);
    }

    #[test]
    fn respond_pairs_with_request() {
        let request = Event::message("greet", json!({"who": "world"})).with_source("test");
        let response = request.respond("alice", json!("hello"));

        assert_eq!(response.kind, "greet");
        assert_eq!(response.source, "alice");
        assert_ne!(response.id, request.id);
        assert_eq!(response.request_id(), Some(request.id));
        assert!(!response.is_failure());
    }

    #[test]
    fn fail_is_flagged_as_failure() {
        let request = Event::new("charge");
        let failure = request.fail("dock", "no power");
        assert!(failure.is_failure());
        assert_eq!(failure.request_id(), Some(request.id));
        match failure.payload {
            EventPayload::Failure { error, .. } => assert_eq!(error, "no power"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn event_serializes_with_tagged_payload() {
        let event = Event::message("greet", json!(42));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "greet");
        assert_eq!(value["payload"]["type"], "Message");
        assert_eq!(value["payload"]["data"], 42);

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn error_display_names_protocol() {
        let err = SwitchyardError::NoVerifier {
            protocol: "greeter".to_string(),
        };
        assert!(err.is_no_verifier());
        assert!(err.to_string().contains("greeter"));

        let err = SwitchyardError::NotConformant {
            protocol: "greeter".to_string(),
            missing: vec!["farewell".to_string()],
        };
        assert!(!err.is_no_verifier());
        assert!(err.to_string().contains("farewell"));
    }

    #[test]
    fn rejected_keeps_verifier_error_as_source() {
        use std::error::Error as _;

        #[derive(Debug)]
        struct Custom;
        impl std::fmt::Display for Custom {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "custom failure")
            }
        }
        impl std::error::Error for Custom {}

        let err = SwitchyardError::Rejected {
            protocol: "greeter".to_string(),
            source: Box::new(Custom),
        };
        assert!(err.to_string().contains("custom failure"));
        let source = err.source().expect("source");
        assert!(source.downcast_ref::<Custom>().is_some());
    }
}
