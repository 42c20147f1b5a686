//! Semantic protocol checks.
//!
//! A [`Verifier`] is attached to a protocol at registration time and
//! decides whether an object actually satisfies the protocol, beyond simply
//! declaring the right selectors.  Any closure of the shape
//! `Fn(&dyn Selectable) -> Result<(), VerifyError>` can be used through
//! [`verifier_fn`].
//!
//! Built-in verifiers:
//! - [`SelectorNaming`] – every declared selector follows `snake_case`,
//!   optionally with a required prefix.
//! - [`SelectorCount`] – the number of declared selectors lies in a range.
//! - [`RequiresTogether`] – selectors that only make sense as a group are
//!   declared all together or not at all.
//! - [`AllOf`] – runs several verifiers in order; the first failure wins.

use std::sync::Arc;

use switchyard_dispatch::Selectable;
use switchyard_types::VerifyError;
use thiserror::Error;

/// A semantic check run by [`ProtocolRegistry::verify`][crate::ProtocolRegistry::verify].
pub trait Verifier: Send + Sync {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Return `Ok(())` when `subject` satisfies the check.
    fn verify(&self, subject: &dyn Selectable) -> Result<(), VerifyError>;
}

/// Violation reported by the built-in verifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{rule}: {details}")]
pub struct RuleViolation {
    pub rule: String,
    pub details: String,
}

impl RuleViolation {
    fn boxed(rule: &str, details: String) -> VerifyError {
        Box::new(Self {
            rule: rule.to_string(),
            details,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Closure adapter
// ────────────────────────────────────────────────────────────────────────────

/// A [`Verifier`] backed by a closure.
pub struct FnVerifier<F> {
    name: String,
    check: F,
}

/// Wrap `check` as a named [`Verifier`].
///
/// # Example
///
/// ```
/// use switchyard_dispatch::{Responder, Selectable};
/// use switchyard_protocol::verifiers::{verifier_fn, Verifier};
///
/// let at_least_two = verifier_fn("at_least_two", |subject: &dyn Selectable| {
///     if subject.selectors().len() >= 2 {
///         Ok(())
///     } else {
///         Err("too few selectors".into())
///     }
/// });
///
/// let lonely = Responder::new("lonely", "demo", ())
///     .with_selector("only", |_, e| e.clone())
///     .unwrap();
/// assert!(at_least_two.verify(&lonely).is_err());
/// ```
pub fn verifier_fn<F>(name: impl Into<String>, check: F) -> FnVerifier<F>
where
    F: Fn(&dyn Selectable) -> Result<(), VerifyError> + Send + Sync,
{
    FnVerifier {
        name: name.into(),
        check,
    }
}

impl<F> Verifier for FnVerifier<F>
where
    F: Fn(&dyn Selectable) -> Result<(), VerifyError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn verify(&self, subject: &dyn Selectable) -> Result<(), VerifyError> {
        (self.check)(subject)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in verifiers
// ────────────────────────────────────────────────────────────────────────────

/// Requires every declared selector to be lower `snake_case`
/// (`[a-z][a-z0-9_]*`) and, when `prefix` is set, to start with it.
#[derive(Debug, Clone, Default)]
pub struct SelectorNaming {
    pub prefix: Option<String>,
}

impl SelectorNaming {
    pub fn snake_case() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

fn is_snake_case(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl Verifier for SelectorNaming {
    fn name(&self) -> &str {
        "selector_naming"
    }

    fn verify(&self, subject: &dyn Selectable) -> Result<(), VerifyError> {
        for selector in subject.selectors().selector_names() {
            if !is_snake_case(selector) {
                return Err(RuleViolation::boxed(
                    self.name(),
                    format!("selector '{selector}' is not snake_case"),
                ));
            }
            if let Some(prefix) = &self.prefix
                && !selector.starts_with(prefix.as_str())
            {
                return Err(RuleViolation::boxed(
                    self.name(),
                    format!("selector '{selector}' lacks prefix '{prefix}'"),
                ));
            }
        }
        Ok(())
    }
}

/// Requires the number of declared selectors to lie in `[min, max]`
/// (inclusive).
#[derive(Debug, Clone, Copy)]
pub struct SelectorCount {
    pub min: usize,
    pub max: usize,
}

impl Verifier for SelectorCount {
    fn name(&self) -> &str {
        "selector_count"
    }

    fn verify(&self, subject: &dyn Selectable) -> Result<(), VerifyError> {
        let count = subject.selectors().len();
        if count < self.min || count > self.max {
            return Err(RuleViolation::boxed(
                self.name(),
                format!("{count} selectors declared, expected {}..={}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Requires the listed selectors to be declared all together: declaring
/// any one of them without the others is a violation.
#[derive(Debug, Clone)]
pub struct RequiresTogether {
    pub selectors: Vec<String>,
}

impl RequiresTogether {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }
}

impl Verifier for RequiresTogether {
    fn name(&self) -> &str {
        "requires_together"
    }

    fn verify(&self, subject: &dyn Selectable) -> Result<(), VerifyError> {
        let set = subject.selectors();
        let (present, absent): (Vec<&String>, Vec<&String>) =
            self.selectors.iter().partition(|s| set.has_selector(s));
        if !present.is_empty() && !absent.is_empty() {
            return Err(RuleViolation::boxed(
                self.name(),
                format!("{present:?} declared without {absent:?}"),
            ));
        }
        Ok(())
    }
}

/// Runs verifiers in insertion order and returns the first failure.
#[derive(Default)]
pub struct AllOf {
    verifiers: Vec<Arc<dyn Verifier>>,
}

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, verifier: impl Verifier + 'static) -> Self {
        self.verifiers.push(Arc::new(verifier));
        self
    }

    pub fn push(&mut self, verifier: Arc<dyn Verifier>) {
        self.verifiers.push(verifier);
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

impl Verifier for AllOf {
    fn name(&self) -> &str {
        "all_of"
    }

    fn verify(&self, subject: &dyn Selectable) -> Result<(), VerifyError> {
        for verifier in &self.verifiers {
            verifier.verify(subject)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_dispatch::Responder;

    fn subject(selectors: &[&str]) -> Responder {
        let mut r = Responder::new("subject", "test", ());
        for s in selectors {
            r.register(*s, |_, e| e.clone()).unwrap();
        }
        r
    }

    fn violation(err: VerifyError) -> RuleViolation {
        err.downcast_ref::<RuleViolation>()
            .cloned()
            .expect("built-in verifiers report RuleViolation")
    }

    // ------------------------------------------------------------------ SelectorNaming

    #[test]
    fn snake_case_selectors_pass() {
        let v = SelectorNaming::snake_case();
        assert!(v.verify(&subject(&["greet", "say_hello", "v2_ping"])).is_ok());
    }

    #[test]
    fn non_snake_case_selector_fails() {
        let v = SelectorNaming::snake_case();
        let err = violation(v.verify(&subject(&["greet", "SayHello"])).unwrap_err());
        assert_eq!(err.rule, "selector_naming");
        assert!(err.details.contains("SayHello"));

        assert!(v.verify(&subject(&["9lives"])).is_err());
        assert!(v.verify(&subject(&["kebab-case"])).is_err());
    }

    #[test]
    fn prefix_is_enforced() {
        let v = SelectorNaming::with_prefix("nav_");
        assert!(v.verify(&subject(&["nav_go", "nav_stop"])).is_ok());
        let err = violation(v.verify(&subject(&["nav_go", "stop"])).unwrap_err());
        assert!(err.details.contains("nav_"));
    }

    // ------------------------------------------------------------------ SelectorCount

    #[test]
    fn count_within_range_passes() {
        let v = SelectorCount { min: 1, max: 2 };
        assert!(v.verify(&subject(&["a"])).is_ok());
        assert!(v.verify(&subject(&["a", "b"])).is_ok());
    }

    #[test]
    fn count_outside_range_fails() {
        let v = SelectorCount { min: 1, max: 2 };
        assert!(v.verify(&subject(&[])).is_err());
        let err = violation(v.verify(&subject(&["a", "b", "c"])).unwrap_err());
        assert_eq!(err.rule, "selector_count");
    }

    // ------------------------------------------------------------------ RequiresTogether

    #[test]
    fn group_declared_together_passes() {
        let v = RequiresTogether::new(["open", "close"]);
        assert!(v.verify(&subject(&["open", "close", "other"])).is_ok());
        assert!(v.verify(&subject(&["other"])).is_ok());
    }

    #[test]
    fn partial_group_fails() {
        let v = RequiresTogether::new(["open", "close"]);
        let err = violation(v.verify(&subject(&["open"])).unwrap_err());
        assert!(err.details.contains("close"));
    }

    // ------------------------------------------------------------------ AllOf / closures

    #[test]
    fn all_of_short_circuits_on_first_failure() {
        let v = AllOf::new()
            .with(SelectorCount { min: 0, max: 1 })
            .with(SelectorNaming::snake_case());
        assert_eq!(v.len(), 2);

        let err = violation(v.verify(&subject(&["Bad", "worse"])).unwrap_err());
        assert_eq!(err.rule, "selector_count");
    }

    #[test]
    fn empty_all_of_passes() {
        let v = AllOf::new();
        assert!(v.is_empty());
        assert!(v.verify(&subject(&["Anything"])).is_ok());
    }

    #[test]
    fn closure_verifier_reports_its_own_error() {
        let v = verifier_fn("has_greet", |s: &dyn Selectable| {
            if s.selectors().has_selector("greet") {
                Ok(())
            } else {
                Err("greet missing".into())
            }
        });
        assert_eq!(v.name(), "has_greet");
        assert!(v.verify(&subject(&["greet"])).is_ok());
        let err = v.verify(&subject(&["wave"])).unwrap_err();
        assert_eq!(err.to_string(), "greet missing");
    }
}
