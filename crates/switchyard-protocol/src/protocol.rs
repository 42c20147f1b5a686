//! [`Protocol`] – a named, required set of selectors.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use switchyard_dispatch::SelectorSet;
use switchyard_types::SwitchyardError;

/// A protocol name plus the non-empty set of selectors a conforming object
/// must declare.
///
/// Protocols are immutable; replace one by registering a new definition
/// under the same name.
///
/// # Example
///
/// ```
/// use switchyard_protocol::Protocol;
///
/// let greeter = Protocol::new("greeter", ["greet", "farewell"]).unwrap();
/// assert!(greeter.requires("greet"));
/// assert!(Protocol::new("empty", Vec::<String>::new()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProtocolDef")]
pub struct Protocol {
    name: String,
    selectors: BTreeSet<String>,
}

#[derive(Deserialize)]
struct ProtocolDef {
    name: String,
    selectors: Vec<String>,
}

impl TryFrom<ProtocolDef> for Protocol {
    type Error = SwitchyardError;

    fn try_from(def: ProtocolDef) -> Result<Self, Self::Error> {
        Protocol::new(def.name, def.selectors)
    }
}

impl Protocol {
    /// Build a protocol from a name and its required selectors.  Duplicate
    /// selectors collapse.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchyardError::InvalidProtocol`] when the name is empty,
    /// the selector set is empty, or any selector name is empty.
    pub fn new<I, S>(name: impl Into<String>, selectors: I) -> Result<Self, SwitchyardError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(SwitchyardError::InvalidProtocol(
                "protocol name must not be empty".to_string(),
            ));
        }
        let selectors: BTreeSet<String> = selectors.into_iter().map(Into::into).collect();
        if selectors.is_empty() {
            return Err(SwitchyardError::InvalidProtocol(format!(
                "protocol '{name}' requires at least one selector"
            )));
        }
        if selectors.iter().any(String::is_empty) {
            return Err(SwitchyardError::InvalidProtocol(format!(
                "protocol '{name}' lists an empty selector name"
            )));
        }
        Ok(Self { name, selectors })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required selectors, sorted.
    pub fn selectors(&self) -> &BTreeSet<String> {
        &self.selectors
    }

    pub fn requires(&self, selector: &str) -> bool {
        self.selectors.contains(selector)
    }

    /// Required selectors that `set` does not declare, sorted.
    pub fn missing_from(&self, set: &dyn SelectorSet) -> Vec<String> {
        self.selectors
            .iter()
            .filter(|selector| !set.has_selector(selector))
            .cloned()
            .collect()
    }

    /// `true` when `set` declares every required selector.
    pub fn is_satisfied_by(&self, set: &dyn SelectorSet) -> bool {
        self.selectors.iter().all(|selector| set.has_selector(selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_dispatch::SelectorTable;
    use switchyard_types::Event;

    fn table(selectors: &[&str]) -> SelectorTable<()> {
        let mut t = SelectorTable::new();
        for s in selectors {
            t.register(*s, |_: &(), e: &Event| e.clone()).unwrap();
        }
        t
    }

    #[test]
    fn duplicate_selectors_collapse() {
        let p = Protocol::new("greeter", ["greet", "greet", "farewell"]).unwrap();
        assert_eq!(p.selectors().len(), 2);
        assert_eq!(p.name(), "greeter");
    }

    #[test]
    fn empty_name_is_invalid() {
        assert!(matches!(
            Protocol::new("", ["greet"]),
            Err(SwitchyardError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn empty_selector_set_is_invalid() {
        assert!(matches!(
            Protocol::new("greeter", Vec::<String>::new()),
            Err(SwitchyardError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn empty_selector_name_is_invalid() {
        assert!(matches!(
            Protocol::new("greeter", ["greet", ""]),
            Err(SwitchyardError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn missing_from_lists_absent_selectors() {
        let p = Protocol::new("greeter", ["greet", "farewell", "wave"]).unwrap();
        let t = table(&["greet", "extra"]);
        assert_eq!(p.missing_from(&t), vec!["farewell".to_string(), "wave".to_string()]);
        assert!(!p.is_satisfied_by(&t));

        let full = table(&["greet", "farewell", "wave", "extra"]);
        assert!(p.missing_from(&full).is_empty());
        assert!(p.is_satisfied_by(&full));
    }

    #[test]
    fn deserialize_validates_definition() {
        let ok: Protocol =
            serde_json::from_str(r#"{"name":"greeter","selectors":["greet"]}"#).unwrap();
        assert!(ok.requires("greet"));

        let bad = serde_json::from_str::<Protocol>(r#"{"name":"greeter","selectors":[]}"#);
        assert!(bad.is_err());
    }
}
