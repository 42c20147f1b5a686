//! Topology files: protocols, responders and chains declared in TOML.
//!
//! ```toml
//! [[protocols]]
//! name = "greeter"
//! selectors = ["greet"]
//! verifiers = ["snake_case", "count:1:4"]
//!
//! [[responders]]
//! name = "alice"
//! type = "person"
//! conforms_to = ["greeter"]
//! [responders.selectors]
//! greet = "hello from alice"
//!
//! [[chains]]
//! name = "root"
//! members = [{ name = "alice", priority = 10 }]
//! ```
//!
//! Member names refer to a responder or to another chain.  Responders that
//! declare `conforms_to` enter chains through an [`AdmissionGate`] for their
//! first protocol; admission failures are collected in
//! [`Topology::rejections`] instead of aborting the build.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use switchyard_dispatch::{Chain, Respondable, Responder};
use switchyard_protocol::{
    AdmissionGate, AllOf, Protocol, ProtocolRegistry, RequiresTogether, SelectorCount,
    SelectorNaming, Verifier,
};
use switchyard_types::SwitchyardError;
use tracing::{debug, warn};

use crate::config::Config;

// ─────────────────────────────────────────────────────────────────────────────
// File format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyFile {
    #[serde(default)]
    pub protocols: Vec<ProtocolDecl>,
    #[serde(default)]
    pub responders: Vec<ResponderDecl>,
    #[serde(default)]
    pub chains: Vec<ChainDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolDecl {
    pub name: String,
    pub selectors: Vec<String>,
    #[serde(default)]
    pub verifier: Option<String>,
    #[serde(default)]
    pub verifiers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderDecl {
    pub name: String,
    #[serde(rename = "type", default = "default_responder_type")]
    pub type_name: String,
    /// Selector name to reply body.
    #[serde(default)]
    pub selectors: BTreeMap<String, Value>,
    /// Selector name to failure message.
    #[serde(default)]
    pub failures: BTreeMap<String, String>,
    #[serde(default)]
    pub conforms_to: Vec<String>,
}

fn default_responder_type() -> String {
    "responder".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainDecl {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberDecl {
    pub name: String,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Parse a built-in verifier descriptor.
///
/// | Descriptor | Verifier |
/// |---|---|
/// | `snake_case` | [`SelectorNaming::snake_case`] |
/// | `prefix:<p>` | [`SelectorNaming::with_prefix`] |
/// | `count:<min>:<max>` | [`SelectorCount`] |
/// | `together:<a>,<b>,...` | [`RequiresTogether`] |
pub fn parse_verifier(descriptor: &str) -> Result<Arc<dyn Verifier>, SwitchyardError> {
    let bad = || SwitchyardError::Topology(format!("unknown verifier '{descriptor}'"));
    let (kind, arg) = match descriptor.split_once(':') {
        Some((kind, arg)) => (kind, Some(arg)),
        None => (descriptor, None),
    };
    match (kind, arg) {
        ("snake_case", None) => Ok(Arc::new(SelectorNaming::snake_case())),
        ("prefix", Some(prefix)) if !prefix.is_empty() => {
            Ok(Arc::new(SelectorNaming::with_prefix(prefix)))
        }
        ("count", Some(bounds)) => {
            let (min, max) = bounds.split_once(':').ok_or_else(bad)?;
            let min = min.trim().parse::<usize>().map_err(|_| bad())?;
            let max = max.trim().parse::<usize>().map_err(|_| bad())?;
            if min > max {
                return Err(bad());
            }
            Ok(Arc::new(SelectorCount { min, max }))
        }
        ("together", Some(list)) => {
            let selectors: Vec<&str> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if selectors.len() < 2 {
                return Err(bad());
            }
            Ok(Arc::new(RequiresTogether::new(selectors)))
        }
        _ => Err(bad()),
    }
}

impl ProtocolDecl {
    fn verifier(&self) -> Result<Option<Arc<dyn Verifier>>, SwitchyardError> {
        let mut descriptors: Vec<&str> = self.verifier.iter().map(String::as_str).collect();
        descriptors.extend(self.verifiers.iter().map(String::as_str));

        let mut parsed = descriptors
            .into_iter()
            .map(parse_verifier)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match parsed.len() {
            0 => None,
            1 => parsed.pop(),
            _ => {
                let mut all = AllOf::new();
                for verifier in parsed {
                    all.push(verifier);
                }
                let all: Arc<dyn Verifier> = Arc::new(all);
                Some(all)
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built topology
// ─────────────────────────────────────────────────────────────────────────────

/// A chain member that failed protocol admission.
#[derive(Debug)]
pub struct Rejection {
    pub chain: String,
    pub member: String,
    pub error: SwitchyardError,
}

/// Outcome of the semantic check for one responder/protocol pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    NoVerifier,
    Rejected(String),
}

/// Conformance of one responder to one declared protocol.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub responder: String,
    pub protocol: String,
    /// `false` when the protocol is not registered.
    pub known: bool,
    pub missing: Vec<String>,
    pub verdict: Verdict,
}

impl ConformanceReport {
    pub fn is_ok(&self) -> bool {
        self.known && self.missing.is_empty() && !matches!(self.verdict, Verdict::Rejected(_))
    }
}

/// Live objects built from a [`TopologyFile`].
pub struct Topology {
    registry: Arc<ProtocolRegistry>,
    responders: BTreeMap<String, Arc<Responder>>,
    conforms_to: BTreeMap<String, Vec<String>>,
    chains: HashMap<String, Arc<Chain>>,
    chain_order: Vec<String>,
    rejections: Vec<Rejection>,
}

impl Topology {
    /// Read and build the topology at `path`.
    pub fn load(path: &Path, cfg: &Config) -> Result<Self, SwitchyardError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SwitchyardError::Topology(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw, cfg)
    }

    pub fn from_toml_str(raw: &str, cfg: &Config) -> Result<Self, SwitchyardError> {
        let file: TopologyFile = toml::from_str(raw)
            .map_err(|e| SwitchyardError::Topology(format!("failed to parse topology: {e}")))?;
        Self::build(file, cfg)
    }

    /// Wire up the declared objects.
    ///
    /// # Errors
    ///
    /// [`SwitchyardError::Topology`] for empty or duplicate names, unknown member
    /// references, chain cycles and malformed verifier descriptors;
    /// [`SwitchyardError::InvalidProtocol`] for malformed protocols.
    pub fn build(file: TopologyFile, cfg: &Config) -> Result<Self, SwitchyardError> {
        let registry = Arc::new(ProtocolRegistry::new());
        for decl in &file.protocols {
            if registry.contains(&decl.name) {
                return Err(SwitchyardError::Topology(format!(
                    "protocol '{}' declared twice",
                    decl.name
                )));
            }
            let protocol = Protocol::new(decl.name.clone(), decl.selectors.iter().cloned())?;
            registry.register_with(protocol, decl.verifier()?);
        }

        let mut names = HashSet::new();
        let mut responders = BTreeMap::new();
        let mut conforms_to = BTreeMap::new();
        for decl in file.responders {
            check_name("responder", &decl.name)?;
            if !names.insert(decl.name.clone()) {
                return Err(duplicate(&decl.name));
            }
            conforms_to.insert(decl.name.clone(), decl.conforms_to.clone());
            responders.insert(decl.name.clone(), Arc::new(build_responder(decl)?));
        }

        let mut chains = HashMap::new();
        let mut chain_order = Vec::new();
        for decl in &file.chains {
            check_name("chain", &decl.name)?;
            if !names.insert(decl.name.clone()) {
                return Err(duplicate(&decl.name));
            }
            let mut chain = Chain::new(decl.name.clone())
                .with_default_priority(cfg.default_priority)
                .with_max_depth(cfg.max_dispatch_depth);
            if let Some(type_name) = &decl.type_name {
                chain = chain.with_type_name(type_name.clone());
            }
            chains.insert(decl.name.clone(), Arc::new(chain));
            chain_order.push(decl.name.clone());
        }

        for decl in &file.chains {
            for member in &decl.members {
                if !names.contains(&member.name) {
                    return Err(SwitchyardError::Topology(format!(
                        "chain '{}' references unknown member '{}'",
                        decl.name, member.name
                    )));
                }
            }
        }
        detect_cycles(&file.chains)?;

        let mut topology = Self {
            registry,
            responders,
            conforms_to,
            chains,
            chain_order,
            rejections: Vec::new(),
        };
        for decl in &file.chains {
            topology.populate(decl)?;
        }
        Ok(topology)
    }

    fn populate(&mut self, decl: &ChainDecl) -> Result<(), SwitchyardError> {
        let Some(chain) = self.chains.get(&decl.name).cloned() else {
            return Ok(());
        };
        let gate = AdmissionGate::new(self.registry.clone());

        for member in &decl.members {
            let priority = member.priority.unwrap_or(chain.default_priority());

            if let Some(nested) = self.chains.get(&member.name) {
                chain.add_with_priority(nested.clone(), priority)?;
                continue;
            }
            let Some(responder) = self.responders.get(&member.name).cloned() else {
                continue;
            };
            let protocols = self
                .conforms_to
                .get(&member.name)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let admitted = match protocols.split_first() {
                None => chain.add_with_priority(responder, priority).map(drop),
                Some((first, rest)) => rest
                    .iter()
                    .try_for_each(|protocol| gate.check(protocol, &*responder))
                    .and_then(|()| gate.admit(&chain, responder, first, priority).map(drop)),
            };
            if let Err(error) = admitted {
                warn!(chain = %decl.name, member = %member.name, %error, "member not admitted");
                self.rejections.push(Rejection {
                    chain: decl.name.clone(),
                    member: member.name.clone(),
                    error,
                });
            }
        }
        debug!(chain = %decl.name, members = chain.len(), "chain populated");
        Ok(())
    }

    pub fn registry(&self) -> &Arc<ProtocolRegistry> {
        &self.registry
    }

    pub fn chain(&self, name: &str) -> Option<&Arc<Chain>> {
        self.chains.get(name)
    }

    /// The first chain declared in the file.
    pub fn default_chain(&self) -> Option<&Arc<Chain>> {
        self.chain_order.first().and_then(|name| self.chains.get(name))
    }

    pub fn chain_names(&self) -> &[String] {
        &self.chain_order
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    /// Check every responder against each protocol it declares.
    pub fn conformance(&self) -> Vec<ConformanceReport> {
        let mut reports = Vec::new();
        for (name, protocols) in &self.conforms_to {
            let Some(responder) = self.responders.get(name) else {
                continue;
            };
            for protocol in protocols {
                let missing = self.registry.missing_selectors(protocol, &**responder);
                let verdict = match self.registry.verify(protocol, &**responder) {
                    Ok(()) => Verdict::Passed,
                    Err(err) if err.is_no_verifier() => Verdict::NoVerifier,
                    Err(err) => Verdict::Rejected(err.to_string()),
                };
                reports.push(ConformanceReport {
                    responder: name.clone(),
                    protocol: protocol.clone(),
                    known: missing.is_some(),
                    missing: missing.unwrap_or_default(),
                    verdict,
                });
            }
        }
        reports
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), SwitchyardError> {
    if name.trim().is_empty() {
        return Err(SwitchyardError::Topology(format!("{kind} name must not be empty")));
    }
    Ok(())
}

fn duplicate(name: &str) -> SwitchyardError {
    SwitchyardError::Topology(format!("name '{name}' declared more than once"))
}

fn build_responder(decl: ResponderDecl) -> Result<Responder, SwitchyardError> {
    let mut responder = Responder::new(decl.name, decl.type_name, ());
    for (selector, body) in decl.selectors {
        responder.register(selector, move |me, event| {
            event.respond(me.name(), body.clone())
        })?;
    }
    for (selector, error) in decl.failures {
        responder.register(selector, move |me, event| event.fail(me.name(), error.clone()))?;
    }
    Ok(responder)
}

/// Reject chains that contain themselves, directly or through other chains.
fn detect_cycles(chains: &[ChainDecl]) -> Result<(), SwitchyardError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), SwitchyardError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                path.push(name);
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                return Err(SwitchyardError::Topology(format!(
                    "chain cycle: {}",
                    path[start..].join(" -> ")
                )));
            }
            None => {}
        }
        marks.insert(name, Mark::Visiting);
        path.push(name);
        for next in edges.get(name).into_iter().flatten() {
            visit(*next, edges, marks, path)?;
        }
        path.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    let chain_names: HashSet<&str> = chains.iter().map(|c| c.name.as_str()).collect();
    let edges: HashMap<&str, Vec<&str>> = chains
        .iter()
        .map(|c| {
            let nested = c
                .members
                .iter()
                .map(|m| m.name.as_str())
                .filter(|m| chain_names.contains(m))
                .collect();
            (c.name.as_str(), nested)
        })
        .collect();

    let mut marks = HashMap::new();
    for chain in chains {
        visit(&chain.name, &edges, &mut marks, &mut Vec::new())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_dispatch::NamedDispatch;
    use switchyard_types::{Event, EventPayload};

    const SAMPLE: &str = r#"
[[protocols]]
name = "greeter"
selectors = ["greet"]
verifier = "snake_case"

[[protocols]]
name = "pinger"
selectors = ["ping"]

[[responders]]
name = "alice"
type = "person"
conforms_to = ["greeter"]
[responders.selectors]
greet = "hello from alice"

[[responders]]
name = "bob"
type = "person"
conforms_to = ["greeter"]
[responders.selectors]
greet = { text = "hi" }
BadName = 1

[[responders]]
name = "pong"
type = "service"
[responders.selectors]
ping = "pong"
[responders.failures]
greet = "not a greeter"

[[chains]]
name = "root"
members = [
    { name = "alice", priority = 1 },
    { name = "bob", priority = 5 },
    { name = "services" },
]

[[chains]]
name = "services"
type = "group"
members = [{ name = "pong" }]
"#;

    fn build(raw: &str) -> Result<Topology, SwitchyardError> {
        Topology::from_toml_str(raw, &Config::default())
    }

    #[test]
    fn sample_topology_builds() {
        let topology = build(SAMPLE).expect("build");
        assert_eq!(topology.chain_names(), ["root", "services"]);
        assert_eq!(topology.registry().len(), 2);
        assert_eq!(topology.default_chain().unwrap().len(), 2);
        assert_eq!(topology.chain("services").unwrap().type_name(), "group");
    }

    #[test]
    fn verifier_rejection_is_recorded_not_fatal() {
        let topology = build(SAMPLE).expect("build");
        let rejections = topology.rejections();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].member, "bob");
        assert!(matches!(rejections[0].error, SwitchyardError::Rejected { .. }));
    }

    #[test]
    fn dispatch_through_built_chains() {
        let topology = build(SAMPLE).expect("build");
        let root = topology.default_chain().unwrap();

        let reply = root.send_first(&Event::new("greet")).unwrap();
        assert_eq!(reply.source, "alice");
        assert!(matches!(
            reply.payload,
            EventPayload::Response { ref body, .. } if body == "hello from alice"
        ));

        // Failure handlers on nested responders are reachable too.
        let all = root.send_all(&Event::new("greet"));
        assert_eq!(all.len(), 2);
        assert!(all[1].is_failure());

        assert_eq!(root.send_first(&Event::new("ping")).unwrap().source, "pong");
        assert!(matches!(
            root.send_named("services", &Event::new("ping")),
            NamedDispatch::Invoked(_)
        ));
        assert_eq!(root.send_type("person", &Event::new("greet")).len(), 1);
    }

    #[test]
    fn default_priority_comes_from_config() {
        let cfg = Config {
            default_priority: 3,
            ..Config::default()
        };
        let topology = Topology::from_toml_str(SAMPLE, &cfg).expect("build");
        let members = topology.default_chain().unwrap().members();
        let services = members.iter().find(|m| m.name == "services").unwrap();
        assert_eq!(services.priority, 3);
        assert_eq!(members[0].name, "services");
    }

    #[test]
    fn conformance_reports_each_declared_protocol() {
        let topology = build(SAMPLE).expect("build");
        let reports = topology.conformance();
        assert_eq!(reports.len(), 2);

        let alice = reports.iter().find(|r| r.responder == "alice").unwrap();
        assert!(alice.is_ok());
        assert_eq!(alice.verdict, Verdict::Passed);

        let bob = reports.iter().find(|r| r.responder == "bob").unwrap();
        assert!(!bob.is_ok());
        assert!(matches!(bob.verdict, Verdict::Rejected(ref msg) if msg.contains("BadName")));
    }

    #[test]
    fn unknown_protocol_in_conformance_report() {
        let raw = r#"
[[responders]]
name = "solo"
conforms_to = ["ghost"]
[responders.selectors]
hello = 1
"#;
        let topology = build(raw).expect("build");
        let report = &topology.conformance()[0];
        assert!(!report.known);
        assert_eq!(report.verdict, Verdict::NoVerifier);
        assert!(!report.is_ok());
    }

    #[test]
    fn unknown_member_is_an_error() {
        let raw = r#"
[[chains]]
name = "root"
members = [{ name = "nobody" }]
"#;
        let err = build(raw).err().expect("error");
        assert!(matches!(err, SwitchyardError::Topology(ref m) if m.contains("nobody")));
    }

    #[test]
    fn empty_names_are_topology_errors() {
        let nested_empty_chain = r#"
[[chains]]
name = "root"
members = [{ name = "" }]

[[chains]]
name = ""
"#;
        let err = build(nested_empty_chain).err().expect("error");
        assert!(matches!(err, SwitchyardError::Topology(ref m) if m.contains("chain name")));

        let empty_responder = r#"
[[responders]]
name = "  "
"#;
        let err = build(empty_responder).err().expect("error");
        assert!(matches!(err, SwitchyardError::Topology(ref m) if m.contains("responder name")));
    }

    #[test]
    fn duplicate_names_are_errors() {
        let raw = r#"
[[responders]]
name = "x"

[[chains]]
name = "x"
"#;
        assert!(matches!(build(raw), Err(SwitchyardError::Topology(_))));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let raw = r#"
[[chains]]
name = "loop"
members = [{ name = "loop" }]
"#;
        let err = build(raw).err().expect("error");
        assert!(matches!(err, SwitchyardError::Topology(ref m) if m.contains("loop -> loop")));
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let raw = r#"
[[chains]]
name = "a"
members = [{ name = "b" }]

[[chains]]
name = "b"
members = [{ name = "c" }]

[[chains]]
name = "c"
members = [{ name = "a" }]
"#;
        let err = build(raw).err().expect("error");
        assert!(matches!(err, SwitchyardError::Topology(ref m) if m.contains("cycle")));
    }

    #[test]
    fn shared_nested_chain_is_not_a_cycle() {
        let raw = r#"
[[chains]]
name = "top"
members = [{ name = "left" }, { name = "right" }]

[[chains]]
name = "left"
members = [{ name = "leaf" }]

[[chains]]
name = "right"
members = [{ name = "leaf" }]

[[chains]]
name = "leaf"
"#;
        assert!(build(raw).is_ok());
    }

    #[test]
    fn verifier_descriptors_parse() {
        assert!(parse_verifier("snake_case").is_ok());
        assert!(parse_verifier("prefix:nav_").is_ok());
        assert!(parse_verifier("count:1:3").is_ok());
        assert!(parse_verifier("together:open,close").is_ok());

        for bad in ["", "prefix:", "count:3:1", "count:x:2", "together:solo", "camel"] {
            assert!(parse_verifier(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn multiple_verifiers_all_apply() {
        let raw = r#"
[[protocols]]
name = "nav"
selectors = ["nav_go"]
verifiers = ["prefix:nav_", "count:1:1"]

[[responders]]
name = "rover"
conforms_to = ["nav"]
[responders.selectors]
nav_go = true
nav_stop = true
"#;
        let topology = build(raw).expect("build");
        let report = &topology.conformance()[0];
        assert!(matches!(report.verdict, Verdict::Rejected(ref m) if m.contains("selector_count")
            || m.contains("2 selectors")));
    }

    #[test]
    fn bad_verifier_descriptor_fails_build() {
        let raw = r#"
[[protocols]]
name = "p"
selectors = ["a"]
verifier = "mystery"
"#;
        assert!(matches!(build(raw), Err(SwitchyardError::Topology(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("topology.toml");
        std::fs::write(&path, SAMPLE).expect("write");
        assert!(Topology::load(&path, &Config::default()).is_ok());
        assert!(matches!(
            Topology::load(&dir.path().join("missing.toml"), &Config::default()),
            Err(SwitchyardError::Topology(_))
        ));
    }
}
