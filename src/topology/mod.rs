//! Lab topology
//!
//! Network namespaces, Linux bridges and the veth pairs between them, grouped
//! into the phases the lab is built up in.

mod lab;

pub use lab::{concepts, Concept};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;

/// Labeled group of hosts sharing a subnet and trust level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Users,
    Servers,
    Guest,
    Management,
    Router,
    Bridge,
}

impl Zone {
    pub const ALL: [Zone; 6] = [
        Zone::Users,
        Zone::Servers,
        Zone::Guest,
        Zone::Management,
        Zone::Router,
        Zone::Bridge,
    ];

    /// Legend label
    pub fn label(&self) -> &'static str {
        match self {
            Zone::Users => "Users",
            Zone::Servers => "Servers",
            Zone::Guest => "Guest",
            Zone::Management => "Management",
            Zone::Router => "Router",
            Zone::Bridge => "Bridge",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Namespace,
    Bridge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkInterface {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<IpNet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub zone: Zone,
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
    #[serde(default)]
    pub description: String,
}

/// Virtual cable between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VethPair {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Interface name inside the source node
    pub source_handle: String,
    /// Interface name (bridge port) inside the target node
    pub target_handle: String,
    #[serde(default)]
    pub description: String,
}

/// Build stage of the lab
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    /// Hosts and bridges only
    Layer2,
    /// Router namespace with forwarding enabled
    Routing,
    /// FORWARD chain ACL applied
    Acl,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Layer2, Phase::Routing, Phase::Acl];

    pub fn number(&self) -> u8 {
        match self {
            Phase::Layer2 => 2,
            Phase::Routing => 3,
            Phase::Acl => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Layer2 => "Phase 2 - Layer 2 Only",
            Phase::Routing => "Phase 3 - Routing",
            Phase::Acl => "Phase 4 - ACL",
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Phase::Layer2),
            3 => Ok(Phase::Routing),
            4 => Ok(Phase::Acl),
            other => Err(format!("Unknown phase {}", other)),
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase.number()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Nodes and edges visible in a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PhaseView {
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Static topology dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Topology {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<VethPair>,
    pub phases: BTreeMap<Phase, PhaseView>,
}

impl Default for Topology {
    fn default() -> Self {
        lab::topology()
    }
}

impl Topology {
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&VethPair> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseView> {
        self.phases.get(&phase)
    }

    /// Nodes shown in `phase`, in dataset order
    pub fn visible_nodes(&self, phase: Phase) -> Vec<&NetworkNode> {
        match self.phase(phase) {
            Some(view) => self
                .nodes
                .iter()
                .filter(|n| view.node_ids.contains(&n.id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Veth pairs shown in `phase`, in dataset order
    pub fn visible_edges(&self, phase: Phase) -> Vec<&VethPair> {
        match self.phase(phase) {
            Some(view) => self
                .edges
                .iter()
                .filter(|e| view.edge_ids.contains(&e.id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Veth pairs with `node_id` at either end
    pub fn edges_of<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a VethPair> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.source == node_id || e.target == node_id)
    }

    /// Endpoints of the packet simulator: namespaces outside the router zone
    pub fn hosts(&self) -> impl Iterator<Item = &NetworkNode> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Namespace && n.zone != Zone::Router)
    }

    /// Check that every reference resolves
    pub fn validate(&self) -> Result<(), String> {
        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(format!("Duplicate node id '{}'", node.id));
            }
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(format!("Duplicate veth pair id '{}'", edge.id));
            }
            for end in [&edge.source, &edge.target] {
                if !node_ids.contains(end.as_str()) {
                    return Err(format!(
                        "Veth pair '{}' references unknown node '{}'",
                        edge.id, end
                    ));
                }
            }
        }

        for (phase, view) in &self.phases {
            if let Some(id) = view.node_ids.iter().find(|id| !node_ids.contains(id.as_str())) {
                return Err(format!("Phase {} references unknown node '{}'", phase.number(), id));
            }
            if let Some(id) = view.edge_ids.iter().find(|id| !edge_ids.contains(id.as_str())) {
                return Err(format!(
                    "Phase {} references unknown veth pair '{}'",
                    phase.number(),
                    id
                ));
            }
        }

        Ok(())
    }
}
