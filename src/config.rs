//! Configuration types for the lab
//!
//! Provides JSON-serializable configuration for subnet assignments, the
//! FORWARD-chain ACL and the topology. Every section defaults to the built-in
//! lab, so an empty JSON object is a valid configuration.

use crate::topology::Topology;
use anyhow::{Context, Result};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Lab configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct LabConfig {
    /// Host id to subnet assignments
    pub subnets: SubnetMap,

    /// FORWARD chain rules and policy
    pub acl: AclConfig,

    /// Nodes, veth pairs and phases
    pub topology: Topology,
}

impl LabConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid lab configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading configuration from file");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("failed to load {}", path.display()))
    }

    /// Check cross-references between sections
    pub fn validate(&self) -> Result<()> {
        self.acl.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        self.topology.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(())
    }
}

// ============================================================================
// Subnet Assignments
// ============================================================================

/// Fixed mapping from host id to the CIDR block it lives on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubnetMap(BTreeMap<String, IpNet>);

impl SubnetMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Assign `host` to `subnet`, replacing any previous assignment
    pub fn insert(&mut self, host: impl Into<String>, subnet: IpNet) {
        self.0.insert(host.into(), subnet.trunc());
    }

    /// Network the host lives on, or `None` for unknown hosts
    pub fn subnet_of(&self, host: &str) -> Option<IpNet> {
        self.0.get(host).map(IpNet::trunc)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, IpNet)> {
        self.0.iter().map(|(host, net)| (host.as_str(), net.trunc()))
    }
}

impl Default for SubnetMap {
    fn default() -> Self {
        let mut map = Self::new();
        map.insert("host1", USERS_NET);
        map.insert("host2", SERVERS_NET);
        map.insert("guest1", GUEST_NET);
        map.insert("mgmt1", MANAGEMENT_NET);
        map
    }
}

impl FromIterator<(String, IpNet)> for SubnetMap {
    fn from_iter<I: IntoIterator<Item = (String, IpNet)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (host, net) in iter {
            map.insert(host, net);
        }
        map
    }
}

pub const USERS_NET: IpNet = v4_net(192, 168, 10);
pub const SERVERS_NET: IpNet = v4_net(192, 168, 20);
pub const GUEST_NET: IpNet = v4_net(192, 168, 30);
pub const MANAGEMENT_NET: IpNet = v4_net(192, 168, 99);

const fn v4_net(a: u8, b: u8, c: u8) -> IpNet {
    IpNet::V4(ipnet::Ipv4Net::new_assert(std::net::Ipv4Addr::new(a, b, c, 0), 24))
}

// ============================================================================
// ACL Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AclConfig {
    /// Policy applied when no rule matches
    pub default_action: AclAction,

    /// ACL rules (evaluated in order, first match wins)
    pub rules: Vec<AclRule>,
}

impl AclConfig {
    /// Reject rule lists that cannot be displayed or referenced unambiguously
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.id.is_empty() {
                return Err("ACL rule with empty id".to_string());
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(format!("Duplicate ACL rule id '{}'", rule.id));
            }
        }
        Ok(())
    }

    /// Number of rules flagged as connection-tracking rules
    pub fn stateful_count(&self) -> usize {
        self.rules.iter().filter(|r| r.stateful).count()
    }
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            default_action: AclAction::Drop,
            rules: default_rules(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AclRule {
    /// Rule id (for logging and display)
    pub id: String,

    /// Source selector: `any` or a CIDR block
    pub src: Selector,

    /// Destination selector: `any` or a CIDR block
    pub dst: Selector,

    /// Target of the rule
    pub action: AclAction,

    /// Connection-tracking rule (RELATED,ESTABLISHED); never matched by
    /// stateless evaluation
    #[serde(default)]
    pub stateful: bool,

    /// Protocol constraint (unset = any protocol)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    #[serde(default)]
    pub description: String,

    /// Equivalent iptables command
    #[serde(default)]
    pub iptables_cmd: String,
}

/// Address selector used by ACL rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Selector {
    Any,
    Cidr(IpNet),
}

impl Selector {
    /// Whether a host on `subnet` satisfies this selector.
    ///
    /// Hosts with no known subnet only satisfy `Any`.
    pub fn matches(&self, subnet: Option<IpNet>) -> bool {
        match (self, subnet) {
            (Selector::Any, _) => true,
            (Selector::Cidr(net), Some(subnet)) => net.trunc() == subnet.trunc(),
            (Selector::Cidr(_), None) => false,
        }
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("any") {
            return Ok(Selector::Any);
        }
        IpNet::from_str(s)
            .map(|net| Selector::Cidr(net.trunc()))
            .map_err(|e| format!("Invalid selector '{}': {}", s, e))
    }
}

impl TryFrom<String> for Selector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl From<IpNet> for Selector {
    fn from(net: IpNet) -> Self {
        Selector::Cidr(net.trunc())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => f.write_str("any"),
            Selector::Cidr(net) => write!(f, "{}", net),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AclAction {
    Accept,
    #[default]
    Drop,
}

impl fmt::Display for AclAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclAction::Accept => f.write_str("ACCEPT"),
            AclAction::Drop => f.write_str("DROP"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Icmp,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "icmp" => Ok(Protocol::Icmp),
            other => Err(format!("Unknown protocol '{}' (expected tcp or icmp)", other)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Icmp => f.write_str("icmp"),
        }
    }
}

impl AclAction {
    /// iptables command setting this action as the FORWARD chain policy
    pub fn policy_cmd(&self) -> String {
        format!("iptables -P FORWARD {}", self)
    }
}

// ============================================================================
// Built-in FORWARD chain
// ============================================================================

fn default_rules() -> Vec<AclRule> {
    vec![
        AclRule {
            id: "rule-established".to_string(),
            src: Selector::Any,
            dst: Selector::Any,
            action: AclAction::Accept,
            stateful: true,
            protocol: None,
            description: "Allow return traffic for connections that were already permitted. \
                          Once a flow is allowed, replies come back automatically."
                .to_string(),
            iptables_cmd: "iptables -A FORWARD -m conntrack --ctstate RELATED,ESTABLISHED -j ACCEPT"
                .to_string(),
        },
        AclRule {
            id: "rule-mgmt-any".to_string(),
            src: Selector::Cidr(MANAGEMENT_NET),
            dst: Selector::Any,
            action: AclAction::Accept,
            stateful: false,
            protocol: None,
            description: "Allow the Management zone to initiate new connections to any \
                          destination. Admins can reach everything."
                .to_string(),
            iptables_cmd: "iptables -A FORWARD -s 192.168.99.0/24 -j ACCEPT".to_string(),
        },
        AclRule {
            id: "rule-users-servers".to_string(),
            src: Selector::Cidr(USERS_NET),
            dst: Selector::Cidr(SERVERS_NET),
            action: AclAction::Accept,
            stateful: false,
            protocol: None,
            description: "Allow Users to initiate new connections to Servers. Servers \
                          initiating new flows to Users have no allow rule and are dropped."
                .to_string(),
            iptables_cmd: "iptables -A FORWARD -s 192.168.10.0/24 -d 192.168.20.0/24 -j ACCEPT"
                .to_string(),
        },
        AclRule {
            id: "rule-icmp-request".to_string(),
            src: Selector::Cidr(USERS_NET),
            dst: Selector::Cidr(SERVERS_NET),
            action: AclAction::Accept,
            stateful: false,
            protocol: Some(Protocol::Icmp),
            description: "Explicitly allow ICMP echo-request (ping) from Users to Servers. \
                          Shadowed by the Users->Servers rule above."
                .to_string(),
            iptables_cmd: "iptables -A FORWARD -p icmp --icmp-type echo-request -s 192.168.10.0/24 -d 192.168.20.0/24 -j ACCEPT"
                .to_string(),
        },
        AclRule {
            id: "rule-icmp-reply".to_string(),
            src: Selector::Cidr(SERVERS_NET),
            dst: Selector::Cidr(USERS_NET),
            action: AclAction::Accept,
            stateful: false,
            protocol: Some(Protocol::Icmp),
            description: "Explicitly allow ICMP echo-reply from Servers back to Users. \
                          Normally covered by the ESTABLISHED rule."
                .to_string(),
            iptables_cmd: "iptables -A FORWARD -p icmp --icmp-type echo-reply -s 192.168.20.0/24 -d 192.168.10.0/24 -j ACCEPT"
                .to_string(),
        },
    ]
}
