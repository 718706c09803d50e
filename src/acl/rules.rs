//! Packet and decision types, and per-rule matching

use crate::config::{AclAction, AclRule, Protocol};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// Packet injected by the simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulatedPacket {
    pub source_host_id: String,
    pub destination_host_id: String,
    pub protocol: Protocol,
}

impl SimulatedPacket {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            source_host_id: source.into(),
            destination_host_id: destination.into(),
            protocol,
        }
    }
}

/// Result of ACL evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AclDecision {
    /// Verdict for the packet
    pub action: AclAction,
    /// Id of the matching rule (`None` when the chain policy applied)
    pub rule_id: Option<String>,
    /// Reason for the decision
    pub reason: String,
}

impl AclDecision {
    pub fn matched(rule: &AclRule) -> Self {
        Self {
            action: rule.action,
            rule_id: Some(rule.id.clone()),
            reason: format!("Matched rule: {}", rule.id),
        }
    }

    pub fn policy(action: AclAction) -> Self {
        Self {
            action,
            rule_id: None,
            reason: format!("No rule matched, default policy {}", action),
        }
    }

    pub fn accepted(&self) -> bool {
        self.action == AclAction::Accept
    }
}

/// Whether a stateless rule applies to a packet between the resolved subnets
pub(crate) fn rule_matches(
    rule: &AclRule,
    src: Option<IpNet>,
    dst: Option<IpNet>,
    protocol: Protocol,
) -> bool {
    if rule.stateful {
        return false;
    }

    if !rule.src.matches(src) || !rule.dst.matches(dst) {
        return false;
    }

    rule.protocol.map_or(true, |p| p == protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Selector, SERVERS_NET, USERS_NET};

    fn make_rule(src: Selector, dst: Selector, protocol: Option<Protocol>) -> AclRule {
        AclRule {
            id: "test".to_string(),
            src,
            dst,
            action: AclAction::Accept,
            stateful: false,
            protocol,
            description: String::new(),
            iptables_cmd: String::new(),
        }
    }

    #[test]
    fn test_cidr_matching() {
        let rule = make_rule(USERS_NET.into(), SERVERS_NET.into(), None);
        assert!(rule_matches(&rule, Some(USERS_NET), Some(SERVERS_NET), Protocol::Tcp));
        assert!(!rule_matches(&rule, Some(SERVERS_NET), Some(USERS_NET), Protocol::Tcp));
    }

    #[test]
    fn test_protocol_matching() {
        let rule = make_rule(Selector::Any, Selector::Any, Some(Protocol::Icmp));
        assert!(rule_matches(&rule, None, None, Protocol::Icmp));
        assert!(!rule_matches(&rule, None, None, Protocol::Tcp));
    }

    #[test]
    fn test_unresolved_subnet_needs_wildcard() {
        let rule = make_rule(USERS_NET.into(), Selector::Any, None);
        assert!(!rule_matches(&rule, None, Some(SERVERS_NET), Protocol::Tcp));
        assert!(rule_matches(&rule, Some(USERS_NET), None, Protocol::Tcp));
    }

    #[test]
    fn test_stateful_never_matches() {
        let mut rule = make_rule(Selector::Any, Selector::Any, None);
        rule.stateful = true;
        assert!(!rule_matches(&rule, Some(USERS_NET), Some(SERVERS_NET), Protocol::Tcp));
    }

    #[test]
    fn test_policy_decision() {
        let decision = AclDecision::policy(AclAction::Drop);
        assert!(!decision.accepted());
        assert_eq!(decision.rule_id, None);
        assert_eq!(decision.reason, "No rule matched, default policy DROP");
    }
}
