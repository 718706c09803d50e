//! Plain-text views of the lab for the CLI

use crate::acl::AclDecision;
use crate::config::{AclAction, AclRule};
use crate::topology::{concepts, NetworkNode, Phase, Topology, Zone};
use std::fmt::Write;

/// FORWARD chain listing, with the rule behind `decision` marked
pub fn chain(rules: &[AclRule], default_action: AclAction, decision: Option<&AclDecision>) -> String {
    let matched_id = decision.and_then(|d| d.rule_id.as_deref());
    let policy_hit = decision.is_some_and(|d| d.rule_id.is_none());
    let mut out = String::from("FORWARD chain\n");

    for rule in rules {
        let marker = if matched_id == Some(rule.id.as_str()) { '>' } else { ' ' };
        let protocol = rule
            .protocol
            .map(|p| format!(" ({})", p))
            .unwrap_or_default();
        let stateful = if rule.stateful { " [stateful]" } else { "" };
        let _ = writeln!(
            out,
            "{} {:<20} {}{}{}  {} -> {}",
            marker, rule.id, rule.action, protocol, stateful, rule.src, rule.dst
        );
        if !rule.description.is_empty() {
            let _ = writeln!(out, "    {}", rule.description);
        }
        if !rule.iptables_cmd.is_empty() {
            let _ = writeln!(out, "    {}", rule.iptables_cmd);
        }
    }

    let marker = if policy_hit { '>' } else { ' ' };
    let _ = writeln!(
        out,
        "{} {:<20} {} (default policy)  any -> any",
        marker, "policy", default_action
    );
    let _ = writeln!(out, "    No rule matched. Packet handled by the FORWARD chain policy.");
    let _ = writeln!(out, "    {}", default_action.policy_cmd());
    out
}

pub fn node(node: &NetworkNode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", node.label, node.zone);
    let _ = writeln!(out, "{}", node.description);
    let _ = writeln!(out, "Interfaces");
    for iface in &node.interfaces {
        let ip = iface
            .ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "  {:<16} {}", iface.name, ip);
    }
    out
}

/// Nodes and links shown in a phase, or `None` if the topology lacks it
pub fn phase(topology: &Topology, phase: Phase) -> Option<String> {
    let view = topology.phase(phase)?;
    let mut out = String::new();
    let _ = writeln!(out, "{}", phase);
    let _ = writeln!(out, "{}", view.description);
    let _ = writeln!(out, "Nodes");
    for node in topology.visible_nodes(phase) {
        let _ = writeln!(out, "  {:<8} {}", node.id, node.zone);
    }
    let _ = writeln!(out, "Veth pairs");
    for edge in topology.visible_edges(phase) {
        let _ = writeln!(
            out,
            "  {}:{} <-> {}:{}",
            edge.source, edge.source_handle, edge.target, edge.target_handle
        );
    }
    Some(out)
}

pub fn legend() -> String {
    let mut out = String::from("Zones\n");
    for zone in Zone::ALL {
        let _ = writeln!(out, "  {}", zone);
    }
    out.push_str("Linux -> Real Network\n");
    for concept in concepts() {
        let _ = writeln!(out, "  {} -> {}", concept.linux, concept.real);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AclConfig;

    #[test]
    fn test_chain_marks_matched_rule() {
        let acl = AclConfig::default();
        let decision = AclDecision::matched(&acl.rules[2]);
        let text = chain(&acl.rules, acl.default_action, Some(&decision));
        assert!(text.contains("> rule-users-servers"));
        assert!(text.contains("  policy"));
        assert!(text.contains("iptables -P FORWARD DROP"));
    }

    #[test]
    fn test_chain_policy_command_follows_accept_policy() {
        let decision = AclDecision::policy(AclAction::Accept);
        let text = chain(&[], AclAction::Accept, Some(&decision));
        assert!(text.contains("> policy               ACCEPT (default policy)"));
        assert!(text.contains("iptables -P FORWARD ACCEPT"));
        assert!(!text.contains("iptables -P FORWARD DROP"));
    }

    #[test]
    fn test_chain_shows_rule_descriptions() {
        let acl = AclConfig::default();
        let text = chain(&acl.rules, acl.default_action, None);
        for rule in &acl.rules {
            assert!(text.contains(&rule.description), "missing description of {}", rule.id);
        }
    }

    #[test]
    fn test_chain_marks_policy() {
        let acl = AclConfig::default();
        let decision = AclDecision::policy(AclAction::Drop);
        let text = chain(&acl.rules, acl.default_action, Some(&decision));
        assert!(text.contains("> policy"));
        assert!(!text.contains("> rule-"));
    }

    #[test]
    fn test_node_lists_interfaces() {
        let topology = Topology::default();
        let text = node(topology.node("host1").unwrap());
        assert!(text.starts_with("host1 (Users)"));
        assert!(text.contains("veth-host1       192.168.10.2"));
        assert!(text.contains("lo               -"));
    }

    #[test]
    fn test_phase_view() {
        let topology = Topology::default();
        let text = phase(&topology, Phase::Layer2).unwrap();
        assert!(!text.contains("  router "));
        assert!(!text.contains("router:"));
        let text = phase(&topology, Phase::Routing).unwrap();
        assert!(text.contains("router:veth-r99 <-> br99:veth-r99-br"));
    }

    #[test]
    fn test_legend() {
        let text = legend();
        assert!(text.contains("Management"));
        assert!(text.contains("veth pair -> Ethernet cable"));
    }
}
