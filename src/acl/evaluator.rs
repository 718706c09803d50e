//! ACL rule evaluation engine

use crate::config::{AclAction, AclConfig, AclRule, SubnetMap};
use tracing::{debug, warn};

use super::rules::{rule_matches, AclDecision, SimulatedPacket};

/// Find the first stateless rule in `rules` that matches `packet`.
///
/// Rules are scanned top-down and stateful rules are skipped, since the
/// simulation keeps no connection tracking state. Hosts missing from
/// `subnets` only match `any` selectors. `None` means the chain policy
/// applies.
pub fn evaluate<'r>(
    packet: &SimulatedPacket,
    rules: &'r [AclRule],
    subnets: &SubnetMap,
) -> Option<&'r AclRule> {
    let src = subnets.subnet_of(&packet.source_host_id);
    let dst = subnets.subnet_of(&packet.destination_host_id);

    rules
        .iter()
        .find(|rule| rule_matches(rule, src, dst, packet.protocol))
}

/// ACL Evaluator - FORWARD chain bound to its subnet assignments
#[derive(Debug, Clone)]
pub struct AclEvaluator {
    /// Rules in chain order
    rules: Vec<AclRule>,
    /// Chain policy when no rule matches
    default_action: AclAction,
    subnets: SubnetMap,
}

impl AclEvaluator {
    /// Create a new ACL evaluator from configuration
    pub fn new(config: &AclConfig, subnets: &SubnetMap) -> Result<Self, String> {
        config.validate()?;

        let stateful = config.stateful_count();
        if stateful != 1 {
            warn!(
                stateful,
                "Expected exactly one RELATED,ESTABLISHED rule in the FORWARD chain"
            );
        }

        Ok(Self {
            rules: config.rules.clone(),
            default_action: config.default_action,
            subnets: subnets.clone(),
        })
    }

    /// First matching rule for `packet`, if any
    pub fn evaluate(&self, packet: &SimulatedPacket) -> Option<&AclRule> {
        evaluate(packet, &self.rules, &self.subnets)
    }

    /// Verdict for `packet`, falling back to the chain policy
    pub fn decide(&self, packet: &SimulatedPacket) -> AclDecision {
        self.decide_with_rule(packet).0
    }

    /// Verdict for `packet` together with the rule that produced it, from a
    /// single pass over the chain
    pub fn decide_with_rule(&self, packet: &SimulatedPacket) -> (AclDecision, Option<&AclRule>) {
        if let Some(rule) = self.evaluate(packet) {
            debug!(
                rule = %rule.id,
                src = %packet.source_host_id,
                dst = %packet.destination_host_id,
                protocol = %packet.protocol,
                action = %rule.action,
                "ACL rule matched"
            );
            return (AclDecision::matched(rule), Some(rule));
        }

        debug!(
            src = %packet.source_host_id,
            dst = %packet.destination_host_id,
            protocol = %packet.protocol,
            default = %self.default_action,
            "No ACL rule matched, using default"
        );
        (AclDecision::policy(self.default_action), None)
    }

    pub fn rules(&self) -> &[AclRule] {
        &self.rules
    }

    pub fn default_action(&self) -> AclAction {
        self.default_action
    }

    pub fn subnets(&self) -> &SubnetMap {
        &self.subnets
    }

    /// Get the number of loaded rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for AclEvaluator {
    fn default() -> Self {
        Self {
            rules: AclConfig::default().rules,
            default_action: AclAction::Drop,
            subnets: SubnetMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Protocol, Selector, GUEST_NET, SERVERS_NET, USERS_NET};

    const HOSTS: [&str; 4] = ["host1", "host2", "guest1", "mgmt1"];
    const PROTOCOLS: [Protocol; 2] = [Protocol::Tcp, Protocol::Icmp];

    fn packet(src: &str, dst: &str, protocol: Protocol) -> SimulatedPacket {
        SimulatedPacket::new(src, dst, protocol)
    }

    fn make_rule(id: &str, src: Selector, dst: Selector) -> AclRule {
        AclRule {
            id: id.to_string(),
            src,
            dst,
            action: AclAction::Accept,
            stateful: false,
            protocol: None,
            description: String::new(),
            iptables_cmd: String::new(),
        }
    }

    #[test]
    fn test_management_reaches_everything() {
        let evaluator = AclEvaluator::default();
        for dst in HOSTS {
            for protocol in PROTOCOLS {
                let rule = evaluator.evaluate(&packet("mgmt1", dst, protocol)).unwrap();
                assert_eq!(rule.id, "rule-mgmt-any");
            }
        }
    }

    #[test]
    fn test_users_to_servers_tcp() {
        let evaluator = AclEvaluator::default();
        let rule = evaluator
            .evaluate(&packet("host1", "host2", Protocol::Tcp))
            .unwrap();
        assert_eq!(rule.id, "rule-users-servers");
    }

    #[test]
    fn test_users_to_servers_icmp_hits_broader_rule_first() {
        let evaluator = AclEvaluator::default();
        let rule = evaluator
            .evaluate(&packet("host1", "host2", Protocol::Icmp))
            .unwrap();
        assert_eq!(rule.id, "rule-users-servers");
    }

    #[test]
    fn test_guest_is_default_denied() {
        let evaluator = AclEvaluator::default();
        for dst in HOSTS {
            for protocol in PROTOCOLS {
                let p = packet("guest1", dst, protocol);
                assert!(evaluator.evaluate(&p).is_none());
                assert_eq!(evaluator.decide(&p).action, AclAction::Drop);
            }
        }
    }

    #[test]
    fn test_servers_to_users_tcp_is_dropped() {
        let evaluator = AclEvaluator::default();
        let decision = evaluator.decide(&packet("host2", "host1", Protocol::Tcp));
        assert!(!decision.accepted());
        assert_eq!(decision.rule_id, None);
    }

    #[test]
    fn test_stateful_rule_never_returned() {
        let evaluator = AclEvaluator::default();
        for src in HOSTS.iter().chain(["nowhere"].iter()) {
            for dst in HOSTS.iter().chain(["nowhere"].iter()) {
                for protocol in PROTOCOLS {
                    if let Some(rule) = evaluator.evaluate(&packet(src, dst, protocol)) {
                        assert!(!rule.stateful);
                        assert_ne!(rule.id, "rule-established");
                    }
                }
            }
        }
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            make_rule("broad", Selector::Cidr(USERS_NET), Selector::Any),
            make_rule("narrow", Selector::Cidr(USERS_NET), Selector::Cidr(SERVERS_NET)),
        ];
        let subnets = SubnetMap::default();
        let rule = evaluate(&packet("host1", "host2", Protocol::Tcp), &rules, &subnets).unwrap();
        assert_eq!(rule.id, "broad");
    }

    #[test]
    fn test_unknown_host_only_matches_wildcards() {
        let subnets = SubnetMap::default();
        let rules = vec![
            make_rule("users-any", Selector::Cidr(USERS_NET), Selector::Any),
            make_rule("any-guest", Selector::Any, Selector::Cidr(GUEST_NET)),
        ];

        // unknown destination still satisfies a wildcard destination
        let rule = evaluate(&packet("host1", "ghost", Protocol::Tcp), &rules, &subnets).unwrap();
        assert_eq!(rule.id, "users-any");

        // unknown source never equals a CIDR selector
        let rule = evaluate(&packet("ghost", "guest1", Protocol::Tcp), &rules, &subnets).unwrap();
        assert_eq!(rule.id, "any-guest");
        assert!(evaluate(&packet("ghost", "host2", Protocol::Tcp), &rules, &subnets).is_none());
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let evaluator = AclEvaluator::default();
        let p = packet("host1", "host2", Protocol::Icmp);
        let first = evaluator.decide(&p);
        for _ in 0..10 {
            assert_eq!(evaluator.decide(&p), first);
        }
    }

    #[test]
    fn test_cidr_selector_with_host_bits() {
        let net: ipnet::IpNet = "192.168.10.7/24".parse().unwrap();
        let rules = vec![make_rule("users-any", Selector::Cidr(net), Selector::Any)];
        let subnets = SubnetMap::default();
        let rule = evaluate(&packet("host1", "host2", Protocol::Tcp), &rules, &subnets).unwrap();
        assert_eq!(rule.id, "users-any");
    }

    #[test]
    fn test_decision_carries_matched_rule() {
        let evaluator = AclEvaluator::default();

        let (decision, rule) = evaluator.decide_with_rule(&packet("host2", "host1", Protocol::Icmp));
        assert_eq!(decision.rule_id.as_deref(), Some("rule-icmp-reply"));
        assert_eq!(rule.map(|r| r.id.as_str()), decision.rule_id.as_deref());

        let (decision, rule) = evaluator.decide_with_rule(&packet("guest1", "mgmt1", Protocol::Tcp));
        assert_eq!(decision.action, AclAction::Drop);
        assert!(rule.is_none());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let config = AclConfig {
            default_action: AclAction::Drop,
            rules: vec![
                make_rule("dup", Selector::Any, Selector::Any),
                make_rule("dup", Selector::Any, Selector::Any),
            ],
        };
        assert!(AclEvaluator::new(&config, &SubnetMap::default()).is_err());
    }

    #[test]
    fn test_default_accept_policy() {
        let config = AclConfig {
            default_action: AclAction::Accept,
            rules: vec![],
        };
        let evaluator = AclEvaluator::new(&config, &SubnetMap::default()).unwrap();
        let decision = evaluator.decide(&packet("guest1", "host2", Protocol::Tcp));
        assert!(decision.accepted());
        assert_eq!(decision.reason, "No rule matched, default policy ACCEPT");
    }
}
