//! Lab session
//!
//! Holds the state of one running lab: which phase is shown, which node is
//! being inspected and the outcome of the last simulated packet.

use crate::acl::{AclDecision, AclEvaluator, SimulatedPacket};
use crate::config::{AclRule, LabConfig};
use crate::topology::{NetworkNode, Phase, Topology};
use anyhow::Result;
use tracing::{debug, info};

pub struct LabSession {
    acl: AclEvaluator,
    topology: Topology,
    current_phase: Phase,
    selected_node_id: Option<String>,
    active_packet: Option<SimulatedPacket>,
    last_matched_rule: Option<AclRule>,
}

impl LabSession {
    /// Create a session over the built-in lab
    pub fn new() -> Result<Self> {
        Self::with_config(LabConfig::default())
    }

    pub fn with_config(config: LabConfig) -> Result<Self> {
        config.validate()?;
        let acl = AclEvaluator::new(&config.acl, &config.subnets)
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        info!(
            rules = acl.rule_count(),
            hosts = config.subnets.len(),
            nodes = config.topology.nodes.len(),
            "Lab session initialized"
        );

        Ok(Self {
            acl,
            topology: config.topology,
            current_phase: Phase::Layer2,
            selected_node_id: None,
            active_packet: None,
            last_matched_rule: None,
        })
    }

    pub fn acl(&self) -> &AclEvaluator {
        &self.acl
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        debug!(phase = phase.number(), "Phase changed");
        self.current_phase = phase;
    }

    /// Select a node for inspection. Returns `None` for unknown ids, leaving
    /// the selection unchanged.
    pub fn select_node(&mut self, id: &str) -> Option<&NetworkNode> {
        let node = self.topology.node(id)?;
        self.selected_node_id = Some(node.id.clone());
        Some(node)
    }

    pub fn clear_selection(&mut self) {
        self.selected_node_id = None;
    }

    pub fn selected_node(&self) -> Option<&NetworkNode> {
        self.selected_node_id
            .as_deref()
            .and_then(|id| self.topology.node(id))
    }

    /// Send a packet through the FORWARD chain and remember the outcome
    pub fn simulate(&mut self, packet: SimulatedPacket) -> AclDecision {
        let (decision, rule) = self.acl.decide_with_rule(&packet);
        self.last_matched_rule = rule.cloned();
        self.active_packet = Some(packet);
        decision
    }

    pub fn active_packet(&self) -> Option<&SimulatedPacket> {
        self.active_packet.as_ref()
    }

    pub fn last_matched_rule(&self) -> Option<&AclRule> {
        self.last_matched_rule.as_ref()
    }
}
