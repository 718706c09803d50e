//! Built-in lab dataset

use super::{NetworkInterface, NetworkNode, NodeKind, Phase, PhaseView, Topology, VethPair, Zone};
use crate::config::{GUEST_NET, MANAGEMENT_NET, SERVERS_NET, USERS_NET};
use ipnet::IpNet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Linux building block and the physical gear it stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Concept {
    pub linux: &'static str,
    pub real: &'static str,
}

pub fn concepts() -> &'static [Concept] {
    const CONCEPTS: &[Concept] = &[
        Concept { linux: "Network namespace", real: "Physical host / PC" },
        Concept { linux: "Linux bridge", real: "Ethernet switch / VLAN" },
        Concept { linux: "veth pair", real: "Ethernet cable" },
        Concept { linux: "Router namespace (ip_forward=1)", real: "Router / Layer 3 switch" },
        Concept { linux: "iptables FORWARD chain", real: "Stateful firewall / ACL" },
        Concept { linux: "conntrack", real: "Connection tracking (stateful firewall state)" },
    ];
    CONCEPTS
}

fn lo() -> NetworkInterface {
    NetworkInterface { name: "lo".to_string(), ip: None, cidr: None }
}

fn leg(name: &str, host: u8, net: IpNet) -> NetworkInterface {
    let ip = match net {
        IpNet::V4(v4) => {
            let [a, b, c, _] = v4.network().octets();
            Some(Ipv4Addr::new(a, b, c, host))
        }
        IpNet::V6(_) => None,
    };
    NetworkInterface { name: name.to_string(), ip, cidr: Some(net) }
}

fn port(name: &str) -> NetworkInterface {
    NetworkInterface { name: name.to_string(), ip: None, cidr: None }
}

fn node(
    id: &str,
    kind: NodeKind,
    zone: Zone,
    interfaces: Vec<NetworkInterface>,
    description: &str,
) -> NetworkNode {
    NetworkNode {
        id: id.to_string(),
        label: id.to_string(),
        kind,
        zone,
        interfaces,
        description: description.to_string(),
    }
}

fn veth(source: &str, target: &str, source_handle: &str, description: &str) -> VethPair {
    VethPair {
        id: format!("{}--{}", source_handle, target),
        source: source.to_string(),
        target: target.to_string(),
        source_handle: source_handle.to_string(),
        target_handle: format!("{}-br", source_handle),
        description: description.to_string(),
    }
}

pub(super) fn topology() -> Topology {
    let nodes = vec![
        node(
            "host1",
            NodeKind::Namespace,
            Zone::Users,
            vec![lo(), leg("veth-host1", 2, USERS_NET)],
            "A network namespace simulating a user workstation on the Users subnet. \
             Can reach Servers but cannot be reached by them for new connections.",
        ),
        node(
            "host2",
            NodeKind::Namespace,
            Zone::Servers,
            vec![lo(), leg("veth-host2", 2, SERVERS_NET)],
            "A network namespace simulating a backend server on the Servers subnet. \
             Users can initiate connections to it but it cannot initiate new connections back to Users.",
        ),
        node(
            "guest1",
            NodeKind::Namespace,
            Zone::Guest,
            vec![lo(), leg("veth-guest", 2, GUEST_NET)],
            "A network namespace simulating an untrusted guest device. \
             Blocked from initiating connections to any internal network by the ACL.",
        ),
        node(
            "mgmt1",
            NodeKind::Namespace,
            Zone::Management,
            vec![lo(), leg("veth-mgmt", 2, MANAGEMENT_NET)],
            "A network namespace simulating an IT admin machine. \
             Privileged zone that can reach any subnet in the network.",
        ),
        node(
            "router",
            NodeKind::Namespace,
            Zone::Router,
            vec![
                lo(),
                leg("veth-r10", 1, USERS_NET),
                leg("veth-r20", 1, SERVERS_NET),
                leg("veth-r30", 1, GUEST_NET),
                leg("veth-r99", 1, MANAGEMENT_NET),
            ],
            "The router namespace. Has one interface on every subnet and is the default \
             gateway for all hosts. IP forwarding is enabled and the iptables FORWARD rules live here.",
        ),
        node(
            "br10",
            NodeKind::Bridge,
            Zone::Bridge,
            vec![port("veth-host1-br"), port("veth-r10-br")],
            "Linux bridge acting as a Layer 2 switch for the Users network (192.168.10.0/24). \
             One port for host1, one for the router.",
        ),
        node(
            "br20",
            NodeKind::Bridge,
            Zone::Bridge,
            vec![port("veth-host2-br"), port("veth-r20-br")],
            "Linux bridge acting as a Layer 2 switch for the Servers network (192.168.20.0/24). \
             One port for host2, one for the router.",
        ),
        node(
            "br30",
            NodeKind::Bridge,
            Zone::Bridge,
            vec![port("veth-guest-br"), port("veth-r30-br")],
            "Linux bridge acting as a Layer 2 switch for the Guest network (192.168.30.0/24). \
             Guest traffic is isolated here and blocked at the router by the ACL.",
        ),
        node(
            "br99",
            NodeKind::Bridge,
            Zone::Bridge,
            vec![port("veth-mgmt-br"), port("veth-r99-br")],
            "Linux bridge acting as a Layer 2 switch for the Management network (192.168.99.0/24). \
             Admin traffic only.",
        ),
    ];

    let edges = vec![
        veth(
            "host1",
            "br10",
            "veth-host1",
            "Virtual cable connecting host1 to the Users bridge. veth-host1 is host1's NIC; \
             veth-host1-br is a switch port on br10.",
        ),
        veth(
            "host2",
            "br20",
            "veth-host2",
            "Virtual cable connecting host2 to the Servers bridge.",
        ),
        veth(
            "guest1",
            "br30",
            "veth-guest",
            "Virtual cable connecting guest1 to the Guest bridge.",
        ),
        veth(
            "mgmt1",
            "br99",
            "veth-mgmt",
            "Virtual cable connecting mgmt1 to the Management bridge.",
        ),
        veth(
            "router",
            "br10",
            "veth-r10",
            "Gives the router 192.168.10.1 on the Users subnet, the default gateway for host1.",
        ),
        veth(
            "router",
            "br20",
            "veth-r20",
            "Gives the router 192.168.20.1 on the Servers subnet, the default gateway for host2.",
        ),
        veth(
            "router",
            "br30",
            "veth-r30",
            "Gives the router 192.168.30.1 on the Guest subnet, the default gateway for guest1.",
        ),
        veth(
            "router",
            "br99",
            "veth-r99",
            "Gives the router 192.168.99.1 on the Management subnet, the default gateway for mgmt1.",
        ),
    ];

    let access_nodes: Vec<String> = ["host1", "host2", "guest1", "mgmt1", "br10", "br20", "br30", "br99"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let access_edges: Vec<String> = edges[..4].iter().map(|e| e.id.clone()).collect();
    let all_edges: Vec<String> = edges.iter().map(|e| e.id.clone()).collect();
    let mut routed_nodes = access_nodes.clone();
    routed_nodes.push("router".to_string());

    let mut phases = BTreeMap::new();
    phases.insert(
        Phase::Layer2,
        PhaseView {
            node_ids: access_nodes,
            edge_ids: access_edges,
            description: "Layer 2 only. Hosts and bridges exist but there is no router. \
                          Each subnet is an isolated broadcast domain."
                .to_string(),
        },
    );
    phases.insert(
        Phase::Routing,
        PhaseView {
            node_ids: routed_nodes.clone(),
            edge_ids: all_edges.clone(),
            description: "Router namespace added with IP forwarding enabled. All hosts have a \
                          default route and every subnet can reach every other; no firewall yet."
                .to_string(),
        },
    );
    phases.insert(
        Phase::Acl,
        PhaseView {
            node_ids: routed_nodes,
            edge_ids: all_edges,
            description: "ACL applied. Default FORWARD policy is DROP. Only Management to \
                          anywhere, Users to Servers and established return traffic are permitted."
                .to_string(),
        },
    );

    Topology { nodes, edges, phases }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veth_ids_follow_handle_naming() {
        let topology = topology();
        assert!(topology.edge("veth-host1--br10").is_some());
        assert!(topology.edge("veth-r99--br99").is_some());
        let edge = topology.edge("veth-guest--br30").unwrap();
        assert_eq!(edge.target_handle, "veth-guest-br");
    }

    #[test]
    fn test_gateway_addresses() {
        let topology = topology();
        let router = topology.node("router").unwrap();
        let r10 = router.interfaces.iter().find(|i| i.name == "veth-r10").unwrap();
        assert_eq!(r10.ip, Some(Ipv4Addr::new(192, 168, 10, 1)));
        let host1 = topology.node("host1").unwrap();
        assert_eq!(host1.interfaces[1].ip, Some(Ipv4Addr::new(192, 168, 10, 2)));
    }

    #[test]
    fn test_every_bridge_port_is_cabled() {
        let topology = topology();
        for bridge in topology.nodes.iter().filter(|n| n.kind == NodeKind::Bridge) {
            for port in &bridge.interfaces {
                assert!(
                    topology
                        .edges_of(&bridge.id)
                        .any(|e| e.target_handle == port.name),
                    "unconnected port {} on {}",
                    port.name,
                    bridge.id
                );
            }
        }
    }
}
