//! Linux networking lab model
//!
//! A small simulated network built from Linux primitives, each standing in
//! for a piece of physical gear:
//!
//! - **Namespaces** as hosts (`host1`, `host2`, `guest1`, `mgmt1`) and a router
//! - **Bridges** as per-subnet switches (`br10`, `br20`, `br30`, `br99`)
//! - **veth pairs** as the cables between them
//! - **iptables FORWARD chain** on the router as the ACL
//!
//! The lab is built up in phases (Layer 2 only, routing, ACL). The packet
//! simulator sends a packet between two hosts and reports which FORWARD rule
//! accepted it, or that the default DROP policy applied.
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "subnets": {
//!     "host1": "192.168.10.0/24",
//!     "host2": "192.168.20.0/24"
//!   },
//!   "acl": {
//!     "default-action": "DROP",
//!     "rules": [
//!       {
//!         "id": "users-servers",
//!         "src": "192.168.10.0/24",
//!         "dst": "192.168.20.0/24",
//!         "action": "ACCEPT",
//!         "protocol": "tcp"
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use netlab_acl::acl::{AclEvaluator, SimulatedPacket};
//! use netlab_acl::config::Protocol;
//!
//! let acl = AclEvaluator::default();
//! let rule = acl.evaluate(&SimulatedPacket::new("host1", "host2", Protocol::Tcp));
//! assert_eq!(rule.map(|r| r.id.as_str()), Some("rule-users-servers"));
//!
//! // Servers may not open connections towards Users
//! assert!(acl.evaluate(&SimulatedPacket::new("host2", "host1", Protocol::Tcp)).is_none());
//! ```

pub mod acl;
pub mod config;
pub mod report;
pub mod session;
pub mod topology;

// Re-export main types
pub use config::LabConfig;
pub use session::LabSession;
