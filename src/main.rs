//! Network lab CLI
//!
//! Sends simulated packets through the lab's FORWARD chain and prints the
//! inspector views.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use netlab_acl::acl::SimulatedPacket;
use netlab_acl::config::Protocol;
use netlab_acl::topology::Phase;
use netlab_acl::{report, LabConfig, LabSession};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Linux networking lab: namespaces, bridges, a router and an ACL
#[derive(Parser, Debug)]
#[command(name = "netlab")]
#[command(version)]
#[command(about = "Simulate packets through a namespace/bridge/router lab", long_about = None)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a packet between two hosts
    Simulate {
        /// Source host id
        #[arg(long)]
        src: String,
        /// Destination host id
        #[arg(long)]
        dst: String,
        /// tcp or icmp
        #[arg(long, default_value = "tcp", value_parser = parse_protocol)]
        protocol: Protocol,
    },
    /// List the FORWARD chain
    Rules,
    /// Show a node and its interfaces
    Inspect {
        /// Node id
        node: String,
    },
    /// Show what exists in a build phase (2, 3 or 4)
    Phase {
        #[arg(value_parser = parse_phase)]
        phase: Phase,
    },
    /// Zones and Linux-to-hardware concepts
    Legend,
}

fn parse_protocol(s: &str) -> Result<Protocol, String> {
    s.parse()
}

fn parse_phase(s: &str) -> Result<Phase, String> {
    let n: u8 = s.parse().map_err(|_| format!("Invalid phase '{}'", s))?;
    Phase::try_from(n)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting netlab");

    // Load configuration
    let config = match &args.config {
        Some(path) => LabConfig::from_file(path)?,
        None => LabConfig::default(),
    };

    let mut session = LabSession::with_config(config)?;

    match args.command {
        Command::Simulate { src, dst, protocol } => {
            let decision = session.simulate(SimulatedPacket::new(src, dst, protocol));
            if args.json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                println!("{}  ({})", decision.action, decision.reason);
                println!();
                print!(
                    "{}",
                    report::chain(
                        session.acl().rules(),
                        session.acl().default_action(),
                        Some(&decision)
                    )
                );
            }
        }
        Command::Rules => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(session.acl().rules())?);
            } else {
                print!(
                    "{}",
                    report::chain(session.acl().rules(), session.acl().default_action(), None)
                );
            }
        }
        Command::Inspect { node } => {
            let Some(found) = session.select_node(&node) else {
                bail!("unknown node '{}'", node);
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(found)?);
            } else {
                print!("{}", report::node(found));
            }
        }
        Command::Phase { phase } => {
            session.set_phase(phase);
            let topology = session.topology();
            let Some(text) = report::phase(topology, phase) else {
                bail!("phase {} is not defined in this topology", phase.number());
            };
            if args.json {
                let view = topology.phase(phase);
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", text);
            }
        }
        Command::Legend => {
            if args.json {
                let zones: Vec<_> = netlab_acl::topology::Zone::ALL.to_vec();
                let value = serde_json::json!({
                    "zones": zones,
                    "concepts": netlab_acl::topology::concepts(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", report::legend());
            }
        }
    }

    Ok(())
}
