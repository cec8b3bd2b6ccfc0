use anyhow::{bail, Context};
use std::fmt::Write;
use std::sync::Arc;

use crate::protocol::{LinkSelector, RouteRow};
use crate::router::Router;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Attach {
        host: String,
        port: u16,
        simulated_address: String,
        weight: u16,
    },
    Start,
    Connect {
        host: String,
        port: u16,
        simulated_address: String,
        weight: u16,
    },
    Disconnect(LinkSelector),
    Detect(String),
    Neighbors,
    Ports,
    Lsd,
    Topology,
    Quit,
}

const USAGE: &str = "Available commands: attach <host> <port> <sim_addr> <weight>, start, \
connect <host> <port> <sim_addr> <weight>, disconnect <port|sim_addr>, detect <sim_addr>, \
neighbors, ports, lsd, topology, quit";

impl Command {
    pub fn parse(line: &str) -> anyhow::Result<Command> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((name, args)) = words.split_first() else {
            bail!("empty command");
        };

        let command = match (name.to_ascii_lowercase().as_str(), args) {
            ("attach", [host, port, sim, weight]) => {
                let (port, weight) = parse_endpoint(port, weight)?;
                Command::Attach {
                    host: host.to_string(),
                    port,
                    simulated_address: sim.to_string(),
                    weight,
                }
            }
            ("connect", [host, port, sim, weight]) => {
                let (port, weight) = parse_endpoint(port, weight)?;
                Command::Connect {
                    host: host.to_string(),
                    port,
                    simulated_address: sim.to_string(),
                    weight,
                }
            }
            ("disconnect", [target]) => Command::Disconnect(target.parse()?),
            ("detect", [target]) => Command::Detect(target.to_string()),
            ("start", []) => Command::Start,
            ("neighbors", []) => Command::Neighbors,
            ("ports", []) => Command::Ports,
            ("lsd", []) => Command::Lsd,
            ("topology", []) => Command::Topology,
            ("quit", []) => Command::Quit,
            _ => bail!("unrecognized command '{}'. {}", line.trim(), USAGE),
        };
        Ok(command)
    }
}

fn parse_endpoint(port: &str, weight: &str) -> anyhow::Result<(u16, u16)> {
    let port = port.parse().with_context(|| format!("invalid port '{}'", port))?;
    let weight = weight.parse().with_context(|| format!("invalid weight '{}'", weight))?;
    Ok((port, weight))
}

/// Runs one operator command and renders its outcome. `quit` only sends the
/// EXIT notifications; leaving the process is up to the caller.
pub async fn execute(router: &Arc<Router>, command: Command) -> String {
    let mut output = String::new();
    match command {
        Command::Attach {
            host,
            port,
            simulated_address,
            weight,
        } => match router.attach(&host, port, &simulated_address, weight).await {
            Ok(slot) => writeln!(output, "Attached {} on port {}", simulated_address, slot).unwrap(),
            Err(e) => writeln!(output, "Attach failed: {}", e).unwrap(),
        },
        Command::Start => {
            let outcomes = router.start_handshakes().await;
            if outcomes.is_empty() {
                writeln!(output, "No links to start").unwrap();
            }
            for outcome in outcomes {
                match outcome.result {
                    Ok(()) => writeln!(output, "{}: TWO_WAY", outcome.peer).unwrap(),
                    Err(e) => writeln!(output, "{}: handshake failed ({})", outcome.peer, e).unwrap(),
                }
            }
        }
        Command::Connect {
            host,
            port,
            simulated_address,
            weight,
        } => match router.connect_to(&host, port, &simulated_address, weight).await {
            Ok(slot) => writeln!(output, "Connected to {} on port {}", simulated_address, slot).unwrap(),
            Err(e) => writeln!(output, "Connect failed: {}", e).unwrap(),
        },
        Command::Disconnect(selector) => match router.disconnect(selector).await {
            Ok(link) => writeln!(output, "Disconnected {}", link.peer_id()).unwrap(),
            Err(e) => writeln!(output, "Disconnect failed: {}", e).unwrap(),
        },
        Command::Detect(destination) => match router.detect(&destination).await {
            Ok(path) => writeln!(output, "{}", render_path(&path)).unwrap(),
            Err(e) => writeln!(output, "{}", e).unwrap(),
        },
        Command::Neighbors => {
            let neighbors = router.neighbors().await;
            if neighbors.is_empty() {
                writeln!(output, "No neighbors found").unwrap();
            }
            for (i, id) in neighbors.iter().enumerate() {
                writeln!(output, "IP Address of the neighbor{}: {}", i + 1, id).unwrap();
            }
        }
        Command::Ports => {
            writeln!(
                output,
                "{:<6} {:<16} {:<22} {:<8} {:<8}",
                "Port", "Neighbor", "Endpoint", "Weight", "State"
            )
            .unwrap();
            writeln!(output, "{}", "-".repeat(64)).unwrap();
            for (slot, link) in router.port_status().await {
                writeln!(
                    output,
                    "{:<6} {:<16} {:<22} {:<8} {:<8}",
                    slot,
                    link.peer_id(),
                    link.peer.endpoint(),
                    link.weight,
                    link.status
                )
                .unwrap();
            }
        }
        Command::Lsd => {
            output.push_str(&router.snapshot().await.lsd.render());
        }
        Command::Topology => {
            let state = router.snapshot().await;
            output.push_str(&state.lsd.build_topology().render());
            writeln!(output).unwrap();
            writeln!(output, "{:<16} {:<10} {:<16}", "Destination", "Distance", "Previous hop").unwrap();
            for row in state.routing_table.iter() {
                writeln!(
                    output,
                    "{:<16} {:<10} {:<16}",
                    row.target_id,
                    row.distance,
                    row.previous_hop.as_deref().unwrap_or("-")
                )
                .unwrap();
            }
        }
        Command::Quit => {
            let notified = router.quit().await;
            writeln!(output, "Notified {} neighbor(s), exiting", notified).unwrap();
        }
    }
    output
}

/// `a ->(w) b ->(w) c`, where each weight is the cost of that single hop.
pub fn render_path(path: &[RouteRow]) -> String {
    let mut rendered = String::new();
    let mut previous: Option<&RouteRow> = None;
    for row in path {
        if let Some(prev) = previous {
            write!(rendered, " ->({}) ", row.distance - prev.distance).unwrap();
        }
        rendered.push_str(&row.target_id);
        previous = Some(row);
    }
    rendered
}
