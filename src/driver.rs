use std::{net::IpAddr, path::Path};

use crate::{
    data::PacketLog,
    error::Error,
    ident::NodeId,
    network::Network,
    topology::Topology,
    units::Nanosecs,
    LinkConfig, TrafficDesc,
};

/// A node to create.
#[derive(Debug, Clone, Copy, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct NodeDesc {
    pub id: NodeId,
    pub address: IpAddr,
}

/// A link to create between two existing nodes.
#[derive(Debug, Clone, Copy, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct LinkDesc {
    pub a: NodeId,
    pub b: NodeId,
    #[serde(flatten)]
    pub config: LinkConfig,
}

/// Everything needed to set up and run a simulation.
///
/// Nodes are created first, then links in the order given (which decides each node's outgoing
/// link), then traffic.
#[derive(Debug, Clone, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Seed for loss decisions.
    #[builder(default)]
    #[serde(default)]
    pub seed: u64,
    pub nodes: Vec<NodeDesc>,
    pub links: Vec<LinkDesc>,
    #[builder(default)]
    #[serde(default)]
    pub traffic: Vec<TrafficDesc>,
    /// Stop dispatching after this much simulated time.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub timeout: Option<Nanosecs>,
}

/// Builds the network described by `cfg` without running it.
pub fn build(cfg: &Config) -> Result<Network<PacketLog, Topology>, Error> {
    let mut network = Network::with_seed(cfg.seed);
    for node in &cfg.nodes {
        network.add_node(node.id, node.address)?;
    }
    for link in &cfg.links {
        network.add_link(link.a, link.b, link.config)?;
    }
    for &desc in &cfg.traffic {
        network.schedule_traffic(desc)?;
    }
    Ok(network)
}

/// Builds and runs the network described by `cfg`, returning the packet log and topology.
pub fn run(cfg: &Config) -> Result<(PacketLog, Topology), Error> {
    let mut network = build(cfg)?;
    match cfg.timeout {
        Some(timeout) => network.run_until(timeout)?,
        None => network.run()?,
    }
    Ok(network.into_parts())
}

pub fn read_config(path: impl AsRef<Path>) -> Result<Config, Error> {
    let s = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&s)?)
}
