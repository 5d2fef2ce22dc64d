use crate::{
    ident::NodeId,
    units::{BitsPerSec, Nanosecs},
};

/// Write-only consumer of the network's shape, called once per node and once per link as they
/// are added.
pub trait TopologyRecorder {
    fn add_node(&mut self, id: NodeId, label: &str);

    fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        label: &str,
        bandwidth: BitsPerSec,
        delay: Nanosecs,
    );
}

/// Discards everything.
impl TopologyRecorder for () {
    fn add_node(&mut self, _: NodeId, _: &str) {}

    fn add_link(&mut self, _: NodeId, _: NodeId, _: &str, _: BitsPerSec, _: Nanosecs) {}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LinkEntry {
    pub a: NodeId,
    pub b: NodeId,
    pub label: String,
    pub bandwidth: BitsPerSec,
    pub delay: Nanosecs,
}

/// An in-memory recorder, e.g. for handing off to a renderer as JSON.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Topology {
    pub nodes: Vec<NodeEntry>,
    pub links: Vec<LinkEntry>,
}

impl Topology {
    pub fn to_json(&self) -> Result<String, crate::Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl TopologyRecorder for Topology {
    fn add_node(&mut self, id: NodeId, label: &str) {
        self.nodes.push(NodeEntry {
            id,
            label: label.to_owned(),
        });
    }

    fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        label: &str,
        bandwidth: BitsPerSec,
        delay: Nanosecs,
    ) {
        self.links.push(LinkEntry {
            a,
            b,
            label: label.to_owned(),
            bandwidth,
            delay,
        });
    }
}

pub(crate) fn node_label(id: NodeId, address: impl std::fmt::Display) -> String {
    format!("Node {id} ({address})")
}

pub(crate) fn link_label(bandwidth: BitsPerSec, delay: Nanosecs) -> String {
    format!("{}Mbps, {}s", bandwidth.into_mbps_f64(), delay.as_secs_f64())
}
