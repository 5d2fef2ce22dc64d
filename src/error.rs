use crate::{
    ident::{GeneratorId, LinkId, NodeId},
    time::Time,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node {node} is not an endpoint of link {link}")]
    InvalidEndpoint { link: LinkId, node: NodeId },

    #[error("event scheduled at {time} but the clock is already at {now}")]
    PastEventScheduled { time: Time, now: Time },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("unknown link {0}")]
    UnknownLink(LinkId),

    #[error("unknown traffic generator {0}")]
    UnknownGenerator(GeneratorId),

    #[error("link endpoints must be distinct (node {0})")]
    SelfLink(NodeId),

    #[error("node {0} has no attached link to send on")]
    NoLink(NodeId),

    #[error("bandwidth must be nonzero")]
    ZeroBandwidth,

    #[error("loss rate {0} is outside [0, 1]")]
    InvalidLossRate(f64),

    #[error("invalid traffic descriptor: {0}")]
    InvalidTraffic(&'static str),

    #[error("serde error")]
    Serde(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}
