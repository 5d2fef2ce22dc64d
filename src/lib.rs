pub mod driver;
pub mod schedule;
pub mod time;
pub mod topology;
pub mod units;

pub(crate) mod data;
pub(crate) mod entities;
pub(crate) mod error;
pub(crate) mod ident;
pub(crate) mod network;
pub(crate) mod packet;
pub(crate) mod queue;

pub use data::{EventKind, EventSink, LogRecord, PacketLog, PacketTrace};
pub use driver::Config;
pub use entities::{
    link::{Direction, Link, LinkConfig},
    node::Node,
    traffic::{TrafficDesc, TrafficGenerator},
};
pub use error::Error;
pub use ident::{GeneratorId, LinkId, NodeId, PacketId};
pub use network::Network;
pub use packet::{Header, Outcome, Packet};
