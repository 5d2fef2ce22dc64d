use std::net::IpAddr;

use typed_builder::TypedBuilder;

use crate::{ident::PacketId, time::Time, units::Bytes};

/// Addressing information fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct Header {
    pub source: IpAddr,
    pub destination: IpAddr,
}

/// What finally happened to a packet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derivative::Derivative, serde::Serialize, serde::Deserialize,
)]
#[derivative(Default)]
pub enum Outcome {
    /// Still in flight.
    #[derivative(Default)]
    Pending,
    /// Delivered to its destination at the given time.
    Arrived(Time),
    /// Dropped by a lossy link.
    Lost,
}

/// A packet of data.
///
/// Everything except the outcome is fixed once the packet is built. The outcome moves out of
/// `Pending` at most once.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Packet {
    pub(crate) id: PacketId,
    pub(crate) header: Header,
    #[builder(setter(into))]
    pub(crate) size: Bytes,
    pub(crate) creation_time: Time,
    #[builder(default, setter(skip))]
    pub(crate) outcome: Outcome,
}

impl Packet {
    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn size(&self) -> Bytes {
        self.size
    }

    pub fn creation_time(&self) -> Time {
        self.creation_time
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn arrival_time(&self) -> Option<Time> {
        match self.outcome {
            Outcome::Arrived(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.outcome == Outcome::Lost
    }

    pub(crate) fn mark_arrived(&mut self, time: Time) {
        assert!(time >= self.creation_time);
        self.settle(Outcome::Arrived(time));
    }

    pub(crate) fn mark_lost(&mut self) {
        self.settle(Outcome::Lost);
    }

    fn settle(&mut self, outcome: Outcome) {
        assert_eq!(
            self.outcome,
            Outcome::Pending,
            "packet {} already settled",
            self.id
        );
        self.outcome = outcome;
    }
}
