use std::net::IpAddr;

use typed_builder::TypedBuilder;

use crate::{
    error::Error,
    ident::{GeneratorId, NodeId},
    network::Context,
    time::{Delta, Time},
    units::{BitsPerSec, Bytes, Nanosecs},
};

/// A constant-bitrate traffic source.
#[derive(Debug, Clone, Copy, TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct TrafficDesc {
    /// The node generating the packets.
    pub source: NodeId,
    pub destination: IpAddr,
    #[builder(setter(into))]
    pub bitrate: BitsPerSec,
    #[builder(setter(into))]
    pub start: Nanosecs,
    #[builder(setter(into))]
    pub duration: Nanosecs,
    #[builder(setter(into))]
    pub header_size: Bytes,
    #[builder(setter(into))]
    pub payload_size: Bytes,
    /// Scales the gap between packets; 1.0 is exactly the configured bitrate.
    #[builder(default = 1.0)]
    #[serde(default = "default_burstiness")]
    pub burstiness: f64,
}

fn default_burstiness() -> f64 {
    1.0
}

impl TrafficDesc {
    pub fn packet_size(&self) -> Bytes {
        self.header_size + self.payload_size
    }
}

/// The state of a running [`TrafficDesc`].
///
/// Each firing creates one packet and queues the next firing one interval later, until the clock
/// reaches the end of the window or the generator is stopped.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    id: GeneratorId,
    desc: TrafficDesc,
    interval: Delta,
    end: Time,
    active: bool,
    created: usize,
}

impl TrafficGenerator {
    pub(crate) fn new(id: GeneratorId, desc: TrafficDesc) -> Result<Self, Error> {
        if desc.bitrate == BitsPerSec::ZERO {
            return Err(Error::InvalidTraffic("bitrate must be nonzero"));
        }
        if desc.packet_size() == Bytes::ZERO {
            return Err(Error::InvalidTraffic("packets must not be empty"));
        }
        if !(desc.burstiness.is_finite() && desc.burstiness > 0.0) {
            return Err(Error::InvalidTraffic("burstiness must be positive"));
        }
        let interval = desc
            .bitrate
            .length(desc.packet_size())
            .scale_by(desc.burstiness)
            .into_delta();
        if interval == Delta::ZERO {
            return Err(Error::InvalidTraffic("packet interval rounds to zero"));
        }
        Ok(Self {
            id,
            desc,
            interval,
            end: desc.start.into_time() + desc.duration.into_delta(),
            active: true,
            created: 0,
        })
    }

    pub fn id(&self) -> GeneratorId {
        self.id
    }

    pub fn desc(&self) -> &TrafficDesc {
        &self.desc
    }

    pub fn interval(&self) -> Delta {
        self.interval
    }

    /// Firings at or after this time create nothing.
    pub fn end_time(&self) -> Time {
        self.end
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of packets created so far.
    pub fn created(&self) -> usize {
        self.created
    }

    pub(crate) fn stop(&mut self) {
        self.active = false;
    }

    /// Returns whether this firing should create a packet.
    pub(crate) fn fire(&mut self, now: Time) -> bool {
        if !self.active {
            return false;
        }
        if now >= self.end {
            self.active = false;
            return false;
        }
        self.created += 1;
        true
    }

    pub(crate) fn reschedule(&self, ctx: &mut Context) {
        ctx.schedule(self.interval, TrafficCmd::new_fire(self.id));
    }
}

#[derive(Debug, Clone, Copy, derive_new::new)]
pub(crate) enum TrafficCmd {
    Fire(GeneratorId),
}
