use std::cmp;

use rand::Rng;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::{
    error::Error,
    ident::{LinkId, NodeId},
    network::Context,
    packet::Packet,
    queue::TimedQueue,
    time::{Delta, Time},
    units::{BitsPerSec, Bytes, Nanosecs},
};

use super::node::NodeCmd;

/// Fixed properties of a link.
#[derive(Debug, Clone, Copy, TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct LinkConfig {
    #[builder(setter(into))]
    pub bandwidth: BitsPerSec,
    /// Propagation delay, counted from the moment a packet starts being serialized.
    #[builder(setter(into))]
    pub delay: Nanosecs,
    /// Probability that a packet is dropped.
    #[builder(default)]
    #[serde(default)]
    pub loss_rate: f64,
}

impl LinkConfig {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.bandwidth == BitsPerSec::ZERO {
            return Err(Error::ZeroBandwidth);
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(Error::InvalidLossRate(self.loss_rate));
        }
        Ok(())
    }
}

/// One of the two traffic flows on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    /// From the first endpoint to the second.
    Forward,
    /// From the second endpoint to the first.
    Reverse,
}

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Reverse => 1,
        }
    }
}

#[derive(Debug)]
struct Transfer {
    packet: Packet,
    transfer_time: Delta,
}

// Serialization state for one direction
#[derive(Debug, Default)]
struct Lane {
    queue: TimedQueue<Transfer>,
    // Serialization time committed to this direction but not yet elapsed
    backlog: Delta,
}

/// A bidirectional link. Each direction serializes its packets FIFO, independently of the other.
#[derive(Debug)]
pub struct Link {
    id: LinkId,
    endpoints: [NodeId; 2],
    config: LinkConfig,
    lanes: [Lane; 2],
}

impl Link {
    pub(crate) fn new(id: LinkId, a: NodeId, b: NodeId, config: LinkConfig) -> Result<Self, Error> {
        if a == b {
            return Err(Error::SelfLink(a));
        }
        config.validate()?;
        Ok(Self {
            id,
            endpoints: [a, b],
            config,
            lanes: Default::default(),
        })
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.endpoints[0], self.endpoints[1])
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn direction_from(&self, node: NodeId) -> Result<Direction, Error> {
        match node {
            n if n == self.endpoints[0] => Ok(Direction::Forward),
            n if n == self.endpoints[1] => Ok(Direction::Reverse),
            _ => Err(Error::InvalidEndpoint {
                link: self.id,
                node,
            }),
        }
    }

    /// The endpoint packets travelling in `direction` are delivered to.
    pub fn receiver(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Forward => self.endpoints[1],
            Direction::Reverse => self.endpoints[0],
        }
    }

    pub fn backlog(&self, direction: Direction) -> Delta {
        self.lanes[direction.index()].backlog
    }

    /// Number of packets waiting for service in `direction`.
    pub fn queued(&self, direction: Direction) -> usize {
        self.lanes[direction.index()].queue.len()
    }

    pub fn transfer_time(&self, size: Bytes) -> Delta {
        self.config.bandwidth.length(size).into_delta()
    }

    /// Queues `packet` behind everything already committed in its direction and returns the time
    /// its service will begin.
    pub(crate) fn enqueue(
        &mut self,
        packet: Packet,
        from: NodeId,
        ctx: &mut Context,
    ) -> Result<Time, Error> {
        let direction = self.direction_from(from)?;
        let transfer_time = self.transfer_time(packet.size);
        let lane = &mut self.lanes[direction.index()];
        let dequeue_time = ctx.cur_time + lane.backlog;
        let was_empty = lane.queue.is_empty();
        lane.queue.push(
            dequeue_time,
            Transfer {
                packet,
                transfer_time,
            },
        );
        lane.backlog += transfer_time;
        if was_empty {
            ctx.schedule_at(dequeue_time, LinkCmd::new_begin_transfer(self.id, direction));
        }
        Ok(dequeue_time)
    }

    pub(crate) fn begin_transfer<R: Rng>(
        &mut self,
        direction: Direction,
        rng: &mut R,
        ctx: &mut Context,
    ) {
        let receiver = self.receiver(direction);
        let lane = &mut self.lanes[direction.index()];
        let (dequeue_time, transfer) = lane
            .queue
            .pop()
            .expect("transfer started on an empty lane");
        let Transfer {
            mut packet,
            transfer_time,
        } = transfer;

        if rng.gen_bool(self.config.loss_rate) {
            debug!(link = %self.id, packet = %packet.id, now = %ctx.cur_time, "packet dropped");
            packet.mark_lost();
        }
        // Lost packets are still delivered so the receiver can account for them
        ctx.schedule(
            self.config.delay.into_delta(),
            NodeCmd::new_receive(receiver, packet),
        );
        // An entry keyed ahead of one committed earlier can be popped after its own dequeue time;
        // its finish is then clamped to now.
        debug_assert!(dequeue_time <= ctx.cur_time);
        ctx.schedule_at(
            cmp::max(dequeue_time + transfer_time, ctx.cur_time),
            LinkCmd::new_finish_transfer(self.id, direction, transfer_time),
        );
        if let Some(next) = lane.queue.peek_time() {
            ctx.schedule_at(
                cmp::max(next, ctx.cur_time),
                LinkCmd::new_begin_transfer(self.id, direction),
            );
        }
    }

    pub(crate) fn finish_transfer(&mut self, direction: Direction, transfer_time: Delta) {
        let lane = &mut self.lanes[direction.index()];
        assert!(lane.backlog >= transfer_time);
        lane.backlog -= transfer_time;
    }
}

#[derive(Debug, Clone, Copy, derive_new::new)]
pub(crate) enum LinkCmd {
    BeginTransfer {
        link: LinkId,
        direction: Direction,
    },
    FinishTransfer {
        link: LinkId,
        direction: Direction,
        transfer_time: Delta,
    },
}
