use std::net::IpAddr;

use rand::{rngs::StdRng, SeedableRng};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::{
    data::{EventKind, EventSink, LogRecord, PacketLog},
    entities::{
        link::{Link, LinkCmd, LinkConfig},
        node::{Hop, Node, NodeCmd},
        traffic::{TrafficCmd, TrafficDesc, TrafficGenerator},
    },
    error::Error,
    ident::{GeneratorId, LinkId, NodeId, PacketId},
    packet::{Outcome, Packet},
    schedule::{
        event::{Event, EventList},
        Dispatch, Scheduler,
    },
    time::{Delta, Time},
    topology::{self, Topology, TopologyRecorder},
    units::Bytes,
};

/// A simulated network: nodes, the links between them, traffic sources, and the scheduler that
/// drives them.
///
/// Packet lifecycle records go to the event sink `S`; the shape of the network is reported to
/// the recorder `R` as it is built.
#[derive(Debug)]
pub struct Network<S = PacketLog, R = Topology> {
    scheduler: Scheduler<Command>,
    world: World<S>,
    recorder: R,
}

impl Network {
    /// A network logging into a [`PacketLog`] and recording into a [`Topology`].
    pub fn with_seed(seed: u64) -> Self {
        Self::new(seed, PacketLog::new(), Topology::default())
    }
}

impl<S: EventSink, R: TopologyRecorder> Network<S, R> {
    /// `seed` drives every loss decision, so runs with the same seed are identical.
    pub fn new(seed: u64, sink: S, recorder: R) -> Self {
        Self {
            scheduler: Scheduler::new(),
            world: World {
                nodes: FxHashMap::default(),
                links: Vec::new(),
                generators: Vec::new(),
                rng: StdRng::seed_from_u64(seed),
                sink,
                next_packet: PacketId::ZERO,
            },
            recorder,
        }
    }

    pub fn add_node(&mut self, id: NodeId, address: IpAddr) -> Result<(), Error> {
        if self.world.nodes.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        self.world.nodes.insert(id, Node::new(id, address));
        self.recorder.add_node(id, &topology::node_label(id, address));
        Ok(())
    }

    /// Connects `a` and `b`. Each node sends on the first link attached to it.
    pub fn add_link(&mut self, a: NodeId, b: NodeId, config: LinkConfig) -> Result<LinkId, Error> {
        for id in [a, b] {
            if !self.world.nodes.contains_key(&id) {
                return Err(Error::UnknownNode(id));
            }
        }
        let id = LinkId::new(self.world.links.len());
        let link = Link::new(id, a, b, config)?;
        self.world.links.push(link);
        for node in [a, b] {
            if let Some(node) = self.world.nodes.get_mut(&node) {
                node.attach(id);
            }
        }
        let label = topology::link_label(config.bandwidth, config.delay);
        self.recorder
            .add_link(a, b, &label, config.bandwidth, config.delay);
        Ok(id)
    }

    /// Has `node` create and send one packet at time `at`.
    pub fn schedule_packet(
        &mut self,
        at: impl Into<Time>,
        node: NodeId,
        destination: IpAddr,
        header_size: impl Into<Bytes>,
        payload_size: impl Into<Bytes>,
    ) -> Result<(), Error> {
        self.world.node(node)?;
        let cmd = NodeCmd::new_create_packet(
            node,
            destination,
            header_size.into(),
            payload_size.into(),
        );
        self.scheduler.schedule(at.into(), cmd)
    }

    /// Starts a constant-bitrate source at `desc.start`.
    pub fn schedule_traffic(&mut self, desc: TrafficDesc) -> Result<GeneratorId, Error> {
        self.world.node(desc.source)?;
        let id = GeneratorId::new(self.world.generators.len());
        let generator = TrafficGenerator::new(id, desc)?;
        self.scheduler
            .schedule(desc.start.into_time(), TrafficCmd::new_fire(id))?;
        self.world.generators.push(generator);
        Ok(id)
    }

    /// Stops a traffic source. Its next firing creates nothing and is not rescheduled.
    pub fn stop_traffic(&mut self, id: GeneratorId) -> Result<(), Error> {
        self.world
            .generators
            .get_mut(id.into_usize())
            .ok_or(Error::UnknownGenerator(id))?
            .stop();
        Ok(())
    }

    /// Runs until no events are left.
    pub fn run(&mut self) -> Result<(), Error> {
        self.scheduler.run(&mut self.world)
    }

    /// Runs every event due at or before `end`. Later events stay queued for the next call.
    pub fn run_until(&mut self, end: impl Into<Time>) -> Result<(), Error> {
        self.scheduler.run_until(end.into(), &mut self.world)
    }

    pub fn now(&self) -> Time {
        self.scheduler.now()
    }

    /// Number of events waiting to be dispatched.
    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.world.nodes.get(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.world.links.get(id.into_usize())
    }

    pub fn generator(&self, id: GeneratorId) -> Option<&TrafficGenerator> {
        self.world.generators.get(id.into_usize())
    }

    pub fn sink(&self) -> &S {
        &self.world.sink
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn into_parts(self) -> (S, R) {
        (self.world.sink, self.recorder)
    }
}

// Everything the handlers touch, kept apart from the scheduler that drives them
#[derive(Debug)]
struct World<S> {
    nodes: FxHashMap<NodeId, Node>,
    links: Vec<Link>,
    generators: Vec<TrafficGenerator>,
    rng: StdRng,
    sink: S,
    next_packet: PacketId,
}

impl<S: EventSink> Dispatch<Command> for World<S> {
    type Error = Error;

    fn dispatch(&mut self, now: Time, cmd: Command) -> Result<EventList<Command>, Error> {
        let mut ctx = Context::new(now);
        let res = self.apply(cmd, &mut ctx);
        let (events, records) = ctx.into_parts();
        for record in records {
            self.sink.log_event(record);
        }
        res.map(|()| events)
    }
}

// Command handlers
impl<S: EventSink> World<S> {
    fn apply(&mut self, cmd: Command, ctx: &mut Context) -> Result<(), Error> {
        match cmd {
            Command::Node(cmd) => self.apply_node(cmd, ctx),
            Command::Link(cmd) => self.apply_link(cmd, ctx),
            Command::Traffic(cmd) => self.apply_traffic(cmd, ctx),
        }
    }

    fn apply_node(&mut self, cmd: NodeCmd, ctx: &mut Context) -> Result<(), Error> {
        match cmd {
            NodeCmd::CreatePacket {
                node,
                destination,
                header_size,
                payload_size,
            } => self.create_packet(node, destination, header_size + payload_size, ctx),
            NodeCmd::Receive { node, packet } => {
                self.node(node)?.receive(packet, ctx);
                Ok(())
            }
        }
    }

    fn apply_link(&mut self, cmd: LinkCmd, ctx: &mut Context) -> Result<(), Error> {
        match cmd {
            LinkCmd::BeginTransfer { link, direction } => {
                let link = self
                    .links
                    .get_mut(link.into_usize())
                    .ok_or(Error::UnknownLink(link))?;
                link.begin_transfer(direction, &mut self.rng, ctx);
            }
            LinkCmd::FinishTransfer {
                link,
                direction,
                transfer_time,
            } => {
                self.link_mut(link)?
                    .finish_transfer(direction, transfer_time);
            }
        }
        Ok(())
    }

    fn apply_traffic(&mut self, cmd: TrafficCmd, ctx: &mut Context) -> Result<(), Error> {
        match cmd {
            TrafficCmd::Fire(id) => {
                let generator = self
                    .generators
                    .get_mut(id.into_usize())
                    .ok_or(Error::UnknownGenerator(id))?;
                if !generator.fire(ctx.cur_time) {
                    debug!(generator = %id, now = %ctx.cur_time, "traffic generator finished");
                    return Ok(());
                }
                let desc = *generator.desc();
                self.create_packet(desc.source, desc.destination, desc.packet_size(), ctx)?;
                self.generators[id.into_usize()].reschedule(ctx);
                Ok(())
            }
        }
    }

    fn create_packet(
        &mut self,
        node: NodeId,
        destination: IpAddr,
        size: Bytes,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        let id = self.next_packet.bump();
        let packet = self.node(node)?.create_packet(id, destination, size, ctx);
        self.send(node, packet, ctx)
    }

    fn send(&mut self, node: NodeId, packet: Packet, ctx: &mut Context) -> Result<(), Error> {
        match self.node(node)?.send(packet, ctx)? {
            Hop::Delivered => Ok(()),
            Hop::Forward { link, packet } => {
                self.link_mut(link)?.enqueue(packet, node, ctx)?;
                Ok(())
            }
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, Error> {
        self.nodes.get(&id).ok_or(Error::UnknownNode(id))
    }

    fn link_mut(&mut self, id: LinkId) -> Result<&mut Link, Error> {
        self.links
            .get_mut(id.into_usize())
            .ok_or(Error::UnknownLink(id))
    }
}

#[derive(Debug, Clone, derive_more::From)]
pub(crate) enum Command {
    Node(NodeCmd),
    Link(LinkCmd),
    Traffic(TrafficCmd),
}

/// What a handler sees of the simulation: the current time, plus buffers for the events it
/// schedules and the lifecycle records it emits.
#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) cur_time: Time,
    events: EventList<Command>,
    records: SmallVec<[LogRecord; 4]>,
}

impl Context {
    pub(crate) fn new(cur_time: Time) -> Self {
        Self {
            cur_time,
            events: EventList::new(),
            records: SmallVec::new(),
        }
    }

    pub(crate) fn schedule(&mut self, delta: Delta, cmd: impl Into<Command>) {
        let time = self.cur_time + delta;
        self.schedule_at(time, cmd);
    }

    pub(crate) fn schedule_at(&mut self, time: Time, cmd: impl Into<Command>) {
        self.events.push(Event::new(time, cmd));
    }

    /// Records `kind` for `packet`. Terminal records must agree with the outcome the packet
    /// carries, since the sink is the only place that outcome is visible once the run is over.
    pub(crate) fn log(&mut self, kind: EventKind, node: NodeId, packet: &Packet) {
        debug_assert!(
            match kind {
                EventKind::Arrived => packet.arrival_time() == Some(self.cur_time),
                EventKind::Lost => packet.is_lost(),
                _ => packet.outcome() == Outcome::Pending,
            },
            "{kind} record for packet {} with outcome {:?}",
            packet.id,
            packet.outcome
        );
        trace!(
            now = %self.cur_time,
            packet = %packet.id,
            %node,
            %kind,
            src = %packet.header.source,
            dst = %packet.header.destination,
            "packet event"
        );
        self.records.push(LogRecord {
            packet: packet.id,
            kind,
            node,
            time: self.cur_time,
            source: packet.header.source,
            destination: packet.header.destination,
            size: packet.size,
        });
    }

    pub(crate) fn into_parts(self) -> (EventList<Command>, SmallVec<[LogRecord; 4]>) {
        (self.events, self.records)
    }
}
