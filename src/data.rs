use std::{fmt, net::IpAddr};

use rustc_hash::FxHashMap;

use crate::{
    ident::{NodeId, PacketId},
    time::{Delta, Time},
    units::Bytes,
};

/// A packet lifecycle transition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[display(fmt = "created")]
    Created,
    #[display(fmt = "sent")]
    Sent,
    #[display(fmt = "received")]
    Received,
    #[display(fmt = "arrived")]
    Arrived,
    #[display(fmt = "lost")]
    Lost,
}

impl EventKind {
    /// Whether no further transitions follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Arrived | EventKind::Lost)
    }
}

/// One lifecycle transition of one packet, as seen by one node.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LogRecord {
    pub packet: PacketId,
    pub kind: EventKind,
    pub node: NodeId,
    pub time: Time,
    pub source: IpAddr,
    pub destination: IpAddr,
    /// The packet size, header included.
    pub size: Bytes,
}

/// Consumer of packet lifecycle records.
pub trait EventSink {
    fn log_event(&mut self, record: LogRecord);
}

impl EventSink for Vec<LogRecord> {
    fn log_event(&mut self, record: LogRecord) {
        self.push(record);
    }
}

/// The history of a single packet.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PacketTrace {
    pub id: PacketId,
    pub source: IpAddr,
    pub destination: IpAddr,
    pub size: Bytes,
    pub creation_time: Time,
    /// Set once the packet is delivered to its destination.
    pub arrival_time: Option<Time>,
    pub lost: bool,
    pub events: Vec<LogRecord>,
}

impl PacketTrace {
    fn new(record: &LogRecord) -> Self {
        Self {
            id: record.packet,
            source: record.source,
            destination: record.destination,
            size: record.size,
            creation_time: record.time,
            arrival_time: None,
            lost: false,
            events: Vec::new(),
        }
    }

    /// End-to-end delay, for delivered packets.
    pub fn delay(&self) -> Option<Delta> {
        self.arrival_time.map(|t| t - self.creation_time)
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.iter().map(|r| r.kind).collect()
    }
}

/// An in-memory sink that groups records by packet.
#[derive(Debug, Default, Clone)]
pub struct PacketLog {
    traces: FxHashMap<PacketId, PacketTrace>,
    order: Vec<PacketId>,
}

impl PacketLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PacketId) -> Option<&PacketTrace> {
        self.traces.get(&id)
    }

    /// Traces in the order their packets were first seen.
    pub fn iter(&self) -> impl Iterator<Item = &PacketTrace> {
        self.order.iter().filter_map(|id| self.traces.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every record, grouped by packet.
    pub fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.iter().flat_map(|trace| trace.events.iter())
    }
}

impl EventSink for PacketLog {
    fn log_event(&mut self, record: LogRecord) {
        let trace = self.traces.entry(record.packet).or_insert_with(|| {
            self.order.push(record.packet);
            PacketTrace::new(&record)
        });
        match record.kind {
            EventKind::Arrived => trace.arrival_time = Some(record.time),
            EventKind::Lost => trace.lost = true,
            _ => {}
        }
        trace.events.push(record);
    }
}

impl fmt::Display for PacketLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for trace in self.iter() {
            let arrival = match (trace.arrival_time, trace.lost) {
                (Some(t), _) => format!("{}", t.as_secs_f64()),
                (None, true) => "lost".to_owned(),
                (None, false) => "-".to_owned(),
            };
            writeln!(
                f,
                "Packet ID: {} Src: {} {} -> Dst: {} {}",
                trace.id,
                trace.source,
                trace.creation_time.as_secs_f64(),
                trace.destination,
                arrival,
            )?;
            for ev in &trace.events {
                writeln!(f, "Time: {}, Event: {}", ev.time.as_secs_f64(), ev.kind)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(packet: usize, kind: EventKind, node: usize, time: u128) -> LogRecord {
        LogRecord {
            packet: PacketId::new(packet),
            kind,
            node: NodeId::new(node),
            time: Time::new(time),
            source: "10.0.0.1".parse().unwrap(),
            destination: "10.0.0.2".parse().unwrap(),
            size: Bytes::new(125),
        }
    }

    #[test]
    fn traces_group_by_packet() {
        let mut log = PacketLog::new();
        log.log_event(record(1, EventKind::Created, 1, 10));
        log.log_event(record(0, EventKind::Created, 1, 10));
        log.log_event(record(1, EventKind::Sent, 1, 10));
        log.log_event(record(1, EventKind::Arrived, 2, 25));
        log.log_event(record(0, EventKind::Lost, 2, 30));

        assert_eq!(log.len(), 2);
        let ids = log.iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![PacketId::new(1), PacketId::new(0)]);

        let delivered = log.get(PacketId::new(1)).unwrap();
        assert_eq!(
            delivered.kinds(),
            vec![EventKind::Created, EventKind::Sent, EventKind::Arrived]
        );
        assert_eq!(delivered.creation_time, Time::new(10));
        assert_eq!(delivered.delay(), Some(Delta::new(15)));

        let lost = log.get(PacketId::new(0)).unwrap();
        assert!(lost.lost);
        assert_eq!(lost.delay(), None);
        assert_eq!(log.records().count(), 5);
    }

    #[test]
    fn display_lists_every_event() {
        let mut log = PacketLog::new();
        log.log_event(record(0, EventKind::Created, 1, 1_000_000_000));
        log.log_event(record(0, EventKind::Arrived, 2, 1_001_000_000));
        let out = log.to_string();
        assert!(out.starts_with("Packet ID: 0 Src: 10.0.0.1 1 -> Dst: 10.0.0.2 1.001\n"));
        assert!(out.contains("Time: 1.001, Event: arrived"));
    }

    #[test]
    fn terminal_kinds() {
        assert!(EventKind::Lost.is_terminal());
        assert!(EventKind::Arrived.is_terminal());
        assert!(!EventKind::Received.is_terminal());
    }
}
