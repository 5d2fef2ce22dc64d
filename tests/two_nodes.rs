use std::net::IpAddr;

use netsim::{
    time::{Delta, Time},
    units::{BitsPerSec, Bytes, Millisecs, Secs},
    Direction, EventKind, LinkConfig, LinkId, Network, NodeId, PacketId, TrafficDesc,
};

const N1: NodeId = NodeId::new(1);
const N2: NodeId = NodeId::new(2);

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn secs(s: f64) -> Time {
    Time::new((s * 1e9).round() as u128)
}

// 40-byte header plus `payload` bytes
fn send(
    network: &mut Network,
    at: Secs,
    from: NodeId,
    to: &str,
    payload: u64,
) -> Result<(), netsim::Error> {
    network.schedule_packet(at, from, addr(to), Bytes::new(40), Bytes::new(payload))
}

// Two directly linked nodes: 10 kb/s, 1 ms propagation delay
fn two_nodes(loss_rate: f64) -> anyhow::Result<(Network, LinkId)> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut network = Network::with_seed(42);
    network.add_node(N1, addr("192.168.100.1"))?;
    network.add_node(N2, addr("192.168.100.2"))?;
    let link = network.add_link(
        N1,
        N2,
        LinkConfig::builder()
            .bandwidth(BitsPerSec::new(10_000))
            .delay(Millisecs::new(1))
            .loss_rate(loss_rate)
            .build(),
    )?;
    Ok((network, link))
}

#[test]
fn single_packet_arrives_after_propagation_delay() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(0.0)?;
    send(&mut network, Secs::new(1), N1, "192.168.100.2", 85)?;
    network.run()?;

    let trace = network.sink().get(PacketId::ZERO).expect("packet not logged");
    assert_eq!(trace.size, Bytes::new(125));
    assert_eq!(trace.creation_time, secs(1.0));
    assert_eq!(trace.arrival_time, Some(secs(1.001)));
    assert_eq!(
        trace.kinds(),
        vec![EventKind::Created, EventKind::Sent, EventKind::Arrived]
    );
    let arrived = trace.events.last().unwrap();
    assert_eq!(arrived.node, N2);
    // The clock stops at the last event: the end of serialization
    assert_eq!(network.now(), secs(1.1));
    Ok(())
}

#[test]
fn certain_loss_is_logged_as_lost() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(1.0)?;
    send(&mut network, Secs::new(1), N1, "192.168.100.2", 85)?;
    network.run()?;

    let trace = network.sink().get(PacketId::ZERO).expect("packet not logged");
    assert_eq!(
        trace.kinds(),
        vec![EventKind::Created, EventKind::Sent, EventKind::Lost]
    );
    assert!(trace.lost);
    assert_eq!(trace.arrival_time, None);
    Ok(())
}

#[test]
fn lossy_link_never_delivers() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(1.0)?;
    network.schedule_traffic(
        TrafficDesc::builder()
            .source(N1)
            .destination(addr("192.168.100.2"))
            .bitrate(BitsPerSec::new(20_000))
            .start(Secs::new(0))
            .duration(Secs::new(2))
            .header_size(Bytes::new(40))
            .payload_size(Bytes::new(85))
            .build(),
    )?;
    network.run()?;
    let log = network.sink();
    assert_eq!(log.len(), 40);
    assert!(log.iter().all(|t| t.lost && t.arrival_time.is_none()));
    assert!(log.records().all(|r| r.kind != EventKind::Arrived));
    Ok(())
}

#[test]
fn queued_packets_arrive_at_service_start_plus_delay() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(0.0)?;
    for _ in 0..3 {
        send(&mut network, Secs::new(1), N1, "192.168.100.2", 85)?;
    }
    network.run()?;

    // Service starts at 1.0, 1.1 and 1.2; a packet's own serialization does not delay it
    let arrivals = network
        .sink()
        .iter()
        .map(|t| t.arrival_time)
        .collect::<Vec<_>>();
    assert_eq!(
        arrivals,
        vec![Some(secs(1.001)), Some(secs(1.101)), Some(secs(1.201))]
    );
    Ok(())
}

#[test]
fn backlog_drains_after_transfer_time() -> anyhow::Result<()> {
    let (mut network, link) = two_nodes(0.0)?;
    send(&mut network, Secs::new(1), N1, "192.168.100.2", 85)?;

    network.run_until(Secs::new(1))?;
    let transfer = Millisecs::new(100).into_delta();
    assert_eq!(network.link(link).unwrap().backlog(Direction::Forward), transfer);
    assert_eq!(network.link(link).unwrap().backlog(Direction::Reverse), Delta::ZERO);

    network.run_until(secs(1.099))?;
    assert_eq!(network.link(link).unwrap().backlog(Direction::Forward), transfer);

    network.run_until(secs(1.1))?;
    assert_eq!(network.link(link).unwrap().backlog(Direction::Forward), Delta::ZERO);
    assert_eq!(network.pending_events(), 0);
    Ok(())
}

#[test]
fn reverse_traffic_is_not_blocked() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(0.0)?;
    // A large packet ties up the forward direction for 0.8 s
    send(&mut network, Secs::new(1), N1, "192.168.100.2", 960)?;
    send(&mut network, Secs::new(1), N2, "192.168.100.1", 85)?;
    network.run()?;

    let reverse = network.sink().get(PacketId::ONE).unwrap();
    assert_eq!(reverse.arrival_time, Some(secs(1.001)));
    assert_eq!(reverse.events.last().unwrap().node, N1);
    Ok(())
}

#[test]
fn constant_bitrate_traffic_creates_on_schedule() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(0.0)?;
    let gen = network.schedule_traffic(
        TrafficDesc::builder()
            .source(N1)
            .destination(addr("192.168.100.2"))
            .bitrate(BitsPerSec::new(1_000))
            .start(Secs::new(1))
            .duration(Secs::new(10))
            .header_size(Bytes::new(40))
            .payload_size(Bytes::new(85))
            .build(),
    )?;
    network.run()?;

    let created = network
        .sink()
        .iter()
        .map(|t| t.creation_time)
        .collect::<Vec<_>>();
    let expected = (1..=10).map(|s| Secs::new(s).into_time()).collect::<Vec<_>>();
    assert_eq!(created, expected);
    let one_ms = Some(Millisecs::new(1).into_delta());
    assert!(network.sink().iter().all(|t| t.delay() == one_ms));

    let gen = network.generator(gen).unwrap();
    assert_eq!(gen.created(), 10);
    assert!(!gen.is_active());
    Ok(())
}

#[test]
fn run_until_resumes_where_it_left_off() -> anyhow::Result<()> {
    let desc = TrafficDesc::builder()
        .source(N1)
        .destination(addr("192.168.100.2"))
        .bitrate(BitsPerSec::new(1_000))
        .start(Secs::new(1))
        .duration(Secs::new(10))
        .header_size(Bytes::new(40))
        .payload_size(Bytes::new(85))
        .build();

    let (mut whole, _) = two_nodes(0.3)?;
    whole.schedule_traffic(desc)?;
    whole.run()?;

    let (mut stepped, _) = two_nodes(0.3)?;
    stepped.schedule_traffic(desc)?;
    stepped.run_until(secs(4.5))?;
    assert_eq!(stepped.sink().len(), 4);
    assert!(stepped.pending_events() > 0);
    for end in [5, 7, 8, 20] {
        stepped.run_until(Secs::new(end))?;
    }
    stepped.run()?;

    let a = whole.sink().records().copied().collect::<Vec<_>>();
    let b = stepped.sink().records().copied().collect::<Vec<_>>();
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn same_seed_same_losses() -> anyhow::Result<()> {
    let run = || -> anyhow::Result<Vec<bool>> {
        let (mut network, _) = two_nodes(0.5)?;
        network.schedule_traffic(
            TrafficDesc::builder()
                .source(N1)
                .destination(addr("192.168.100.2"))
                .bitrate(BitsPerSec::new(5_000))
                .start(Secs::new(0))
                .duration(Secs::new(10))
                .header_size(Bytes::new(40))
                .payload_size(Bytes::new(85))
                .build(),
        )?;
        network.run()?;
        Ok(network.sink().iter().map(|t| t.lost).collect())
    };
    let first = run()?;
    assert_eq!(first.len(), 50);
    assert!(first.iter().any(|&lost| lost));
    assert!(first.iter().any(|&lost| !lost));
    assert_eq!(first, run()?);
    Ok(())
}

#[test]
fn stopped_traffic_creates_nothing_more() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(0.0)?;
    let gen = network.schedule_traffic(
        TrafficDesc::builder()
            .source(N1)
            .destination(addr("192.168.100.2"))
            .bitrate(BitsPerSec::new(1_000))
            .start(Secs::new(1))
            .duration(Secs::new(10))
            .header_size(Bytes::new(40))
            .payload_size(Bytes::new(85))
            .build(),
    )?;
    network.run_until(Secs::new(3))?;
    network.stop_traffic(gen)?;
    network.run()?;
    assert_eq!(network.sink().len(), 3);
    assert_eq!(network.generator(gen).unwrap().created(), 3);
    Ok(())
}

#[test]
fn loopback_and_foreign_destinations() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(0.0)?;
    send(&mut network, Secs::new(1), N1, "192.168.100.1", 85)?;
    send(&mut network, Secs::new(2), N1, "192.168.100.9", 85)?;
    network.run()?;

    let local = network.sink().get(PacketId::new(0)).unwrap();
    assert_eq!(local.arrival_time, Some(secs(1.0)));
    assert!(local.events.iter().all(|r| r.node == N1));

    // Delivered to the neighbour, which does not forward it
    let foreign = network.sink().get(PacketId::new(1)).unwrap();
    assert_eq!(
        foreign.kinds(),
        vec![EventKind::Created, EventKind::Sent, EventKind::Received]
    );
    assert_eq!(foreign.arrival_time, None);
    Ok(())
}

#[test]
fn first_attached_link_is_used() -> anyhow::Result<()> {
    let (mut network, first) = two_nodes(0.0)?;
    let n3 = NodeId::new(3);
    network.add_node(n3, addr("192.168.100.3"))?;
    let second = network.add_link(
        N1,
        n3,
        LinkConfig::builder()
            .bandwidth(BitsPerSec::new(10_000))
            .delay(Millisecs::new(1))
            .build(),
    )?;
    assert_eq!(network.node(N1).unwrap().links(), &[first, second]);

    // Addressed to node 3, but node 1 only ever uses its first link
    send(&mut network, Secs::new(1), N1, "192.168.100.3", 85)?;
    network.run()?;
    let trace = network.sink().get(PacketId::ZERO).unwrap();
    let last = trace.events.last().unwrap();
    assert_eq!((last.kind, last.node), (EventKind::Received, N2));
    Ok(())
}

#[test]
fn topology_is_recorded() -> anyhow::Result<()> {
    let (network, _) = two_nodes(0.0)?;
    let topology = network.recorder();
    let labels = topology.nodes.iter().map(|n| n.label.as_str()).collect::<Vec<_>>();
    assert_eq!(labels, vec!["Node 1 (192.168.100.1)", "Node 2 (192.168.100.2)"]);
    assert_eq!(topology.links.len(), 1);
    assert_eq!((topology.links[0].a, topology.links[0].b), (N1, N2));
    Ok(())
}

#[test]
fn scheduling_in_the_past_is_rejected() -> anyhow::Result<()> {
    let (mut network, _) = two_nodes(0.0)?;
    send(&mut network, Secs::new(2), N1, "192.168.100.2", 85)?;
    network.run()?;
    let err = send(&mut network, Secs::new(1), N1, "192.168.100.2", 85)
        .unwrap_err();
    assert!(matches!(err, netsim::Error::PastEventScheduled { .. }));
    Ok(())
}
