use std::net::IpAddr;

use smallvec::SmallVec;

use crate::{
    data::EventKind,
    error::Error,
    ident::{LinkId, NodeId, PacketId},
    network::Context,
    packet::{Header, Outcome, Packet},
    units::Bytes,
};

/// An addressable endpoint.
///
/// A node only ever sends on the first link attached to it. It delivers packets addressed to
/// itself and does not forward anything else.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    address: IpAddr,
    links: SmallVec<[LinkId; 4]>,
}

impl Node {
    pub(crate) fn new(id: NodeId, address: IpAddr) -> Self {
        Self {
            id,
            address,
            links: SmallVec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Attached links, in attachment order.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub(crate) fn attach(&mut self, link: LinkId) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    pub(crate) fn create_packet(
        &self,
        id: PacketId,
        destination: IpAddr,
        size: Bytes,
        ctx: &mut Context,
    ) -> Packet {
        let packet = Packet::builder()
            .id(id)
            .header(Header::new(self.address, destination))
            .size(size)
            .creation_time(ctx.cur_time)
            .build();
        ctx.log(EventKind::Created, self.id, &packet);
        packet
    }

    #[must_use = "a forwarded packet has to be handed to its link"]
    pub(crate) fn send(&self, packet: Packet, ctx: &mut Context) -> Result<Hop, Error> {
        ctx.log(EventKind::Sent, self.id, &packet);
        if packet.header.destination == self.address {
            self.receive(packet, ctx);
            return Ok(Hop::Delivered);
        }
        match self.links.first() {
            Some(&link) => Ok(Hop::Forward { link, packet }),
            None => Err(Error::NoLink(self.id)),
        }
    }

    pub(crate) fn receive(&self, mut packet: Packet, ctx: &mut Context) {
        if packet.outcome == Outcome::Lost {
            ctx.log(EventKind::Lost, self.id, &packet);
        } else if packet.header.destination == self.address {
            packet.mark_arrived(ctx.cur_time);
            ctx.log(EventKind::Arrived, self.id, &packet);
        } else {
            // No multi-hop forwarding
            ctx.log(EventKind::Received, self.id, &packet);
        }
    }
}

/// Where a sent packet goes next.
#[derive(Debug)]
pub(crate) enum Hop {
    Delivered,
    Forward { link: LinkId, packet: Packet },
}

#[derive(Debug, Clone, derive_new::new)]
pub(crate) enum NodeCmd {
    CreatePacket {
        node: NodeId,
        destination: IpAddr,
        header_size: Bytes,
        payload_size: Bytes,
    },
    Receive {
        node: NodeId,
        packet: Packet,
    },
}

#[cfg(test)]
mod tests {
    use crate::{packet::tests::mk_pkt, time::Time};

    use super::*;

    fn mk_node(id: usize, addr: &str) -> Node {
        Node::new(NodeId::new(id), addr.parse().unwrap())
    }

    fn kinds(ctx: Context) -> Vec<EventKind> {
        let (_, records) = ctx.into_parts();
        records.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn sends_on_first_attached_link() -> anyhow::Result<()> {
        let mut node = mk_node(1, "10.0.0.1");
        node.attach(LinkId::new(4));
        node.attach(LinkId::new(2));
        node.attach(LinkId::new(4));
        assert_eq!(node.links(), &[LinkId::new(4), LinkId::new(2)]);

        let mut ctx = Context::new(Time::ZERO);
        match node.send(mk_pkt(0, 125, Time::ZERO), &mut ctx)? {
            Hop::Forward { link, .. } => assert_eq!(link, LinkId::new(4)),
            hop => panic!("unexpected hop {hop:?}"),
        }
        assert_eq!(kinds(ctx), vec![EventKind::Sent]);
        Ok(())
    }

    #[test]
    fn unattached_node_cannot_send() {
        let node = mk_node(1, "10.0.0.1");
        let mut ctx = Context::new(Time::ZERO);
        let res = node.send(mk_pkt(0, 125, Time::ZERO), &mut ctx);
        assert!(matches!(res, Err(Error::NoLink(_))));
    }

    #[test]
    fn loopback_arrives_immediately() -> anyhow::Result<()> {
        let node = mk_node(1, "10.0.0.1");
        let mut ctx = Context::new(Time::new(42));
        let pkt = node.create_packet(
            PacketId::ZERO,
            "10.0.0.1".parse()?,
            Bytes::new(10),
            &mut ctx,
        );
        assert_eq!(pkt.creation_time(), Time::new(42));
        assert!(matches!(node.send(pkt, &mut ctx)?, Hop::Delivered));
        assert_eq!(
            kinds(ctx),
            vec![EventKind::Created, EventKind::Sent, EventKind::Arrived]
        );
        Ok(())
    }

    #[test]
    #[should_panic(expected = "arrived record")]
    fn arrival_is_stamped_before_it_is_logged() {
        let mut ctx = Context::new(Time::new(5));
        ctx.log(EventKind::Arrived, NodeId::ONE, &mk_pkt(0, 125, Time::ZERO));
    }

    #[test]
    fn receive_outcomes() {
        let dst = mk_node(2, "10.0.0.2");
        let other = mk_node(3, "10.0.0.3");

        let mut ctx = Context::new(Time::new(5));
        dst.receive(mk_pkt(0, 125, Time::ZERO), &mut ctx);
        other.receive(mk_pkt(1, 125, Time::ZERO), &mut ctx);
        let mut lost = mk_pkt(2, 125, Time::ZERO);
        lost.mark_lost();
        dst.receive(lost, &mut ctx);

        let (_, records) = ctx.into_parts();
        let seen = records
            .iter()
            .map(|r| (r.packet.into_usize(), r.kind, r.node.into_usize()))
            .collect::<Vec<_>>();
        assert_eq!(
            seen,
            vec![
                (0, EventKind::Arrived, 2),
                (1, EventKind::Received, 3),
                (2, EventKind::Lost, 2),
            ]
        );
    }
}
