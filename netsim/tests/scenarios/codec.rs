//! Header and trailer codecs stacked on a packet.

use netsim::{BufferReader, BufferWriter, Header, Packet, PacketError, PacketResult};
use proptest::prelude::*;

use crate::common::{FcsTrailer, NetHeader, PortHeader};

/// Options header whose length depends on its contents: `[len:1][bytes:len]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OptionsHeader(Vec<u8>);

impl Header for OptionsHeader {
    fn serialized_size(&self) -> usize {
        1 + self.0.len()
    }

    fn serialize(&self, writer: &mut BufferWriter<'_>) -> PacketResult<()> {
        writer.write_u8(self.0.len() as u8)?;
        writer.write_bytes(&self.0)
    }

    fn deserialize(reader: &mut BufferReader<'_>) -> PacketResult<Self> {
        let len = reader.read_u8()? as usize;
        Ok(OptionsHeader(reader.read_bytes(len)?.to_vec()))
    }
}

fn frame(payload: &[u8], sequence: u16) -> Packet {
    let mut packet = Packet::new(payload);
    let port = PortHeader {
        source: 4000,
        destination: 9,
        length: (8 + payload.len()) as u16,
        sequence,
    };
    packet.add_header(&port).expect("port header");
    packet
        .add_header(&NetHeader::new(0x0a00_0001, 0x0a00_0002, packet.size()))
        .expect("net header");
    let fcs = FcsTrailer::over(&packet.to_vec());
    packet.add_trailer(&fcs).expect("fcs");
    packet
}

#[test]
fn test_stack_round_trip_outermost_first() {
    let mut packet = frame(b"hello, world", 3);
    assert_eq!(packet.size(), 20 + 8 + 12 + 4);

    let fcs = packet.remove_trailer::<FcsTrailer>().expect("fcs");
    assert_eq!(fcs, FcsTrailer::over(&packet.to_vec()));

    let net: NetHeader = packet.remove_header().expect("net header");
    assert_eq!(net.total_length as usize, 20 + packet.size());
    assert_eq!(net.destination, 0x0a00_0002);

    let port: PortHeader = packet.remove_header().expect("port header");
    assert_eq!(port.sequence, 3);
    assert_eq!(packet.to_vec(), b"hello, world");
}

#[test]
fn test_peek_does_not_consume() {
    let packet = frame(b"x", 1);
    let size = packet.size();
    let peeked = packet.peek_header::<NetHeader>().expect("peek").expect("header");
    assert_eq!(peeked.ttl, 64);
    assert_eq!(packet.size(), size);
    assert_eq!(
        packet.peek_trailer::<FcsTrailer>().expect("peek").map(|fcs| fcs.0),
        Some(u32::from(netsim::internet_checksum(&packet.to_vec()[..size - 4], 0)))
    );
}

#[test]
fn test_corrupted_header_is_reported_not_consumed() {
    let packet = frame(b"payload", 1);
    let mut bytes = packet.to_vec();
    bytes[8] = bytes[8].wrapping_add(1); // ttl
    let mut corrupted = Packet::new(bytes);

    let err = corrupted.remove_header::<NetHeader>().expect_err("corrupted");
    assert!(matches!(err, PacketError::Malformed { name: "NetHeader", .. }));
    assert_eq!(corrupted.size(), packet.size());
}

#[test]
fn test_decoded_headers_print_their_fields() {
    let mut packet = frame(b"abc", 2);
    packet.remove_trailer::<FcsTrailer>().expect("fcs");
    let net: NetHeader = packet.remove_header().expect("net header");
    let shown: &dyn Header = &net;
    assert_eq!(shown.to_string(), "net 10.0.0.1 > 10.0.0.2 ttl 64 proto 17 length 31");

    // Codecs without a custom rendering print their name
    let port: PortHeader = packet.remove_header().expect("port header");
    let shown: &dyn Header = &port;
    assert!(shown.to_string().ends_with("PortHeader"));
}

#[test]
fn test_variable_length_header() {
    let mut packet = Packet::new(b"tail");
    packet
        .add_header(&OptionsHeader(vec![1, 2, 3]))
        .expect("options");
    assert_eq!(packet.size(), 8);
    assert_eq!(
        packet.remove_header::<OptionsHeader>().expect("options"),
        OptionsHeader(vec![1, 2, 3])
    );
    assert_eq!(packet.to_vec(), b"tail");

    // A length byte pointing past the end is truncation
    let mut short = Packet::new([9u8, 1, 2]);
    assert_eq!(
        short.remove_header::<OptionsHeader>(),
        Err(PacketError::Truncated { needed: 9, have: 2 })
    );
}

#[test]
fn test_packet_errors_abort_a_run() {
    let mut sim = netsim::Simulator::new();
    let mut packet = Packet::new([1u8, 2]);
    sim.schedule(netsim::Time::from_millis(1), move |_| {
        packet.remove_header::<PortHeader>()?;
        Ok(())
    })
    .expect("schedule");

    let err = sim.run().expect_err("truncated header");
    assert!(matches!(err, netsim::SimulationError::Model(_)));
    assert_eq!(err.to_string(), "model error: truncated: need 2 bytes, have 0");
}

proptest! {
    #[test]
    fn port_header_round_trips(
        source in any::<u16>(),
        destination in any::<u16>(),
        sequence in any::<u16>(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let header = PortHeader { source, destination, length: payload.len() as u16, sequence };
        let mut packet = Packet::new(&payload);
        packet.add_header(&header).expect("add");
        prop_assert_eq!(packet.peek_header::<PortHeader>().expect("peek"), Some(header));
        prop_assert_eq!(packet.remove_header::<PortHeader>().expect("remove"), header);
        prop_assert_eq!(packet.to_vec(), payload);
    }
}
