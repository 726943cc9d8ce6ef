//! Link-layer fragmentation and reassembly.

use netsim::{Packet, Time};
use proptest::prelude::*;

use crate::common::{FlowId, SentAt};

/// Splits `packet` into fragments of at most `mtu` bytes.
fn fragment(packet: &Packet, mtu: usize) -> Vec<Packet> {
    (0..packet.size())
        .step_by(mtu)
        .map(|start| {
            let len = mtu.min(packet.size() - start);
            packet.create_fragment(start, len).expect("fragment")
        })
        .collect()
}

fn reassemble(fragments: &[Packet]) -> Packet {
    let mut whole = Packet::empty();
    for fragment in fragments {
        whole.add_at_end(fragment);
    }
    whole
}

#[test]
fn test_fragments_carry_tags_of_their_bytes() {
    let mut packet = Packet::new((0u8..=99).collect::<Vec<_>>());
    packet.add_byte_tag_range(SentAt(Time::from_millis(1)), 0..30).expect("tag");
    packet.add_byte_tag_range(SentAt(Time::from_millis(2)), 30..100).expect("tag");
    packet.add_packet_tag(FlowId(7));

    let fragments = fragment(&packet, 40);
    assert_eq!(fragments.len(), 3);
    assert_eq!(
        fragments[0].byte_tags::<SentAt>().collect::<Vec<_>>(),
        vec![
            (0..30, &SentAt(Time::from_millis(1))),
            (30..40, &SentAt(Time::from_millis(2)))
        ]
    );
    assert_eq!(
        fragments[2].byte_tags::<SentAt>().collect::<Vec<_>>(),
        vec![(0..20, &SentAt(Time::from_millis(2)))]
    );
    assert!(fragments
        .iter()
        .all(|fragment| fragment.peek_packet_tag::<FlowId>() == Some(&FlowId(7))));

    let uids: Vec<u64> = fragments.iter().map(Packet::uid).collect();
    assert!(uids.iter().all(|uid| *uid != packet.uid()));
}

#[test]
fn test_reassembly_restores_payload_and_tag_coverage() {
    let mut packet = Packet::new(vec![3u8; 64]);
    packet.add_byte_tag(SentAt(Time::from_micros(5))).expect("tag");

    let whole = reassemble(&fragment(&packet, 10));
    assert_eq!(whole.to_vec(), packet.to_vec());

    // Clipped pieces cover the original range exactly once
    let pieces: Vec<_> = whole.byte_tags::<SentAt>().map(|(range, _)| range).collect();
    assert_eq!(pieces.len(), 7);
    assert_eq!(pieces.first().map(|r| r.start), Some(0));
    assert_eq!(pieces.last().map(|r| r.end), Some(64));
    assert!(pieces.windows(2).all(|pair| pair[0].end == pair[1].start));
}

#[test]
fn test_fragment_writes_do_not_leak_into_the_original() {
    let packet = Packet::new([1u8; 16]);
    let mut fragment = packet.create_fragment(4, 8).expect("fragment");
    fragment.add_header(&crate::common::PortHeader {
        source: 1,
        destination: 2,
        length: 8,
        sequence: 0,
    })
    .expect("header");
    assert_eq!(fragment.size(), 16);
    assert_eq!(packet.to_vec(), vec![1u8; 16]);
}

proptest! {
    #[test]
    fn fragmentation_then_reassembly_is_identity(
        payload in prop::collection::vec(any::<u8>(), 1..600),
        mtu in 1usize..128,
        tag_start in 0usize..600,
        tag_len in 1usize..600,
    ) {
        let mut packet = Packet::new(&payload);
        let start = tag_start % payload.len();
        let end = (start + tag_len).min(payload.len());
        packet.add_byte_tag_range(FlowId(1), start..end).expect("tag");

        let fragments = fragment(&packet, mtu);
        prop_assert_eq!(fragments.iter().map(Packet::size).sum::<usize>(), payload.len());
        let whole = reassemble(&fragments);
        prop_assert_eq!(whole.to_vec(), payload);

        // Every tagged byte is still tagged, and nothing else is
        let mut covered = vec![false; whole.size()];
        for (range, tag) in whole.byte_tags::<FlowId>() {
            prop_assert_eq!(tag, &FlowId(1));
            for byte in range {
                prop_assert!(!covered[byte], "byte {} tagged twice", byte);
                covered[byte] = true;
            }
        }
        let expected: Vec<bool> = (0..whole.size()).map(|i| (start..end).contains(&i)).collect();
        prop_assert_eq!(covered, expected);
    }
}
