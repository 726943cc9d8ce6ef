//! Buffer growth, underflow and copy-on-write isolation through packets.

use netsim::{Buffer, BufferError, Packet, PacketError};
use proptest::prelude::*;

use crate::common::{FcsTrailer, NetHeader, PortHeader};

#[test]
fn test_header_then_trailer_then_back_to_empty() {
    let mut buffer = Buffer::with_size(0);
    buffer.prepend_with(20, |header| {
        header[0] = 0x45;
        header[19] = 0x01;
    });
    buffer.append_with(4, |trailer| trailer.copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]));
    assert_eq!(buffer.size(), 24);
    assert_eq!(buffer.read(0, 1).expect("read"), vec![0x45]);
    assert_eq!(buffer.read(19, 5).expect("read"), vec![0x01, 0xde, 0xad, 0xbe, 0xef]);

    buffer.remove_at_start(20).expect("remove header");
    buffer.remove_at_end(4).expect("remove trailer");
    assert_eq!(buffer.size(), 0);
    assert!(buffer.is_empty());
}

#[test]
fn test_underflow_rejected_with_sizes() {
    let mut buffer = Buffer::from_bytes(&[0; 10]);
    assert_eq!(
        buffer.remove_at_start(11),
        Err(BufferError::Underflow {
            requested: 11,
            available: 10
        })
    );
    assert_eq!(buffer.size(), 10);

    let mut packet = Packet::with_size(3);
    let err = packet.remove_at_end(4).expect_err("underflow");
    assert_eq!(
        err,
        PacketError::Buffer(BufferError::Underflow {
            requested: 4,
            available: 3
        })
    );
    assert_eq!(err.to_string(), "cannot remove 4 bytes from a buffer of 3");
}

#[test]
fn test_copy_then_add_header_leaves_original_untouched() {
    let mut original = Packet::new(b"application data");
    original
        .add_header(&PortHeader {
            source: 5000,
            destination: 53,
            length: 24,
            sequence: 1,
        })
        .expect("port header");
    let before = original.to_vec();

    let mut copy = original.copy();
    copy.add_header(&NetHeader::new(1, 2, before.len()))
        .expect("net header");
    copy.add_trailer(&FcsTrailer(7)).expect("trailer");
    assert_eq!(original.to_vec(), before);
    assert_eq!(copy.size(), before.len() + NetHeader::SIZE + 4);

    // Stripping the copy back down does not disturb the original either
    copy.remove_header::<NetHeader>().expect("net header");
    copy.remove_header::<PortHeader>().expect("port header");
    assert_eq!(copy.remove_trailer::<FcsTrailer>().expect("trailer"), FcsTrailer(7));
    assert_eq!(copy.to_vec(), b"application data");
    assert_eq!(original.to_vec(), before);
}

#[test]
fn test_fan_out_copies_share_until_written() {
    let packet = Packet::new([0xaau8; 1500]);
    let copies: Vec<Packet> = (0..100).map(|_| packet.copy()).collect();
    assert!(copies.iter().all(|copy| copy.buffer().is_shared()));

    let last = copies.into_iter().last().expect("copies");
    let mut buffer = last.buffer().clone();
    buffer.write(0, &[0x55]).expect("write");
    assert!(!buffer.is_shared());
    assert_eq!(buffer.read(0, 2).expect("read"), vec![0x55, 0xaa]);
    assert_eq!(packet.to_vec()[0], 0xaa);
    assert_eq!(last.to_vec()[0], 0xaa);
}

proptest! {
    #[test]
    fn add_at_start_then_remove_restores_bytes(
        payload in prop::collection::vec(any::<u8>(), 0..512),
        layers in prop::collection::vec(1usize..64, 0..12),
    ) {
        let mut buffer = Buffer::from_bytes(&payload);
        let snapshot = buffer.clone();
        for n in &layers {
            buffer.add_at_start(*n);
        }
        let total: usize = layers.iter().sum();
        prop_assert_eq!(buffer.size(), payload.len() + total);
        for n in layers.iter().rev() {
            buffer.remove_at_start(*n).expect("remove");
        }
        prop_assert_eq!(buffer.to_vec(), payload.clone());
        prop_assert_eq!(snapshot.to_vec(), payload);
    }
}
