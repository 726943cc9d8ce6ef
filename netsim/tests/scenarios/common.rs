//! Headers and helpers shared by the scenario tests.

#![allow(dead_code)]

use netsim::{
    internet_checksum, BufferReader, BufferWriter, Header, PacketError, PacketResult, Trailer,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A 20-byte network header with a header checksum.
///
/// `[version/ihl:1][tos:1][total_length:2][id:2][frag:2][ttl:1][proto:1]`
/// `[checksum:2][source:4][destination:4]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetHeader {
    pub total_length: u16,
    pub id: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub source: u32,
    pub destination: u32,
}

impl NetHeader {
    pub const SIZE: usize = 20;

    pub fn new(source: u32, destination: u32, payload_len: usize) -> Self {
        Self {
            total_length: (Self::SIZE + payload_len) as u16,
            id: 0,
            ttl: 64,
            protocol: 17,
            source,
            destination,
        }
    }
}

impl Header for NetHeader {
    fn serialized_size(&self) -> usize {
        Self::SIZE
    }

    fn serialize(&self, writer: &mut BufferWriter<'_>) -> PacketResult<()> {
        writer.write_u8(0x45)?;
        writer.write_u8(0)?;
        writer.write_u16_be(self.total_length)?;
        writer.write_u16_be(self.id)?;
        writer.write_u16_be(0)?;
        writer.write_u8(self.ttl)?;
        writer.write_u8(self.protocol)?;
        writer.write_u16_be(0)?;
        writer.write_u32_be(self.source)?;
        writer.write_u32_be(self.destination)?;

        let checksum = internet_checksum(writer.window(), 0);
        writer.prev(10)?;
        writer.write_u16_be(checksum)?;
        writer.skip(8)
    }

    fn deserialize(reader: &mut BufferReader<'_>) -> PacketResult<Self> {
        if reader.clone().checksum(Self::SIZE, 0)? != 0 {
            return Err(PacketError::Malformed {
                name: "NetHeader",
                reason: "header checksum mismatch".to_string(),
            });
        }
        let version = reader.read_u8()?;
        if version != 0x45 {
            return Err(PacketError::Malformed {
                name: "NetHeader",
                reason: format!("unsupported version byte {version:#04x}"),
            });
        }
        reader.skip(1)?;
        let total_length = reader.read_u16_be()?;
        let id = reader.read_u16_be()?;
        reader.skip(2)?;
        let ttl = reader.read_u8()?;
        let protocol = reader.read_u8()?;
        reader.skip(2)?;
        Ok(Self {
            total_length,
            id,
            ttl,
            protocol,
            source: reader.read_u32_be()?,
            destination: reader.read_u32_be()?,
        })
    }

    fn print(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.source.to_be_bytes();
        let [w, x, y, z] = self.destination.to_be_bytes();
        write!(
            f,
            "net {a}.{b}.{c}.{d} > {w}.{x}.{y}.{z} ttl {} proto {} length {}",
            self.ttl, self.protocol, self.total_length
        )
    }
}

/// An 8-byte transport header: `[src:2][dst:2][length:2][seq:2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortHeader {
    pub source: u16,
    pub destination: u16,
    pub length: u16,
    pub sequence: u16,
}

impl Header for PortHeader {
    fn serialized_size(&self) -> usize {
        8
    }

    fn serialize(&self, writer: &mut BufferWriter<'_>) -> PacketResult<()> {
        writer.write_u16_be(self.source)?;
        writer.write_u16_be(self.destination)?;
        writer.write_u16_be(self.length)?;
        writer.write_u16_be(self.sequence)
    }

    fn deserialize(reader: &mut BufferReader<'_>) -> PacketResult<Self> {
        Ok(Self {
            source: reader.read_u16_be()?,
            destination: reader.read_u16_be()?,
            length: reader.read_u16_be()?,
            sequence: reader.read_u16_be()?,
        })
    }
}

/// A 4-byte frame check sequence trailer (one's complement sum, widened).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FcsTrailer(pub u32);

impl FcsTrailer {
    pub fn over(bytes: &[u8]) -> Self {
        FcsTrailer(u32::from(internet_checksum(bytes, 0)))
    }
}

impl Trailer for FcsTrailer {
    fn serialized_size(&self) -> usize {
        4
    }

    fn serialize(&self, writer: &mut BufferWriter<'_>) -> PacketResult<()> {
        writer.write_u32_be(self.0)
    }

    fn deserialize(reader: &mut BufferReader<'_>) -> PacketResult<Self> {
        reader.prev(4)?;
        reader.read_u32_be().map(FcsTrailer)
    }
}

/// Transmission timestamp, attached as a byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentAt(pub netsim::Time);

/// Flow identifier, attached as a packet tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowId(pub u32);
