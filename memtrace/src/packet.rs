//! Fixed-width packets captured by the bus logger.
//!
//! # Format
//!
//! Every packet is [`PACKET_SIZE`] bytes. The first byte has its most significant bit set and
//! the remaining bytes have it clear, which lets the decoder notice when it is no longer reading
//! on a packet boundary. The low seven bits of each byte, most significant byte first, form a
//! 28-bit payload:
//!
//! `| type: 2 | checksum: 3 | address: 23 |` for [`PacketKind::Address`]
//!
//! `| type: 2 | checksum: 3 | duration: 5 | ub: 1 | lb: 1 | word: 16 |` for
//! [`PacketKind::Read`] and [`PacketKind::Write`]
//!
//! The checksum is the number of set bits in the other 25 payload bits, modulo 8. Address
//! packets carry no duration; the time spent asserting an address is accounted to the data
//! packet that follows it.

use bitflags::bitflags;

/// Size of one packet on the wire.
pub const PACKET_SIZE: usize = 4;

const SYNC_BIT: u8 = 0b1000_0000;
const LOW_BITS: u8 = 0b0111_1111;

const PAYLOAD_MASK: u32 = (1 << 28) - 1;

const KIND_SHIFT: u32 = 26;
const KIND_MASK: u32 = 0b11;

const CHECKSUM_SHIFT: u32 = 23;
const CHECKSUM_MASK: u32 = 0b111;

const ADDRESS_MASK: u32 = (1 << 23) - 1;

const DURATION_SHIFT: u32 = 18;
const DURATION_MASK: u32 = 0b1_1111;

const LANE_SHIFT: u32 = 16;
const WORD_MASK: u32 = 0xffff;

/// Largest duration a single data packet can carry.
pub const MAX_DURATION: u8 = DURATION_MASK as u8;

/// Largest word address an address packet can carry.
pub const MAX_WORD_ADDRESS: u32 = ADDRESS_MASK;

/// Enumeration of packet types.
///
/// This type corresponds to the two most significant bits of the payload.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketKind {
    Address = 0b00,
    Read = 0b01,
    Write = 0b10,
}

impl TryFrom<u8> for PacketKind {
    type Error = UnknownPacketKind;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b00 => Ok(Self::Address),
            0b01 => Ok(Self::Read),
            0b10 => Ok(Self::Write),
            _ => Err(UnknownPacketKind(value)),
        }
    }
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("unknown packet kind: {0:#b}")]
pub struct UnknownPacketKind(pub u8);

bitflags! {
    /// Byte lanes of a 16-bit bus transfer that carried valid data.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Lanes: u8 {
        const LOWER = 0b01;
        const UPPER = 0b10;
    }
}

/// One packet exactly as it was read from the trace.
///
/// Nothing about the packet is validated on construction; callers check
/// [`is_aligned`][Self::is_aligned] and [`is_checksum_valid`][Self::is_checksum_valid] before
/// trusting any of the other fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RawPacket([u8; PACKET_SIZE]);

impl RawPacket {
    pub fn new(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a packet from the first [`PACKET_SIZE`] bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..PACKET_SIZE)?;
        bytes.try_into().ok().map(Self)
    }

    /// Frames a 28-bit payload, filling in the checksum field and the sync bits.
    pub fn from_payload(payload: u32) -> Self {
        let payload = payload & PAYLOAD_MASK & !(CHECKSUM_MASK << CHECKSUM_SHIFT);
        let payload = payload | checksum(payload) << CHECKSUM_SHIFT;
        Self([
            SYNC_BIT | (payload >> 21) as u8 & LOW_BITS,
            (payload >> 14) as u8 & LOW_BITS,
            (payload >> 7) as u8 & LOW_BITS,
            payload as u8 & LOW_BITS,
        ])
    }

    /// Constructs an address packet asserting `word_address`.
    pub fn address(word_address: u32) -> Self {
        Self::from_payload((PacketKind::Address as u32) << KIND_SHIFT | word_address & ADDRESS_MASK)
    }

    /// Constructs a read or write packet. `duration` is truncated to [`MAX_DURATION`].
    ///
    /// Passing [`PacketKind::Address`] produces an address packet for the low bits of `word`,
    /// which is rarely what you want.
    pub fn data(kind: PacketKind, duration: u8, lanes: Lanes, word: u16) -> Self {
        if kind == PacketKind::Address {
            return Self::address(word as u32);
        }
        Self::from_payload(
            (kind as u32) << KIND_SHIFT
                | (duration as u32 & DURATION_MASK) << DURATION_SHIFT
                | (lanes.bits() as u32) << LANE_SHIFT
                | word as u32,
        )
    }

    pub fn bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }

    #[inline]
    fn payload(&self) -> u32 {
        self.0
            .iter()
            .fold(0, |acc, &byte| acc << 7 | (byte & LOW_BITS) as u32)
    }

    /// Returns `true` if the sync bits mark this as a packet boundary.
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.0[0] & SYNC_BIT != 0 && self.0[1..].iter().all(|byte| byte & SYNC_BIT == 0)
    }

    #[inline]
    pub fn is_checksum_valid(&self) -> bool {
        let payload = self.payload();
        let stored = payload >> CHECKSUM_SHIFT & CHECKSUM_MASK;
        stored == checksum(payload & !(CHECKSUM_MASK << CHECKSUM_SHIFT))
    }

    #[inline]
    pub fn kind(&self) -> Result<PacketKind, UnknownPacketKind> {
        PacketKind::try_from((self.payload() >> KIND_SHIFT & KIND_MASK) as u8)
    }

    /// Clock ticks elapsed since the previous packet. Always zero for address packets.
    #[inline]
    pub fn duration(&self) -> u32 {
        match self.kind() {
            Ok(PacketKind::Address) => 0,
            _ => self.payload() >> DURATION_SHIFT & DURATION_MASK,
        }
    }

    /// Word address carried by an address packet.
    #[inline]
    pub fn word_address(&self) -> u32 {
        self.payload() & ADDRESS_MASK
    }

    /// Data word carried by a read or write packet.
    #[inline]
    pub fn word(&self) -> u16 {
        (self.payload() & WORD_MASK) as u16
    }

    #[inline]
    pub fn lanes(&self) -> Lanes {
        Lanes::from_bits_truncate((self.payload() >> LANE_SHIFT) as u8)
    }

    #[inline]
    pub fn upper_byte(&self) -> bool {
        self.lanes().contains(Lanes::UPPER)
    }

    #[inline]
    pub fn lower_byte(&self) -> bool {
        self.lanes().contains(Lanes::LOWER)
    }
}

#[inline]
fn checksum(bits: u32) -> u32 {
    (bits & PAYLOAD_MASK).count_ones() & CHECKSUM_MASK
}
