//! Width-sensitive accumulation of bus data and its write-back into shadow memory.
//!
//! A burst holds the bytes it has seen until it is committed, so shadow memory only ever
//! reflects bursts that completed.

use crate::error::Malformed;
use crate::memory::ShadowMemory;
use crate::packet::Lanes;
use crate::{MemOp, OpKind};

/// Access width of a burst, decided by its first packet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    /// Both lanes make a word access, a single lane a byte access.
    pub fn of(lanes: Lanes) -> Result<Self, Malformed> {
        if lanes == Lanes::all() {
            Ok(Self::Word)
        } else if lanes.is_empty() {
            Err(Malformed::NoLanes)
        } else {
            Ok(Self::Byte)
        }
    }

    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
        }
    }
}

/// Whether a burst may take more packets after a merge.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Segment {
    Open,
    Complete,
}

/// A read or write burst being accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burst {
    kind: OpKind,
    width: Width,
    addr: u32,
    length: u32,
    staged: Vec<u8>,
}

impl Burst {
    /// Opens an empty burst at the byte address of `word_address`.
    pub fn start(kind: OpKind, lanes: Lanes, word_address: u32) -> Result<Self, Malformed> {
        Ok(Self {
            kind,
            width: Width::of(lanes)?,
            addr: word_address.wrapping_shl(1),
            length: 0,
            staged: Vec::new(),
        })
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Bytes merged so far and not yet written to memory.
    pub fn staged(&self) -> &[u8] {
        &self.staged
    }

    pub fn op(&self) -> MemOp {
        MemOp {
            kind: self.kind,
            addr: self.addr,
            length: self.length,
        }
    }

    /// Takes one packet's data and extends the burst by its width.
    ///
    /// Byte accesses end the segment immediately; only word accesses chain. A packet whose width
    /// differs from the burst's is rejected and leaves the burst as it was.
    pub fn merge(&mut self, lanes: Lanes, word: u16) -> Result<Segment, Malformed> {
        if Width::of(lanes)? != self.width {
            return Err(Malformed::MixedWidth);
        }

        let [lo, hi] = word.to_le_bytes();
        match self.width {
            Width::Word => {
                self.staged.extend_from_slice(&[lo, hi]);
                self.length = self.length.wrapping_add(2);
                Ok(Segment::Open)
            }
            Width::Byte => {
                if lanes.contains(Lanes::LOWER) {
                    self.staged.push(lo);
                } else {
                    self.addr = self.addr.wrapping_add(1);
                    self.staged.push(hi);
                }
                self.length = self.length.wrapping_add(1);
                Ok(Segment::Complete)
            }
        }
    }

    /// Writes the staged bytes to `memory` in bus order and returns the finished operation.
    pub fn commit(self, memory: &mut ShadowMemory) -> MemOp {
        for (offset, &byte) in self.staged.iter().enumerate() {
            memory.store(self.addr.wrapping_add(offset as u32), byte);
        }
        self.op()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> ShadowMemory {
        ShadowMemory::new(0x1000).unwrap()
    }

    #[test]
    fn width_from_lanes() {
        assert_eq!(Width::of(Lanes::all()), Ok(Width::Word));
        assert_eq!(Width::of(Lanes::LOWER), Ok(Width::Byte));
        assert_eq!(Width::of(Lanes::UPPER), Ok(Width::Byte));
        assert_eq!(Width::of(Lanes::empty()), Err(Malformed::NoLanes));
    }

    #[test]
    fn word_merge_stays_open() {
        let mut memory = memory();
        let mut burst = Burst::start(OpKind::Write, Lanes::all(), 0x100).unwrap();
        assert_eq!(burst.addr(), 0x200);
        assert_eq!(burst.merge(Lanes::all(), 0x1234), Ok(Segment::Open));
        assert_eq!(burst.merge(Lanes::all(), 0x5678), Ok(Segment::Open));
        assert_eq!(burst.len(), 4);
        assert_eq!(burst.staged(), &[0x34, 0x12, 0x78, 0x56]);
        assert!(memory.as_bytes().iter().all(|&b| b == 0));

        let op = burst.commit(&mut memory);
        assert_eq!((op.addr, op.length), (0x200, 4));
        assert_eq!(&memory.as_bytes()[0x200..0x204], &[0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn lower_lane_byte() {
        let mut memory = memory();
        let mut burst = Burst::start(OpKind::Read, Lanes::LOWER, 0x80).unwrap();
        assert_eq!(burst.merge(Lanes::LOWER, 0xbeef), Ok(Segment::Complete));
        assert_eq!(
            burst.commit(&mut memory),
            MemOp {
                kind: OpKind::Read,
                addr: 0x100,
                length: 1
            }
        );
        assert_eq!(memory.get(0x100), 0xef);
        assert_eq!(memory.get(0x101), 0);
    }

    #[test]
    fn upper_lane_byte() {
        let mut memory = memory();
        let mut burst = Burst::start(OpKind::Read, Lanes::UPPER, 0x80).unwrap();
        assert_eq!(burst.merge(Lanes::UPPER, 0xbeef), Ok(Segment::Complete));
        assert_eq!(burst.addr(), 0x101);
        assert_eq!(burst.len(), 1);
        burst.commit(&mut memory);
        assert_eq!(memory.get(0x101), 0xbe);
        assert_eq!(memory.get(0x100), 0);
    }

    #[test]
    fn width_mismatch_keeps_burst() {
        let mut burst = Burst::start(OpKind::Write, Lanes::all(), 0).unwrap();
        burst.merge(Lanes::all(), 0xffff).unwrap();
        assert_eq!(burst.merge(Lanes::LOWER, 0x1111), Err(Malformed::MixedWidth));
        assert_eq!(burst.len(), 2);
        assert_eq!(burst.staged(), &[0xff, 0xff]);
    }

    #[test]
    fn length_wraps_instead_of_overflowing() {
        let mut burst = Burst::start(OpKind::Read, Lanes::all(), 0).unwrap();
        burst.length = u32::MAX - 1;
        burst.merge(Lanes::all(), 0).unwrap();
        assert_eq!(burst.len(), 0);
    }

    #[test]
    fn stores_wrap_around_memory() {
        let mut memory = memory();
        let mut burst = Burst::start(OpKind::Write, Lanes::all(), 0x7ff).unwrap();
        burst.merge(Lanes::all(), 0xaabb).unwrap();
        burst.merge(Lanes::all(), 0xccdd).unwrap();
        burst.commit(&mut memory);
        assert_eq!(memory.get(0xffe), 0xbb);
        assert_eq!(memory.get(0xfff), 0xaa);
        assert_eq!(memory.get(0x000), 0xdd);
        assert_eq!(memory.get(0x001), 0xcc);
    }
}
