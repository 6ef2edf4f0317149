//! Burst assembly state machine.
//!
//! The assembler sees one validated packet at a time and decides whether it extends the
//! current burst, finishes it, or makes it invalid. Shadow memory is written only when a burst
//! finishes; an invalid or interrupted burst leaves it untouched. Reading, alignment and checksum checks and
//! timekeeping all happen in [`Session`][crate::Session] before a packet gets here.

use crate::error::{DecodeError, Malformed};
use crate::memory::ShadowMemory;
use crate::merge::{Burst, Segment};
use crate::packet::{PacketKind, RawPacket, UnknownPacketKind};
use crate::{MemOp, OpKind};

/// Result of feeding one packet to the [`Assembler`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// More packets are needed before an operation is known.
    Continue,
    /// The burst is finished.
    Complete(MemOp),
    /// The burst is invalid and was dropped.
    Abort(DecodeError),
}

#[derive(Debug, Default, Clone)]
pub struct Assembler {
    burst: Option<Burst>,
    next_word: u32,
}

impl Assembler {
    pub fn new() -> Self {
        Default::default()
    }

    /// Drops any burst left over from an interrupted decode call.
    pub fn begin(&mut self) {
        self.burst = None;
    }

    /// Word address the next data packet will be stored at.
    pub fn next_word_address(&self) -> u32 {
        self.next_word
    }

    /// Returns `true` while a burst has taken at least one packet.
    pub fn is_accumulating(&self) -> bool {
        self.burst.is_some()
    }

    pub fn step(&mut self, packet: &RawPacket, memory: &mut ShadowMemory) -> Transition {
        match packet.kind() {
            Ok(PacketKind::Address) => {
                self.next_word = packet.word_address();
                match self.burst.take() {
                    Some(burst) => Transition::Complete(burst.commit(memory)),
                    None => Transition::Continue,
                }
            }
            Ok(PacketKind::Read) => self.data(OpKind::Read, packet, memory),
            Ok(PacketKind::Write) => self.data(OpKind::Write, packet, memory),
            Err(UnknownPacketKind(kind)) => {
                tracing::debug!("ignoring packet of reserved kind {kind:#b}");
                Transition::Continue
            }
        }
    }

    /// Commits the burst in progress, if any, for the flush at end of trace.
    pub fn flush(&mut self, memory: &mut ShadowMemory) -> Option<MemOp> {
        self.burst.take().map(|burst| burst.commit(memory))
    }

    fn data(&mut self, kind: OpKind, packet: &RawPacket, memory: &mut ShadowMemory) -> Transition {
        if self
            .burst
            .as_ref()
            .is_some_and(|burst| burst.kind() != kind)
        {
            return self.abort(Malformed::MixedAccess);
        }

        let lanes = packet.lanes();
        let started = match self.burst.take() {
            Some(burst) => Ok(burst),
            None => Burst::start(kind, lanes, self.next_word),
        };
        // The hardware counter advances for every data cycle, good or bad.
        self.next_word = self.next_word.wrapping_add(1);
        let mut burst = match started {
            Ok(burst) => burst,
            Err(err) => return self.abort(err),
        };

        match burst.merge(lanes, packet.word()) {
            Ok(Segment::Open) => {
                self.burst = Some(burst);
                Transition::Continue
            }
            Ok(Segment::Complete) => Transition::Complete(burst.commit(memory)),
            Err(err) => self.abort(err),
        }
    }

    fn abort(&mut self, err: Malformed) -> Transition {
        self.burst = None;
        Transition::Abort(DecodeError::MalformedBurst(err))
    }
}
