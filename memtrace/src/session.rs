use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::assembler::{Assembler, Transition};
use crate::config::Config;
use crate::error::{DecodeError, RuntimeError};
use crate::memory::ShadowMemory;
use crate::reader::PacketReader;
use crate::MemOp;

/// Time into the trace, counted in bus clock ticks.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Timestamp {
    clocks: u64,
    seconds: f64,
}

impl Timestamp {
    #[inline]
    pub fn clocks(&self) -> u64 {
        self.clocks
    }

    #[inline]
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    fn advance(&mut self, ticks: u32, clock_hz: u64) {
        self.clocks += ticks as u64;
        self.seconds = self.clocks as f64 / clock_hz as f64;
    }
}

/// All state needed to decode one trace.
///
/// Each call to [`next_op`][Self::next_op] consumes packets until one read or write burst is
/// complete. The timestamp and shadow memory carry over from call to call and can be inspected
/// in between.
///
/// # Example
///
/// ```
/// use memtrace::packet::{Lanes, PacketKind, RawPacket};
/// use memtrace::Session;
///
/// let mut trace = Vec::new();
/// for packet in [
///     RawPacket::address(0x100),
///     RawPacket::data(PacketKind::Write, 4, Lanes::all(), 0x1234),
///     RawPacket::address(0x200),
/// ] {
///     trace.extend_from_slice(packet.bytes());
/// }
///
/// let mut session = Session::new(trace.as_slice());
/// let op = session.next_op().unwrap().unwrap();
/// assert_eq!((op.addr, op.length), (0x200, 2));
/// assert_eq!(session.data(&op), vec![0x34, 0x12]);
/// assert_eq!(session.next_op(), Ok(None));
/// ```
#[derive(Debug)]
pub struct Session<R> {
    reader: PacketReader<R>,
    assembler: Assembler,
    memory: ShadowMemory,
    timestamp: Timestamp,
    clock_hz: u64,
}

impl Session<File> {
    /// Opens a raw trace log with the default [`Config`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RuntimeError> {
        Self::open_with(path, &Config::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self, RuntimeError> {
        let file = File::open(path)?;
        Self::with_config(file, config)
    }
}

impl<R: Read> Session<R> {
    /// Creates a session over `inner` with the default [`Config`].
    pub fn new(inner: R) -> Self {
        let config = Config::default();
        Self {
            reader: PacketReader::with_capacity(inner, config.buffer_size),
            assembler: Assembler::new(),
            memory: ShadowMemory::default(),
            timestamp: Timestamp::default(),
            clock_hz: config.clock_hz,
        }
    }

    pub fn with_config(inner: R, config: &Config) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self {
            reader: PacketReader::with_capacity(inner, config.buffer_size),
            assembler: Assembler::new(),
            memory: ShadowMemory::new(config.memory_size)?,
            timestamp: Timestamp::default(),
            clock_hz: config.clock_hz,
        })
    }

    /// Decodes the next memory operation.
    ///
    /// Returns `Ok(None)` once the trace is exhausted. A burst still open when the trace ends is
    /// returned first, so the end of the trace is reported on the call after that. Errors only
    /// affect the current call; after one, the caller may keep decoding.
    pub fn next_op(&mut self) -> Result<Option<MemOp>, DecodeError> {
        self.assembler.begin();

        loop {
            let Some(packet) = self.reader.read_packet() else {
                return Ok(self.assembler.flush(&mut self.memory));
            };

            if !packet.is_aligned() {
                // One byte at a time is all the realignment we attempt.
                if !self.reader.skip(1) {
                    tracing::trace!("no byte left to discard");
                }
                tracing::debug!(offset = self.reader.offset(), "lost packet alignment");
                return Err(DecodeError::Sync);
            }

            if !packet.is_checksum_valid() {
                tracing::debug!(
                    offset = self.reader.offset(),
                    "bad checksum: {:02x?}",
                    packet.bytes()
                );
                return Err(DecodeError::Checksum);
            }

            self.timestamp.advance(packet.duration(), self.clock_hz);

            match self.assembler.step(&packet, &mut self.memory) {
                Transition::Continue => {}
                Transition::Complete(op) => {
                    tracing::trace!(offset = self.reader.offset(), "{op:x?}");
                    return Ok(Some(op));
                }
                Transition::Abort(err) => {
                    tracing::debug!(offset = self.reader.offset(), "{err:?}");
                    return Err(err);
                }
            }
        }
    }

    /// Bytes covered by `op`, as currently held in shadow memory.
    pub fn data(&self, op: &MemOp) -> Vec<u8> {
        self.memory.read(op.addr, op.length).collect()
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Absolute byte offset into the trace.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    #[inline]
    pub fn memory(&self) -> &ShadowMemory {
        &self.memory
    }

    /// Word address the next data packet is expected at.
    pub fn next_word_address(&self) -> u32 {
        self.assembler.next_word_address()
    }

    /// Ends the session, returning the underlying stream.
    pub fn close(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read> Iterator for Session<R> {
    type Item = Result<MemOp, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_op().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Lanes, PacketKind, RawPacket};
    use crate::OpKind;

    fn trace(packets: &[RawPacket]) -> Vec<u8> {
        packets.iter().flat_map(|p| *p.bytes()).collect()
    }

    fn session(bytes: Vec<u8>) -> Session<std::io::Cursor<Vec<u8>>> {
        let config = Config::new().with_memory_size(0x10000).with_clock_hz(1000);
        Session::with_config(std::io::Cursor::new(bytes), &config).unwrap()
    }

    #[test]
    fn timestamp_accumulates_durations() {
        let bytes = trace(&[
            RawPacket::address(0),
            RawPacket::data(PacketKind::Read, 10, Lanes::all(), 0),
            RawPacket::data(PacketKind::Read, 15, Lanes::all(), 0),
        ]);
        let mut session = session(bytes);
        session.next_op().unwrap();
        assert_eq!(session.timestamp().clocks(), 25);
        assert_eq!(session.timestamp().seconds(), 0.025);
    }

    #[test]
    fn checksum_error_keeps_time() {
        let mut bytes = trace(&[RawPacket::data(PacketKind::Read, 10, Lanes::all(), 0)]);
        bytes[3] ^= 0x01;
        let mut session = session(bytes);
        assert_eq!(session.next_op(), Err(DecodeError::Checksum));
        assert_eq!(session.timestamp().clocks(), 0);
        assert_eq!(session.offset(), 4);
    }

    #[test]
    fn sync_error_discards_one_byte() {
        let mut bytes = vec![0x00];
        bytes.extend(trace(&[RawPacket::address(1), RawPacket::address(2)]));
        let mut session = session(bytes);
        assert_eq!(session.next_op(), Err(DecodeError::Sync));
        assert_eq!(session.offset(), 5);
    }

    #[test]
    fn sync_error_at_end() {
        let mut session = session(vec![0x00, 0x80, 0x00, 0x00]);
        assert_eq!(session.next_op(), Err(DecodeError::Sync));
        assert_eq!(session.next_op(), Ok(None));
    }

    #[test]
    fn error_drops_partial_burst() {
        let mut bytes = trace(&[
            RawPacket::address(0x10),
            RawPacket::data(PacketKind::Write, 1, Lanes::all(), 0x1111),
            RawPacket::data(PacketKind::Write, 1, Lanes::all(), 0x2222),
        ]);
        bytes[9] ^= 0x10;
        let mut session = session(bytes);
        assert_eq!(session.next_op(), Err(DecodeError::Checksum));
        // nothing is left to flush
        assert_eq!(session.next_op(), Ok(None));
        assert_eq!(session.next_word_address(), 0x11);
    }

    #[test]
    fn iterator_stops_at_end() {
        let bytes = trace(&[
            RawPacket::data(PacketKind::Write, 1, Lanes::LOWER, 0x00aa),
            RawPacket::data(PacketKind::Read, 1, Lanes::UPPER, 0xbb00),
        ]);
        let ops: Vec<_> = session(bytes).collect();
        assert_eq!(
            ops,
            vec![
                Ok(MemOp {
                    kind: OpKind::Write,
                    addr: 0,
                    length: 1
                }),
                Ok(MemOp {
                    kind: OpKind::Read,
                    addr: 3,
                    length: 1
                }),
            ]
        );
    }

    #[test]
    fn bad_config_is_rejected() {
        let config = Config::new().with_memory_size(1000);
        let result = Session::with_config(std::io::empty(), &config);
        assert!(matches!(result, Err(RuntimeError::MemorySize(1000))));
    }

    #[test]
    fn zero_clock_is_rejected() {
        let config = Config::new().with_clock_hz(0);
        let result = Session::with_config(std::io::empty(), &config);
        assert!(matches!(result, Err(RuntimeError::ClockRate)));
    }
}
