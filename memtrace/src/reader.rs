use std::io::{self, Read};

use crate::packet::{RawPacket, PACKET_SIZE};

/// Capacity of the read-ahead window unless configured otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Serves small fixed-size reads out of a compacting read-ahead window.
///
/// The reader does not tell a short stream apart from a failing one: any read that cannot be
/// satisfied in full is reported as the end of the trace.
#[derive(Debug)]
pub struct PacketReader<R> {
    inner: R,
    buffer: Box<[u8]>,
    head: usize,
    tail: usize,
    offset: u64,
}

impl<R: Read> PacketReader<R> {
    /// Creates a new PacketReader with a window of [`DEFAULT_BUFFER_SIZE`] bytes.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            offset: 0,
        }
    }

    /// Consumes exactly `size` bytes, or nothing if that many are no longer available.
    pub fn read(&mut self, size: usize) -> Option<&[u8]> {
        debug_assert!(self.head <= self.tail);

        if self.head + size > self.tail {
            self.compact();
            self.fill();
            if self.head + size > self.tail {
                return None;
            }
        }

        let start = self.head;
        self.head += size;
        self.offset += size as u64;
        Some(&self.buffer[start..start + size])
    }

    pub fn read_packet(&mut self) -> Option<RawPacket> {
        self.read(PACKET_SIZE).and_then(RawPacket::from_slice)
    }

    /// Discards `size` bytes, returning `false` if the stream ended first.
    pub fn skip(&mut self, size: usize) -> bool {
        self.read(size).is_some()
    }

    /// Absolute number of bytes consumed from the stream so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Moves unread bytes to the front of the window.
    fn compact(&mut self) {
        self.buffer.copy_within(self.head..self.tail, 0);
        self.tail -= self.head;
        self.head = 0;
    }

    /// Reads from the stream until the window is full or the stream runs dry.
    fn fill(&mut self) {
        while self.tail < self.buffer.len() {
            match self.inner.read(&mut self.buffer[self.tail..]) {
                Ok(0) => break,
                Ok(n) => self.tail += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(
                        offset = self.offset,
                        "read failed, treating as end of trace: {e}"
                    );
                    break;
                }
            }
        }
    }
}
