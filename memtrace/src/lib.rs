//! Decoder for raw RAM bus traces.
//!
//! A logger snooping a 16-bit RAM bus records every address assertion and data transfer as a
//! 4-byte [packet][packet::RawPacket]. This crate turns that packet stream back into
//! [read and write bursts][MemOp] and keeps a [shadow copy][memory::ShadowMemory] of every byte
//! seen on the bus along the way.
//!
//! Decoding is driven through a [`Session`], which owns the input stream and all decode state:
//!
//! ```no_run
//! use memtrace::Session;
//!
//! let mut session = Session::open("trace.raw")?;
//! while let Some(result) = session.next() {
//!     match result {
//!         Ok(op) => println!("{:.6} {op:x?}", session.timestamp().seconds()),
//!         Err(e) => eprintln!("error at offset {:x}: {e}", session.offset()),
//!     }
//! }
//! # Ok::<(), memtrace::RuntimeError>(())
//! ```

use serde::Serialize;

pub mod assembler;
pub mod config;
pub mod dump;
pub mod error;
pub mod memory;
pub mod merge;
pub mod packet;
pub mod reader;
pub mod session;

pub use config::Config;
pub use error::{error_string, DecodeError, Malformed, RuntimeError, Status};
pub use memory::ShadowMemory;
pub use session::{Session, Timestamp};

/// Direction of a memory operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Read,
    Write,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One decoded read or write burst.
///
/// The bytes moved live in the session's shadow memory at `addr..addr + length` (modulo the
/// memory size) and stay valid only until the next decode call overwrites them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MemOp {
    pub kind: OpKind,
    /// Byte address of the first byte.
    pub addr: u32,
    /// Length in bytes.
    pub length: u32,
}
