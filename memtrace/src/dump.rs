//! Human readable rendering of decoded operations.

use std::io::{self, Write};

use crate::session::Timestamp;
use crate::{MemOp, OpKind};

/// Number of byte columns every line is padded to.
pub const DUMP_COLUMNS: usize = 32;

/// Writes one line describing `op` and the bytes it moved.
///
/// `| seconds | label | [length] | address: | hex bytes in 16-bit groups | ascii |`
pub fn write_op<W: Write>(
    writer: &mut W,
    timestamp: Timestamp,
    op: &MemOp,
    bytes: &[u8],
) -> io::Result<()> {
    let label = match op.kind {
        OpKind::Read => "read",
        OpKind::Write => "WRITE",
    };
    write!(
        writer,
        "{:11.6}s {:<5} [{:2}] {:08x}: ",
        timestamp.seconds(),
        label,
        op.length,
        op.addr
    )?;

    let columns = bytes.len().max(DUMP_COLUMNS);
    for i in 0..columns {
        let pad = if i & 1 == 0 { " " } else { "" };
        match bytes.get(i) {
            Some(byte) => write!(writer, "{pad}{byte:02x}")?,
            None => write!(writer, "{pad}  ")?,
        }
    }

    write!(writer, "  ")?;
    for i in 0..columns {
        let c = match bytes.get(i) {
            Some(&byte) if byte.is_ascii_graphic() || byte == b' ' => byte as char,
            Some(_) => '.',
            None => ' ',
        };
        write!(writer, "{c}")?;
    }

    writeln!(writer)
}
