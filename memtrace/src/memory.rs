use std::io::{self, Write};

use crate::error::RuntimeError;

/// Size of the reconstructed address space unless configured otherwise.
pub const DEFAULT_MEMORY_SIZE: usize = 16 * 1024 * 1024;

/// Reconstructed image of the memory observed on the bus.
///
/// Addresses are reduced modulo the image size before every access, so any `u32` is a valid
/// address. Bytes that were never observed stay zero.
#[derive(Clone, PartialEq, Eq)]
pub struct ShadowMemory {
    bytes: Box<[u8]>,
    mask: usize,
}

impl ShadowMemory {
    /// Allocates a zeroed image of `size` bytes. `size` must be a non-zero power of two.
    pub fn new(size: usize) -> Result<Self, RuntimeError> {
        if !size.is_power_of_two() {
            return Err(RuntimeError::MemorySize(size));
        }
        Ok(Self {
            bytes: vec![0u8; size].into_boxed_slice(),
            mask: size - 1,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn store(&mut self, addr: u32, value: u8) {
        self.bytes[addr as usize & self.mask] = value;
    }

    #[inline]
    pub fn get(&self, addr: u32) -> u8 {
        self.bytes[addr as usize & self.mask]
    }

    /// Iterates over `len` bytes starting at `addr`, wrapping at the end of the image.
    pub fn read(&self, addr: u32, len: u32) -> impl Iterator<Item = u8> + '_ {
        (0..len).map(move |i| self.get(addr.wrapping_add(i)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Writes the whole image, byte 0 first.
    pub fn write_image<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.bytes)?;
        writer.flush()
    }
}

impl Default for ShadowMemory {
    fn default() -> Self {
        Self {
            bytes: vec![0u8; DEFAULT_MEMORY_SIZE].into_boxed_slice(),
            mask: DEFAULT_MEMORY_SIZE - 1,
        }
    }
}

impl std::fmt::Debug for ShadowMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowMemory")
            .field("size", &self.bytes.len())
            .finish()
    }
}
