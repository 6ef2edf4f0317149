use crate::error::RuntimeError;
use crate::memory::DEFAULT_MEMORY_SIZE;
use crate::packet::PACKET_SIZE;
use crate::reader::DEFAULT_BUFFER_SIZE;

/// Bus clock the logger timestamps against, unless configured otherwise.
pub const DEFAULT_CLOCK_HZ: u64 = 100_000_000;

/// Parameters of a decode [`Session`][crate::Session].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Frequency of the clock packet durations are counted in.
    pub clock_hz: u64,
    /// Size of the shadow memory image in bytes. Must be a power of two.
    pub memory_size: usize,
    /// Capacity of the read-ahead window in bytes.
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            memory_size: DEFAULT_MEMORY_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_clock_hz(self, clock_hz: u64) -> Self {
        Self { clock_hz, ..self }
    }

    pub fn with_memory_size(self, memory_size: usize) -> Self {
        Self {
            memory_size,
            ..self
        }
    }

    pub fn with_buffer_size(self, buffer_size: usize) -> Self {
        Self {
            buffer_size,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.clock_hz == 0 {
            return Err(RuntimeError::ClockRate);
        }
        if !self.memory_size.is_power_of_two() {
            return Err(RuntimeError::MemorySize(self.memory_size));
        }
        if self.buffer_size < PACKET_SIZE {
            return Err(RuntimeError::BufferSize(self.buffer_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_tiny_buffer() {
        let config = Config::new().with_buffer_size(PACKET_SIZE - 1);
        assert!(matches!(config.validate(), Err(RuntimeError::BufferSize(3))));
    }

    #[test]
    fn rejects_zero_clock() {
        let config = Config::new().with_clock_hz(0);
        assert!(matches!(config.validate(), Err(RuntimeError::ClockRate)));
    }

    #[test]
    fn rejects_odd_memory() {
        let config = Config::new().with_memory_size(48 * 1024);
        assert!(matches!(
            config.validate(),
            Err(RuntimeError::MemorySize(0xc000))
        ));
    }
}
