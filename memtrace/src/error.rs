use std::io;

/// Error produced by a single decode call.
///
/// None of these are fatal: the session stays usable and the next call picks up decoding
/// wherever the stream was left.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Packet synchronization error")]
    Sync,

    #[error("Packet checksum error")]
    Checksum,

    #[error("Malformed read/write burst")]
    MalformedBurst(#[source] Malformed),
}

impl DecodeError {
    pub fn status(&self) -> Status {
        match self {
            Self::Sync => Status::SyncError,
            Self::Checksum => Status::ChecksumError,
            Self::MalformedBurst(_) => Status::MalformedBurst,
        }
    }
}

impl From<Malformed> for DecodeError {
    fn from(err: Malformed) -> Self {
        Self::MalformedBurst(err)
    }
}

/// Reason a burst was rejected.
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Malformed {
    #[error("read and write packets mixed within one burst")]
    MixedAccess,

    #[error("byte and word accesses mixed within one burst")]
    MixedWidth,

    #[error("data packet has neither byte lane enabled")]
    NoLanes,
}

/// Outcome of a decode call, as a small numeric code.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Success = 0,
    Eof = 1,
    SyncError = 2,
    ChecksumError = 3,
    MalformedBurst = 4,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Eof => "End of file",
            Self::SyncError => "Packet synchronization error",
            Self::ChecksumError => "Packet checksum error",
            Self::MalformedBurst => "Malformed read/write burst",
        }
    }

    /// Status of a value returned by [`Session::next_op`][crate::Session::next_op].
    pub fn of<T>(result: &Result<Option<T>, DecodeError>) -> Self {
        match result {
            Ok(Some(_)) => Self::Success,
            Ok(None) => Self::Eof,
            Err(err) => err.status(),
        }
    }
}

impl TryFrom<i64> for Status {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Success),
            1 => Ok(Self::Eof),
            2 => Ok(Self::SyncError),
            3 => Ok(Self::ChecksumError),
            4 => Ok(Self::MalformedBurst),
            _ => Err(code),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human readable text for a numeric [`Status`] code.
pub fn error_string(code: i64) -> &'static str {
    Status::try_from(code).map_or("(Unknown error)", Status::as_str)
}

#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    #[error("shadow memory size {0:#x} is not a power of two")]
    MemorySize(usize),

    #[error("read buffer of {0} bytes cannot hold a packet")]
    BufferSize(usize),

    #[error("bus clock rate must be non-zero")]
    ClockRate,

    #[error("I/O error")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_match_codes() {
        assert_eq!(error_string(0), "Success");
        assert_eq!(error_string(1), "End of file");
        assert_eq!(error_string(2), "Packet synchronization error");
        assert_eq!(error_string(3), "Packet checksum error");
        assert_eq!(error_string(4), "Malformed read/write burst");
    }

    #[test]
    fn out_of_range_is_unknown() {
        assert_eq!(error_string(5), "(Unknown error)");
        assert_eq!(error_string(-1), "(Unknown error)");
    }

    #[test]
    fn errors_display_status_text() {
        for err in [
            DecodeError::Sync,
            DecodeError::Checksum,
            DecodeError::MalformedBurst(Malformed::MixedWidth),
        ] {
            assert_eq!(err.to_string(), err.status().as_str());
        }
    }

    #[test]
    fn status_of_results() {
        assert_eq!(Status::of::<u8>(&Ok(Some(1))), Status::Success);
        assert_eq!(Status::of::<u8>(&Ok(None)), Status::Eof);
        assert_eq!(
            Status::of::<u8>(&Err(DecodeError::Checksum)),
            Status::ChecksumError
        );
    }
}
