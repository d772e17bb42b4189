use std::fmt;

/// Errors produced by the store. Mirrors the taxonomy of the original
/// implementation: lookup-miss, integrity, resource, I/O, and locking.
#[derive(Debug)]
pub enum Error {
    /// The requested key has no live binding.
    KeyNotFound,
    /// An index entry points at a segment file that is not open.
    LogFileNotExist,
    /// A decode buffer was shorter than the minimum header size.
    RawTooShort,
    /// The CRC32 stored in a record did not match the computed checksum.
    ChecksumMismatch,
    /// The data directory is already locked by another instance.
    Lock(String),
    /// An underlying filesystem operation failed.
    Io(std::io::Error),
    /// Layered configuration (file/environment) failed to load or parse.
    Config(config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyNotFound => write!(f, "key not found"),
            Error::LogFileNotExist => write!(f, "log file not exist"),
            Error::RawTooShort => write!(f, "raw data size too short to decode"),
            Error::ChecksumMismatch => write!(f, "crc check sum not match"),
            Error::Lock(path) => write!(f, "failed to lock data directory at {path}"),
            Error::Io(err) => write!(f, "{err}"),
            Error::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Error::KeyNotFound, Error::KeyNotFound)
                | (Error::LogFileNotExist, Error::LogFileNotExist)
                | (Error::RawTooShort, Error::RawTooShort)
                | (Error::ChecksumMismatch, Error::ChecksumMismatch)
        )
    }
}
