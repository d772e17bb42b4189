use integer_encoding::VarInt;

use crate::error::{Error, Result};

/// Upper bound on the encoded header: type byte + three varints at their
/// widest (10 bytes each for a u64).
pub const MAX_LOG_ENTRY_HEADER_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogEntryType {
    Normal = 1,
    Delete = 2,
    ExpiredAt = 3,
}

impl LogEntryType {
    fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(LogEntryType::Normal),
            2 => Some(LogEntryType::Delete),
            3 => Some(LogEntryType::ExpiredAt),
            _ => None,
        }
    }
}

/// A single durable record: the unit appended to and read back from a
/// segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub entry_type: LogEntryType,
    pub timestamp: i64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Encodes an entry to its on-disk representation:
///
/// ```text
/// bytes 0..4   CRC32 (IEEE) over bytes 4..end
/// byte  4      entry type
/// bytes 5..    uvarint key_len, uvarint value_len, uvarint timestamp
///              key bytes
///              value bytes
/// ```
pub fn encode(le: &LogEntry) -> Vec<u8> {
    let mut header = [0u8; MAX_LOG_ENTRY_HEADER_SIZE];
    let mut index = 5;
    index += (le.key.len() as u64).encode_var(&mut header[index..]);
    index += (le.value.len() as u64).encode_var(&mut header[index..]);
    index += (le.timestamp as u64).encode_var(&mut header[index..]);
    header[4] = le.entry_type as u8;

    let size = index + le.key.len() + le.value.len();
    let mut buf = vec![0u8; size];
    buf[..index].copy_from_slice(&header[..index]);
    buf[index..index + le.key.len()].copy_from_slice(&le.key);
    buf[index + le.key.len()..].copy_from_slice(&le.value);

    let crc = crc32fast::hash(&buf[4..]);
    buf[..4].copy_from_slice(&crc.to_le_bytes());

    buf
}

/// Decodes a buffer produced by [`encode`]. Fails with [`Error::RawTooShort`]
/// if the buffer doesn't even hold the CRC, or [`Error::ChecksumMismatch`] if
/// the stored checksum doesn't match.
pub fn decode(raw: &[u8]) -> Result<LogEntry> {
    if raw.len() < 4 {
        return Err(Error::RawTooShort);
    }

    let crc = u32::from_le_bytes(raw[..4].try_into().unwrap());
    let recomputed = crc32fast::hash(&raw[4..]);
    if crc != recomputed {
        return Err(Error::ChecksumMismatch);
    }

    let entry_type = LogEntryType::from_u8(raw[4]).ok_or(Error::ChecksumMismatch)?;

    let mut index = 5;
    let (key_size, n) = u64::decode_var(&raw[index..]).ok_or(Error::RawTooShort)?;
    index += n;
    let (value_size, n) = u64::decode_var(&raw[index..]).ok_or(Error::RawTooShort)?;
    index += n;
    let (timestamp, n) = u64::decode_var(&raw[index..]).ok_or(Error::RawTooShort)?;
    index += n;

    let key_size = key_size as usize;
    let value_size = value_size as usize;

    Ok(LogEntry {
        entry_type,
        timestamp: timestamp as i64,
        key: raw[index..index + key_size].to_vec(),
        value: raw[index + key_size..index + key_size + value_size].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LogEntry {
        LogEntry {
            entry_type: LogEntryType::Normal,
            timestamp: 1_700_000_000,
            key: b"hello".to_vec(),
            value: b"world".to_vec(),
        }
    }

    #[test]
    fn round_trip() {
        let le = sample();
        let encoded = encode(&le);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(le, decoded);
    }

    #[test]
    fn round_trip_empty_value() {
        let le = LogEntry {
            entry_type: LogEntryType::Delete,
            timestamp: 42,
            key: b"k".to_vec(),
            value: Vec::new(),
        };
        let encoded = encode(&le);
        assert_eq!(decode(&encoded).unwrap(), le);
    }

    #[test]
    fn round_trip_negative_timestamp() {
        let le = LogEntry {
            entry_type: LogEntryType::ExpiredAt,
            timestamp: -5,
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        };
        let encoded = encode(&le);
        assert_eq!(decode(&encoded).unwrap(), le);
    }

    #[test]
    fn raw_too_short() {
        assert_eq!(decode(&[1, 2, 3]), Err(Error::RawTooShort));
    }

    #[test]
    fn checksum_mismatch_on_bit_flip() {
        let mut encoded = encode(&sample());
        let flip_at = 4 + (encoded.len() - 4) / 2;
        encoded[flip_at] ^= 0xff;
        assert_eq!(decode(&encoded), Err(Error::ChecksumMismatch));
    }

    #[test]
    fn checksum_mismatch_every_byte() {
        let original = encode(&sample());
        for i in 4..original.len() {
            let mut encoded = original.clone();
            encoded[i] ^= 0xff;
            assert_eq!(decode(&encoded), Err(Error::ChecksumMismatch));
        }
    }
}
