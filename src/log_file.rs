use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::log_entry::{self, LogEntry, MAX_LOG_ENTRY_HEADER_SIZE};

pub const LOG_FILE_NAME_PREFIX: &str = "log.";

/// One append-only segment file, identified by its `fid`. Exactly one
/// `LogFile` per data directory is active (writable) at a time; the rest are
/// archived and read-only.
pub struct LogFile {
    fid: i32,
    path: PathBuf,
    file: File,
    size: i64,
}

impl LogFile {
    /// Opens `<dir>/log.<fid>`, creating it if it doesn't already exist.
    pub fn open(dir: &Path, fid: i32) -> Result<Self> {
        let path = dir.join(format!("{LOG_FILE_NAME_PREFIX}{fid}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self { fid, path, file, size: 0 })
    }

    /// Reads exactly `size` bytes at `offset` and decodes them as a record.
    pub fn read(&self, offset: i64, size: usize) -> Result<LogEntry> {
        let mut buf = vec![0u8; size];
        self.file.read_exact_at(&mut buf, offset as u64)?;
        Ok(log_entry::decode(&buf)?)
    }

    /// Reads one record starting at `offset`, without knowing its size in
    /// advance: a bounded header prefix is read first to learn the key and
    /// value lengths, then exactly that many more bytes are pulled in.
    /// Returns `None` at a clean end of file.
    pub fn load(&self, offset: i64) -> Result<Option<(LogEntry, usize)>> {
        let mut header = vec![0u8; MAX_LOG_ENTRY_HEADER_SIZE];
        match self.file.read_exact_at(&mut header, offset as u64) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let mut index = 5;
        let (key_size, n): (u64, usize) = integer_encoding::VarInt::decode_var(&header[index..])
            .ok_or(crate::error::Error::RawTooShort)?;
        index += n;
        let (value_size, n): (u64, usize) = integer_encoding::VarInt::decode_var(&header[index..])
            .ok_or(crate::error::Error::RawTooShort)?;
        index += n;
        let (_timestamp, n): (u64, usize) = integer_encoding::VarInt::decode_var(&header[index..])
            .ok_or(crate::error::Error::RawTooShort)?;
        index += n;

        let kv_len = (key_size + value_size) as usize;
        let mut kv_buf = vec![0u8; kv_len];
        self.file.read_exact_at(&mut kv_buf, offset as u64 + index as u64)?;

        let mut buf = Vec::with_capacity(index + kv_len);
        buf.extend_from_slice(&header[..index]);
        buf.extend_from_slice(&kv_buf);

        let le = log_entry::decode(&buf)?;
        let consumed = buf.len();
        Ok(Some((le, consumed)))
    }

    /// Encodes and appends `le` at `offset`, returning the number of bytes
    /// written.
    pub fn write(&mut self, offset: i64, le: &LogEntry) -> Result<usize> {
        let buf = log_entry::encode(le);
        self.file.write_all_at(&buf, offset as u64)?;
        self.size += buf.len() as i64;
        Ok(buf.len())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.sync()
    }

    pub fn fid(&self) -> i32 {
        self.fid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&mut self) -> Result<i64> {
        if self.size > 0 {
            return Ok(self.size);
        }
        let stat = self.file.metadata()?;
        self.size = stat.len() as i64;
        Ok(self.size)
    }
}
