mod compactor;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::Sender;

use crate::error::{Error, Result};
use crate::flock::DirLock;
use crate::index::art::AdaptiveRadixTree;
use crate::index::{MemTable, MemValue};
use crate::log_entry::{LogEntry, LogEntryType};
use crate::log_file::{LogFile, LOG_FILE_NAME_PREFIX};
use crate::options::Options;

/// An embeddable, append-only log-structured key-value store with an
/// Adaptive Radix Tree index and a concurrent background compactor.
pub struct DB {
    inner: Arc<RwLock<Inner>>,
    shutdown_tx: Sender<()>,
    compactor: Option<JoinHandle<()>>,
    _lock: DirLock,
}

pub(crate) struct Inner {
    opts: Options,
    size: i64,
    index0: Box<dyn MemTable>,
    index1: Option<Box<dyn MemTable>>,
    active: LogFile,
    offset: i64,
    archived: HashMap<i32, LogFile>,
    in_gc: bool,
    last_gc_time: Instant,
}

fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs() as i64
}

impl DB {
    /// Opens (and if necessary creates) a data directory as a store. Replays
    /// every log file found there to rebuild the index, then starts the
    /// background compactor.
    pub fn new(opts: Options) -> Result<Self> {
        if !opts.db_path.exists() {
            std::fs::create_dir_all(&opts.db_path)?;
        }
        let lock = DirLock::acquire(&opts.db_path)?;

        let mut index0: Box<dyn MemTable> = Box::new(AdaptiveRadixTree::new(opts.art_opt));
        let mut archived = HashMap::new();
        let mut size = 0i64;

        let mut fids = collect_log_fids(&opts.db_path)?;
        fids.sort_unstable();

        let mut active = None;
        let mut offset = 0i64;
        for (i, fid) in fids.iter().enumerate() {
            let log_file = LogFile::open(&opts.db_path, *fid)?;
            let consumed = reload_index(&log_file, *fid, index0.as_mut(), &mut size)?;
            if i == fids.len() - 1 {
                offset = consumed;
                active = Some(log_file);
            } else {
                archived.insert(*fid, log_file);
            }
        }
        let active = match active {
            Some(active) => active,
            None => LogFile::open(&opts.db_path, 0)?,
        };

        log::info!("opened {} with {} live keys", opts.db_path.display(), size);

        let inner = Arc::new(RwLock::new(Inner {
            opts,
            size,
            index0,
            index1: None,
            active,
            offset,
            archived,
            in_gc: false,
            last_gc_time: Instant::now(),
        }));

        let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(0);
        let compactor_inner = Arc::clone(&inner);
        let gc_interval = inner.read().unwrap().opts.log_file_gc_interval;
        let handle = std::thread::Builder::new()
            .name("peach-compactor".into())
            .spawn(move || compactor::run(compactor_inner, gc_interval, shutdown_rx))
            .expect("failed to spawn compactor thread");

        Ok(Self { inner, shutdown_tx, compactor: Some(handle), _lock: lock })
    }

    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let inner = self.inner.read().unwrap();
        let value = inner
            .index0
            .get(key)
            .or_else(|| inner.index1.as_ref().and_then(|index1| index1.get(key)))
            .ok_or(Error::KeyNotFound)?;
        inner.read_value(&value)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.write().unwrap().put(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.write().unwrap().delete(key)
    }

    pub fn sync(&self) -> Result<()> {
        self.inner.read().unwrap().active.sync()
    }

    pub fn size(&self) -> i64 {
        self.inner.read().unwrap().size
    }

    /// Forces a full compaction start-plus-drain cycle, for operational use
    /// (the CLI's `compact` subcommand). Blocks until `index0` is fully
    /// drained into `index1` and promoted.
    pub fn compact(&self) -> Result<()> {
        let mut guard = self.inner.write().unwrap();
        if !guard.in_gc {
            guard.start_gc()?;
        }
        while guard.in_gc {
            let before = guard.index0.size();
            guard.gc_step()?;
            if guard.in_gc && guard.index0.size() == before {
                // Remaining entries all point at the active file; nothing
                // more can be drained until it rotates again.
                break;
            }
        }
        Ok(())
    }

    /// Flushes and closes every open log file, stops the compactor thread,
    /// and releases the directory lock.
    pub fn close(self) -> Result<()> {
        drop(self.shutdown_tx);
        if let Some(handle) = self.compactor {
            let _ = handle.join();
        }

        let guard = self.inner.write().unwrap();
        guard.active.sync()?;
        guard.active.close()?;
        for log_file in guard.archived.values() {
            log_file.close()?;
        }
        Ok(())
    }
}

impl Inner {
    pub(crate) fn in_gc(&self) -> bool {
        self.in_gc
    }

    pub(crate) fn last_gc_time(&self) -> Instant {
        self.last_gc_time
    }

    fn read_value(&self, value: &MemValue) -> Result<Vec<u8>> {
        let log_file = if self.active.fid() == value.file_id {
            &self.active
        } else {
            self.archived.get(&value.file_id).ok_or(Error::LogFileNotExist)?
        };
        Ok(log_file.read(value.offset, value.size)?.value)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let entry =
            LogEntry { entry_type: LogEntryType::Normal, timestamp: unix_now(), key: key.to_vec(), value: value.to_vec() };
        let written = self.active.write(self.offset, &entry)?;
        let mem_value = MemValue::new(self.active.fid(), self.offset, written);
        self.offset += written as i64;

        let replaced = if self.in_gc {
            match self.index1.as_mut() {
                Some(index1) => index1.put(key, mem_value),
                None => self.index0.put(key, mem_value),
            }
        } else {
            self.index0.put(key, mem_value)
        };
        if replaced.is_none() {
            self.size += 1;
        }

        if let Err(err) = self.gc_step() {
            log::warn!("compaction step failed: {err}");
        }
        self.maybe_rotate();
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        let present = self.index0.get(key).is_some()
            || self.index1.as_ref().map(|index1| index1.get(key).is_some()).unwrap_or(false);
        if !present {
            return Ok(());
        }

        let entry = LogEntry { entry_type: LogEntryType::Delete, timestamp: unix_now(), key: key.to_vec(), value: Vec::new() };
        let written = self.active.write(self.offset, &entry)?;
        self.offset += written as i64;

        if self.in_gc {
            match self.index1.as_mut() {
                Some(index1) => {
                    index1.delete(key);
                }
                None => {
                    self.index0.delete(key);
                }
            }
        } else {
            self.index0.delete(key);
        }
        self.size -= 1;

        if let Err(err) = self.gc_step() {
            log::warn!("compaction step failed: {err}");
        }
        self.maybe_rotate();
        Ok(())
    }

    fn maybe_rotate(&mut self) {
        let file_size = match self.active.size() {
            Ok(size) => size,
            Err(err) => {
                log::warn!("failed to stat active log file: {err}");
                return;
            }
        };
        if file_size as u64 > self.opts.log_file_size_threshold && !self.in_gc {
            if let Err(err) = self.rotate() {
                log::warn!("log file rotation failed: {err}");
            }
        }
    }

    fn rotate(&mut self) -> Result<()> {
        let current_fid = self.active.fid();
        let new_active = LogFile::open(&self.opts.db_path, current_fid + 1)?;
        let old_active = std::mem::replace(&mut self.active, new_active);
        old_active.sync()?;
        self.archived.insert(current_fid, old_active);
        self.offset = 0;
        Ok(())
    }

    pub(crate) fn start_gc(&mut self) -> Result<()> {
        self.in_gc = true;
        self.index1 = Some(Box::new(AdaptiveRadixTree::new(self.opts.art_opt)));
        self.last_gc_time = Instant::now();
        self.rotate()
    }

    pub(crate) fn gc_step(&mut self) -> Result<()> {
        if !self.in_gc {
            return Ok(());
        }

        let (key, value) = match self.index0.minimum() {
            Some(kv) => kv,
            None => return self.finish_gc(),
        };

        if value.file_id == self.active.fid() {
            return Ok(());
        }

        if let Some(expired_at) = value.expired_at {
            if expired_at < unix_now() {
                self.index0.delete(&key);
                self.last_gc_time = Instant::now();
                return Ok(());
            }
        }

        let archived = self.archived.get(&value.file_id).ok_or(Error::LogFileNotExist)?;
        let entry = match archived.read(value.offset, value.size) {
            Ok(entry) => entry,
            Err(Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.index0.delete(&key);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let written = self.active.write(self.offset, &entry)?;
        let mut moved = value;
        moved.file_id = self.active.fid();
        moved.offset = self.offset;
        if let Some(index1) = self.index1.as_mut() {
            index1.put(&key, moved);
        }
        self.index0.delete(&key);
        self.last_gc_time = Instant::now();
        self.offset += written as i64;

        Ok(())
    }

    fn finish_gc(&mut self) -> Result<()> {
        if let Some(index1) = self.index1.take() {
            self.index0 = index1;
        }
        self.in_gc = false;
        self.remove_archived_log_files()
    }

    fn remove_archived_log_files(&mut self) -> Result<()> {
        let mut fids: Vec<i32> = self.archived.keys().copied().collect();
        fids.sort_unstable();
        for fid in fids {
            if let Some(log_file) = self.archived.remove(&fid) {
                std::fs::remove_file(log_file.path())?;
            }
        }
        Ok(())
    }
}

fn collect_log_fids(dir: &Path) -> Result<Vec<i32>> {
    let mut fids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(suffix) = name.strip_prefix(LOG_FILE_NAME_PREFIX) {
            if let Ok(fid) = suffix.parse::<i32>() {
                fids.push(fid);
            }
        }
    }
    Ok(fids)
}

/// Replays a single log file's records into `index0`, returning the offset
/// just past the last valid record (the write cursor, if this turns out to
/// be the active file).
fn reload_index(lf: &LogFile, fid: i32, index0: &mut dyn MemTable, size: &mut i64) -> Result<i64> {
    let mut offset = 0i64;
    loop {
        let (entry, consumed) = match lf.load(offset)? {
            Some(loaded) => loaded,
            None => return Ok(offset),
        };

        match entry.entry_type {
            LogEntryType::Delete => {
                if index0.delete(&entry.key).is_some() {
                    *size -= 1;
                }
            }
            LogEntryType::ExpiredAt => {
                if unix_now() < entry.timestamp {
                    let mut value = MemValue::new(fid, offset, consumed);
                    value.expired_at = Some(entry.timestamp);
                    if index0.put(&entry.key, value).is_none() {
                        *size += 1;
                    }
                }
            }
            LogEntryType::Normal => {
                let value = MemValue::new(fid, offset, consumed);
                if index0.put(&entry.key, value).is_none() {
                    *size += 1;
                }
            }
        }

        offset += consumed as i64;
    }
}
