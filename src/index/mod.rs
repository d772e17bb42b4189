pub mod art;

/// The in-memory locator for a key: which segment holds its current value,
/// and where in that segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemValue {
    pub file_id: i32,
    pub offset: i64,
    pub size: usize,
    pub expired_at: Option<i64>,
}

impl MemValue {
    pub fn new(file_id: i32, offset: i64, size: usize) -> Self {
        Self { file_id, offset, size, expired_at: None }
    }
}

/// The in-memory index contract the DB engine relies on. The ART is the
/// sole production implementation, but keeping this as a trait mirrors the
/// original `index.MemTable` interface and keeps the DB engine decoupled
/// from ART internals.
pub trait MemTable: Send {
    fn get(&self, key: &[u8]) -> Option<MemValue>;
    fn put(&mut self, key: &[u8], value: MemValue) -> Option<MemValue>;
    fn delete(&mut self, key: &[u8]) -> Option<MemValue>;
    fn minimum(&self) -> Option<(Vec<u8>, MemValue)>;
    fn maximum(&self) -> Option<(Vec<u8>, MemValue)>;
    fn iterate(&self) -> Box<dyn Iterator<Item = (Vec<u8>, MemValue)> + '_>;
    fn size(&self) -> i64;
}
