use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use s31_core::{S31Error, S31Result};

/// Abstract interface for the flash file system.
pub trait StorageBackend {
    /// Replace the whole file. Returns the number of bytes that reached the
    /// media; anything short of `data.len()` is a failed write.
    fn write(&mut self, name: &str, data: &[u8]) -> S31Result<usize>;

    /// Read the whole file. `NotFound` when absent.
    fn read(&self, name: &str) -> S31Result<Vec<u8>>;

    /// Delete a file. Deleting a missing file succeeds.
    fn delete(&mut self, name: &str) -> S31Result<()>;

    fn exists(&self, name: &str) -> bool;
}

/// Write `data` and treat a short write as an error.
pub fn write_all(backend: &mut dyn StorageBackend, name: &str, data: &[u8]) -> S31Result<()> {
    let n = backend.write(name, data)?;
    if n != data.len() {
        return Err(S31Error::ShortWrite);
    }
    Ok(())
}

/// Volatile file system. Used by the host simulator and by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    files: BTreeMap<String, Vec<u8>>,
    writes: BTreeMap<String, u32>,
    /// When set, writes persist only this many bytes.
    pub write_limit: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write attempts made to `name`.
    pub fn write_count(&self, name: &str) -> u32 {
        self.writes.get(name).copied().unwrap_or(0)
    }

    /// Overwrite a file directly, bypassing the write counters.
    pub fn plant(&mut self, name: &str, data: &[u8]) {
        self.files.insert(name.to_string(), data.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(|v| v.as_slice())
    }
}

impl StorageBackend for MemoryBackend {
    fn write(&mut self, name: &str, data: &[u8]) -> S31Result<usize> {
        *self.writes.entry(name.to_string()).or_insert(0) += 1;
        let n = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.files.insert(name.to_string(), data[..n].to_vec());
        Ok(n)
    }

    fn read(&self, name: &str) -> S31Result<Vec<u8>> {
        self.files.get(name).cloned().ok_or(S31Error::NotFound)
    }

    fn delete(&mut self, name: &str) -> S31Result<()> {
        self.files.remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}
