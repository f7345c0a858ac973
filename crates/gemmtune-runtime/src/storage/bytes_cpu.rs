use gemmtune_common::backtrace::BackTrace;
use hashbrown::HashMap;

use super::{ComputeStorage, StorageHandle, StorageId};
use crate::server::{IoError, MemoryUsage};

/// The bytes storage maps ids to host byte buffers.
#[derive(Debug)]
pub struct BytesStorage {
    memory: HashMap<StorageId, Vec<u8>>,
    bytes_in_use: u64,
    capacity: u64,
}

impl BytesStorage {
    /// Create a storage that can hold at most `capacity` bytes at once.
    pub fn new(capacity: u64) -> Self {
        Self {
            memory: HashMap::new(),
            bytes_in_use: 0,
            capacity,
        }
    }

    fn get(&self, handle: &StorageHandle) -> Result<&Vec<u8>, IoError> {
        self.memory.get(&handle.id).ok_or_else(|| IoError::InvalidHandle {
            id: handle.id,
            backtrace: BackTrace::capture(),
        })
    }
}

impl Default for BytesStorage {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

impl ComputeStorage for BytesStorage {
    fn alignment(&self) -> usize {
        4
    }

    fn alloc(&mut self, id: StorageId, size: u64) -> Result<StorageHandle, IoError> {
        let available = self.capacity - self.bytes_in_use;
        if size > available {
            return Err(IoError::BufferTooBig {
                size,
                available,
                backtrace: BackTrace::capture(),
            });
        }

        self.memory.insert(id, vec![0; size as usize]);
        self.bytes_in_use += size;

        Ok(StorageHandle { id, size })
    }

    fn dealloc(&mut self, id: StorageId) {
        if let Some(buffer) = self.memory.remove(&id) {
            self.bytes_in_use -= buffer.len() as u64;
        }
    }

    fn read(&self, handle: &StorageHandle) -> Result<&[u8], IoError> {
        self.get(handle).map(|buffer| buffer.as_slice())
    }

    fn write(&mut self, handle: &StorageHandle, offset: u64, data: &[u8]) -> Result<(), IoError> {
        let buffer = self
            .memory
            .get_mut(&handle.id)
            .ok_or_else(|| IoError::InvalidHandle {
                id: handle.id,
                backtrace: BackTrace::capture(),
            })?;

        let size = buffer.len() as u64;
        let len = data.len() as u64;
        if offset + len > size {
            return Err(IoError::OutOfBounds {
                offset,
                len,
                size,
                backtrace: BackTrace::capture(),
            });
        }

        let start = offset as usize;
        buffer[start..start + data.len()].copy_from_slice(data);

        Ok(())
    }

    fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage {
            number_allocs: self.memory.len() as u64,
            bytes_in_use: self.bytes_in_use,
            bytes_capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_alloc_and_dealloc() {
        let mut storage = BytesStorage::default();
        let id = StorageId::new();
        let handle = storage.alloc(id, 64).unwrap();

        assert_eq!(storage.read(&handle).unwrap().len(), 64);
        storage.dealloc(id);
        assert!(storage.read(&handle).is_err());
        assert_eq!(storage.memory_usage().bytes_in_use, 0);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut storage = BytesStorage::new(100);
        storage.alloc(StorageId::new(), 60).unwrap();

        let err = storage.alloc(StorageId::new(), 60).unwrap_err();

        assert!(matches!(err, IoError::BufferTooBig { available: 40, .. }));
    }

    #[test]
    fn test_write_at_offset() {
        let mut storage = BytesStorage::default();
        let handle = storage.alloc(StorageId::new(), 4).unwrap();

        storage.write(&handle, 2, &[7, 8]).unwrap();

        assert_eq!(storage.read(&handle).unwrap(), &[0, 0, 7, 8]);
        assert!(storage.write(&handle, 3, &[1, 2]).is_err());
    }
}
