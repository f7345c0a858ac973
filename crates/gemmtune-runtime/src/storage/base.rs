use crate::id::id_type;
use crate::server::{IoError, MemoryUsage};

id_type!(
    /// Storage ID.
    StorageId
);

/// Defines if data uses a full memory chunk or a slice of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageHandle {
    /// Storage id.
    pub id: StorageId,
    /// Size of the allocation in bytes.
    pub size: u64,
}

/// Storage types are responsible for allocating and deallocating memory.
pub trait ComputeStorage: Send {
    /// The alignment memory is allocated with in this storage.
    fn alignment(&self) -> usize;

    /// Allocates `size` zeroed bytes of memory for the given id.
    fn alloc(&mut self, id: StorageId, size: u64) -> Result<StorageHandle, IoError>;

    /// Deallocates the memory pointed by the given storage id.
    fn dealloc(&mut self, id: StorageId);

    /// Returns the bytes of an allocation.
    fn read(&self, handle: &StorageHandle) -> Result<&[u8], IoError>;

    /// Copies `data` into an allocation, starting at `offset` bytes.
    fn write(&mut self, handle: &StorageHandle, offset: u64, data: &[u8]) -> Result<(), IoError>;

    /// Current memory usage.
    fn memory_usage(&self) -> MemoryUsage;
}
