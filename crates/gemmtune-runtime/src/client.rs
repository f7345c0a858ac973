use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::device::{DeviceId, DeviceProperties};
use crate::server::{Handle, IoError, Kernel, LaunchError, MemoryUsage, ServerError};
use crate::storage::BytesStorage;
use crate::stream::Stream;

/// The ComputeClient is the entry point to the device: it allocates memory, enqueues kernels on
/// its stream and synchronizes with it.
///
/// Clones share the same stream and memory.
#[derive(Debug, Clone)]
pub struct ComputeClient {
    stream: Stream,
    properties: Arc<DeviceProperties>,
}

impl ComputeClient {
    /// Create a client for a host device with the given properties, spawning its stream.
    pub fn new(properties: DeviceProperties) -> Result<Self, ServerError> {
        let storage = BytesStorage::new(properties.memory_capacity);
        let name = format!("gemmtune-stream-{}", properties.id.index_id);
        let stream = Stream::new(&name, storage).map_err(|err| ServerError::ServerUnhealthy {
            reason: format!("Unable to spawn the stream worker: {err}"),
            backtrace: gemmtune_common::backtrace::BackTrace::capture(),
        })?;

        Ok(Self {
            stream,
            properties: Arc::new(properties),
        })
    }

    /// Create a client for the host device described by the global configuration.
    pub fn host(index: u32) -> Result<Self, ServerError> {
        let config = GlobalConfig::get();
        Self::new(DeviceProperties::host(index, &config.execution.device))
    }

    /// The device id.
    pub fn id(&self) -> DeviceId {
        self.properties.id
    }

    /// The device properties.
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Allocate `size` zeroed bytes.
    pub fn empty(&self, size: usize) -> Result<Handle, IoError> {
        let storage = self.stream.alloc(size as u64)?;
        Ok(Handle::new(storage, self.stream.sender()))
    }

    /// Allocate a buffer holding `data`.
    pub fn create(&self, data: &[u8]) -> Result<Handle, IoError> {
        let handle = self.empty(data.len())?;
        self.stream.write(*handle.storage(), 0, data.to_vec())?;
        Ok(handle)
    }

    /// Allocate a buffer holding the bytes of `data`.
    pub fn create_from_slice<E: bytemuck::Pod>(&self, data: &[E]) -> Result<Handle, IoError> {
        self.create(bytemuck::cast_slice(data))
    }

    /// Overwrite the start of a buffer, ordered after previously enqueued kernels.
    pub fn write(&self, handle: &Handle, data: &[u8]) -> Result<(), IoError> {
        self.stream.write(*handle.storage(), 0, data.to_vec())
    }

    /// Read a buffer once every previously enqueued kernel has executed.
    pub fn read_one(&self, handle: &Handle) -> Result<Vec<u8>, IoError> {
        self.stream.read(*handle.storage())
    }

    /// Read a buffer as a vector of `E`.
    pub fn read_as<E: bytemuck::Pod>(&self, handle: &Handle) -> Result<Vec<E>, IoError> {
        let bytes = self.read_one(handle)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Enqueue a kernel on the stream. Errors raised while it executes are reported by
    /// [sync](Self::sync).
    pub fn launch(&self, kernel: Box<dyn Kernel>) -> Result<(), LaunchError> {
        self.stream.execute(kernel)?;
        Ok(())
    }

    /// Wait for all enqueued kernels, returning the first error raised since the last sync.
    pub fn sync(&self) -> Result<(), ServerError> {
        self.stream.sync()
    }

    /// Current memory usage, once all enqueued work has executed.
    pub fn memory_usage(&self) -> Result<MemoryUsage, IoError> {
        self.stream.memory_usage()
    }
}
