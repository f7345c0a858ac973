use std::sync::Arc;

use gemmtune_common::backtrace::BackTrace;
use thiserror::Error;

use crate::storage::{ComputeStorage, StorageHandle, StorageId};
use crate::stream::Message;

/// A unit of work executed in order on a [stream](crate::stream::Stream).
///
/// Kernels own the [handles](Handle) they use, keeping the underlying memory alive until they
/// have been executed.
pub trait Kernel: Send + 'static {
    /// Name used in logs and error messages.
    fn name(&self) -> String;

    /// Execute the kernel against the device storage.
    fn execute(self: Box<Self>, storage: &mut dyn ComputeStorage) -> Result<(), ServerError>;
}

/// Reference counted handle to device memory.
///
/// The memory is released once the last clone of the handle is dropped.
#[derive(Clone, Debug)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    storage: StorageHandle,
    release: async_channel::Sender<Message>,
}

impl Handle {
    pub(crate) fn new(storage: StorageHandle, release: async_channel::Sender<Message>) -> Self {
        Self {
            inner: Arc::new(HandleInner { storage, release }),
        }
    }

    /// The storage this handle points to.
    pub fn storage(&self) -> &StorageHandle {
        &self.inner.storage
    }

    /// The storage id.
    pub fn id(&self) -> StorageId {
        self.inner.storage.id
    }

    /// Size of the allocation in bytes.
    pub fn size(&self) -> u64 {
        self.inner.storage.size
    }

    /// Whether both handles point to the same allocation.
    pub fn same_allocation(&self, other: &Handle) -> bool {
        self.id() == other.id()
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        // The stream may already be gone when the process shuts down.
        let _ = self.release.try_send(Message::Dealloc(self.storage.id));
    }
}

/// Memory usage of a device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Number of live allocations.
    pub number_allocs: u64,
    /// Bytes currently allocated.
    pub bytes_in_use: u64,
    /// Maximum number of bytes that can be allocated.
    pub bytes_capacity: u64,
}

impl core::fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} allocation(s), {} / {} bytes",
            self.number_allocs, self.bytes_in_use, self.bytes_capacity
        )
    }
}

/// Errors raised by memory operations.
#[derive(Error, Clone)]
pub enum IoError {
    /// The allocation doesn't fit in the device memory.
    #[error("Can't allocate buffer of size {size}, {available} bytes available\n{backtrace}")]
    BufferTooBig {
        /// Requested size.
        size: u64,
        /// Remaining capacity.
        available: u64,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The handle points to memory that was released.
    #[error("Couldn't find resource {id} for that handle\n{backtrace}")]
    InvalidHandle {
        /// The missing storage id.
        id: StorageId,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// A read or write outside of the allocation.
    #[error("Access of {len} bytes at offset {offset} exceeds buffer size {size}\n{backtrace}")]
    OutOfBounds {
        /// Access start.
        offset: u64,
        /// Access length.
        len: u64,
        /// Allocation size.
        size: u64,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The stream worker isn't running anymore.
    #[error("The stream was closed\n{backtrace}")]
    StreamClosed {
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl core::fmt::Debug for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Kernel launch errors, raised synchronously when enqueuing work.
#[derive(Error, Clone)]
pub enum LaunchError {
    /// The server is out of memory.
    #[error(
        "An out-of-memory error happened during launch\nCaused by:\n  {reason}\nBacktrace\n{backtrace}"
    )]
    OutOfMemory {
        /// The cause of the memory error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// The kernel arguments are invalid for the device.
    #[error("The kernel {kernel} can't be launched\nCaused by:\n  {reason}\nBacktrace\n{backtrace}")]
    InvalidArguments {
        /// The kernel name.
        kernel: String,
        /// Why the arguments are invalid.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// Can't launch because of an IO Error.
    #[error("An io error happened during launch\nCaused by:\n  {0}")]
    IoError(#[from] IoError),
}

impl core::fmt::Debug for LaunchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}

/// Error that can happen asynchronously while executing enqueued kernels.
///
/// These errors are reported by the next [sync](crate::client::ComputeClient::sync).
#[derive(Error, Clone)]
pub enum ServerError {
    /// A kernel failed during execution.
    #[error("An error happened during execution of {kernel}\nCaused by:\n  {reason}\nBacktrace:\n{backtrace}")]
    Execution {
        /// The kernel that failed.
        kernel: String,
        /// The details of the error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },

    /// A launch error.
    #[error("A launch error happened\nCaused by:\n  {0}")]
    Launch(#[from] LaunchError),

    /// A memory error.
    #[error("An io error happened during execution\nCaused by:\n  {0}")]
    Io(#[from] IoError),

    /// The server is in an invalid state.
    #[error("The server is in an invalid state\nCaused by:\n  {reason}")]
    ServerUnhealthy {
        /// The details of the error.
        reason: String,
        /// The backtrace for this error.
        backtrace: BackTrace,
    },
}

impl ServerError {
    /// Create an execution error for the given kernel.
    pub fn execution(kernel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            kernel: kernel.into(),
            reason: reason.into(),
            backtrace: BackTrace::capture(),
        }
    }
}

impl core::fmt::Debug for ServerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{self}"))
    }
}
