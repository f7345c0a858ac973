use std::panic::{AssertUnwindSafe, catch_unwind};

use gemmtune_common::backtrace::BackTrace;

use crate::server::{IoError, Kernel, MemoryUsage, ServerError};
use crate::storage::{ComputeStorage, StorageHandle, StorageId};

type Callback<Response> = async_channel::Sender<Response>;

pub(crate) enum Message {
    Alloc(StorageId, u64, Callback<Result<StorageHandle, IoError>>),
    Write(StorageHandle, u64, Vec<u8>, Callback<Result<(), IoError>>),
    Read(StorageHandle, Callback<Result<Vec<u8>, IoError>>),
    Execute(Box<dyn Kernel>),
    Sync(Callback<Result<(), ServerError>>),
    MemoryUsage(Callback<MemoryUsage>),
    Dealloc(StorageId),
}

impl core::fmt::Debug for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Message::Alloc(id, size, _) => write!(f, "Alloc({id}, {size})"),
            Message::Write(handle, offset, data, _) => {
                write!(f, "Write({}, {offset}, {} bytes)", handle.id, data.len())
            }
            Message::Read(handle, _) => write!(f, "Read({})", handle.id),
            Message::Execute(kernel) => write!(f, "Execute({})", kernel.name()),
            Message::Sync(_) => f.write_str("Sync"),
            Message::MemoryUsage(_) => f.write_str("MemoryUsage"),
            Message::Dealloc(id) => write!(f, "Dealloc({id})"),
        }
    }
}

/// An ordered execution queue served by a dedicated worker thread.
///
/// Everything enqueued on a stream executes in submission order. Kernel failures don't stop
/// the stream; they are recorded and reported by the next [sync](Stream::sync).
#[derive(Debug, Clone)]
pub struct Stream {
    sender: async_channel::Sender<Message>,
}

struct StreamWorker<S: ComputeStorage> {
    storage: S,
    errors: Vec<ServerError>,
}

impl Stream {
    /// Spawn the worker thread owning `storage`.
    pub fn new<S: ComputeStorage + 'static>(name: &str, storage: S) -> std::io::Result<Self> {
        let (sender, receiver) = async_channel::unbounded::<Message>();
        let mut worker = StreamWorker {
            storage,
            errors: Vec::new(),
        };

        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv_blocking() {
                    worker.process(message);
                }
                log::debug!("Stream worker stopped, all senders were dropped");
            })?;

        Ok(Self { sender })
    }

    pub(crate) fn sender(&self) -> async_channel::Sender<Message> {
        self.sender.clone()
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc(&self, size: u64) -> Result<StorageHandle, IoError> {
        self.request(|callback| Message::Alloc(StorageId::new(), size, callback))?
    }

    /// Write `data` at `offset`, ordered after every previously enqueued kernel.
    pub fn write(&self, handle: StorageHandle, offset: u64, data: Vec<u8>) -> Result<(), IoError> {
        self.request(|callback| Message::Write(handle, offset, data, callback))?
    }

    /// Read an allocation once every previously enqueued kernel has executed.
    pub fn read(&self, handle: StorageHandle) -> Result<Vec<u8>, IoError> {
        self.request(|callback| Message::Read(handle, callback))?
    }

    /// Enqueue a kernel without waiting for its completion.
    pub fn execute(&self, kernel: Box<dyn Kernel>) -> Result<(), IoError> {
        self.sender
            .send_blocking(Message::Execute(kernel))
            .map_err(|_| closed())
    }

    /// Wait for all enqueued work and return the first error raised since the last sync.
    pub fn sync(&self) -> Result<(), ServerError> {
        self.request(Message::Sync)?
    }

    /// Memory usage once all enqueued work has executed.
    pub fn memory_usage(&self) -> Result<MemoryUsage, IoError> {
        self.request(Message::MemoryUsage)
    }

    fn request<R>(
        &self,
        message: impl FnOnce(Callback<R>) -> Message,
    ) -> Result<R, IoError> {
        let (callback, response) = async_channel::bounded(1);

        self.sender
            .send_blocking(message(callback))
            .map_err(|_| closed())?;
        response.recv_blocking().map_err(|_| closed())
    }
}

fn closed() -> IoError {
    IoError::StreamClosed {
        backtrace: BackTrace::capture(),
    }
}

impl<S: ComputeStorage> StreamWorker<S> {
    fn process(&mut self, message: Message) {
        // A dropped callback only means the requester gave up waiting.
        match message {
            Message::Alloc(id, size, callback) => {
                let _ = callback.send_blocking(self.storage.alloc(id, size));
            }
            Message::Write(handle, offset, data, callback) => {
                let _ = callback.send_blocking(self.storage.write(&handle, offset, &data));
            }
            Message::Read(handle, callback) => {
                let data = self.storage.read(&handle).map(|data| data.to_vec());
                let _ = callback.send_blocking(data);
            }
            Message::Execute(kernel) => self.execute(kernel),
            Message::Sync(callback) => {
                let result = match self.errors.is_empty() {
                    true => Ok(()),
                    false => Err(self.errors.remove(0)),
                };
                self.errors.clear();
                let _ = callback.send_blocking(result);
            }
            Message::MemoryUsage(callback) => {
                let _ = callback.send_blocking(self.storage.memory_usage());
            }
            Message::Dealloc(id) => self.storage.dealloc(id),
        }
    }

    fn execute(&mut self, kernel: Box<dyn Kernel>) {
        let name = kernel.name();
        let storage = &mut self.storage;

        match catch_unwind(AssertUnwindSafe(move || kernel.execute(storage))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::debug!("Kernel {name} failed: {err}");
                self.errors.push(err);
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|msg| msg.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "kernel panicked".to_string());
                self.errors.push(ServerError::execution(name, reason));
            }
        }
    }
}
