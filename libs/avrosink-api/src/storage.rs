use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SinkError;

/// Opaque handle to a stream opened for writing by [`StorageClient::create`].
///
/// Handles are only meaningful to the client that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(u64);

impl StreamHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A file as reported by [`StorageClient::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub path: PathBuf,
    /// Bytes visible to an independent reader right now.
    pub len: u64,
}

/// Storage backend capability used by the sink.
///
/// The engine doesn't know concrete implementations: a distributed
/// filesystem client, the local filesystem and the in-memory fake all look
/// like this trait. Every call is synchronous and may block; a blocked call
/// blocks the record path.
pub trait StorageClient: Send + Sync {
    /// Create a new file for writing. Fails if the path already exists or
    /// its parent is inaccessible.
    fn create(&self, path: &Path) -> Result<StreamHandle, SinkError>;

    /// Append raw bytes to an open stream.
    fn write(&self, handle: StreamHandle, bytes: &[u8]) -> Result<(), SinkError>;

    /// Make every byte written so far visible to independent readers of the
    /// same path. The stream stays open.
    fn force_durable(&self, handle: StreamHandle) -> Result<(), SinkError>;

    /// Finalize the stream. The handle is invalid afterwards.
    fn close(&self, handle: StreamHandle) -> Result<(), SinkError>;

    /// Move a closed file to a new path.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), SinkError>;

    /// Files directly under `dir`, sorted by path.
    fn list(&self, dir: &Path) -> Result<Vec<FileStatus>, SinkError>;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, SinkError>;
}

/// `io::Write` view of one open storage stream.
///
/// Lets byte-oriented encoders write through a [`StorageClient`] without
/// knowing about handles. `flush` is a no-op: durability is requested
/// explicitly through [`StorageClient::force_durable`].
pub struct StorageWriter {
    client: Arc<dyn StorageClient>,
    handle: StreamHandle,
}

impl StorageWriter {
    pub fn new(client: Arc<dyn StorageClient>, handle: StreamHandle) -> Self {
        Self { client, handle }
    }

    /// Close the underlying stream.
    pub fn close(self) -> Result<(), SinkError> {
        self.client.close(self.handle)
    }
}

impl Write for StorageWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.client
            .write(self.handle, buf)
            .map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
