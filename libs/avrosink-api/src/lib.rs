pub mod error;
pub mod storage;

pub use error::{ErrorKind, SinkError};
pub use storage::{FileStatus, StorageClient, StorageWriter, StreamHandle};
