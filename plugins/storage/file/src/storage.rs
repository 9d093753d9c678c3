use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use avrosink_api::{FileStatus, SinkError, StorageClient, StreamHandle};

use super::config::{Durability, FileStorageConfig};

// ════════════════════════════════════════════════════════════════
//  FileStorage
// ════════════════════════════════════════════════════════════════

struct OpenStream {
    path: PathBuf,
    file: File,
}

/// Local filesystem storage client.
///
/// Writes go straight to the file descriptor, so an independent reader sees
/// them as soon as `write` returns; `force_durable` additionally syncs when
/// configured with [`Durability::Sync`].
pub struct FileStorage {
    durability: Durability,
    streams: Mutex<HashMap<u64, OpenStream>>,
    next_handle: AtomicU64,
}

impl FileStorage {
    pub fn new(config: FileStorageConfig) -> Self {
        Self {
            durability: config.durability,
            streams: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, OpenStream>> {
        match self.streams.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("file storage lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn with_stream<T>(
        &self,
        handle: StreamHandle,
        f: impl FnOnce(&mut OpenStream) -> Result<T, SinkError>,
    ) -> Result<T, SinkError> {
        let mut streams = self.lock();
        let stream = streams
            .get_mut(&handle.id())
            .ok_or_else(|| SinkError::not_found(format!("unknown stream handle {}", handle.id())))?;
        f(stream)
    }
}

impl StorageClient for FileStorage {
    fn create(&self, path: &Path) -> Result<StreamHandle, SinkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SinkError::storage(format!("mkdir {}: {e}", parent.display())))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| SinkError::from(e).with_context(format!("create {}", path.display())))?;

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            OpenStream {
                path: path.to_path_buf(),
                file,
            },
        );
        tracing::debug!(path = %path.display(), handle = id, "created file");
        Ok(StreamHandle::new(id))
    }

    fn write(&self, handle: StreamHandle, bytes: &[u8]) -> Result<(), SinkError> {
        self.with_stream(handle, |s| {
            s.file
                .write_all(bytes)
                .map_err(|e| SinkError::storage(format!("write {}: {e}", s.path.display())))
        })
    }

    fn force_durable(&self, handle: StreamHandle) -> Result<(), SinkError> {
        let durability = self.durability;
        self.with_stream(handle, |s| {
            s.file
                .flush()
                .map_err(|e| SinkError::storage(format!("flush {}: {e}", s.path.display())))?;
            if durability == Durability::Sync {
                s.file
                    .sync_data()
                    .map_err(|e| SinkError::storage(format!("sync {}: {e}", s.path.display())))?;
            }
            Ok(())
        })
    }

    fn close(&self, handle: StreamHandle) -> Result<(), SinkError> {
        let stream = self
            .lock()
            .remove(&handle.id())
            .ok_or_else(|| SinkError::not_found(format!("unknown stream handle {}", handle.id())))?;
        stream
            .file
            .sync_all()
            .map_err(|e| SinkError::storage(format!("close {}: {e}", stream.path.display())))?;
        tracing::debug!(path = %stream.path.display(), "closed file");
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), SinkError> {
        if to.exists() {
            return Err(SinkError::already_exists(format!("{} already exists", to.display())));
        }
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SinkError::storage(format!("mkdir {}: {e}", parent.display())))?;
        }
        std::fs::rename(from, to).map_err(|e| {
            SinkError::from(e).with_context(format!("rename {} -> {}", from.display(), to.display()))
        })
    }

    fn list(&self, dir: &Path) -> Result<Vec<FileStatus>, SinkError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SinkError::storage(format!("list {}: {e}", dir.display()))),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SinkError::storage(format!("list {}: {e}", dir.display())))?;
            let meta = entry
                .metadata()
                .map_err(|e| SinkError::storage(format!("stat {}: {e}", entry.path().display())))?;
            if !meta.is_file() {
                continue;
            }
            files.push(FileStatus {
                path: entry.path(),
                len: meta.len(),
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, SinkError> {
        let file = File::open(path)
            .map_err(|e| SinkError::from(e).with_context(format!("open {}", path.display())))?;
        Ok(Box::new(std::io::BufReader::new(file)))
    }
}
