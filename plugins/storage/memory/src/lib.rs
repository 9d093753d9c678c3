use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use avrosink_api::{FileStatus, SinkError, StorageClient, StreamHandle};

// ═══════════════════════════════════════════════════════════════
//  MemoryStorage
// ═══════════════════════════════════════════════════════════════

/// One stored file. Readers only see `data[..visible]`, which moves
/// forward on `force_durable` and `close`, the same way a distributed
/// filesystem only exposes bytes after an hsync.
#[derive(Default)]
struct MemFile {
    data: Vec<u8>,
    visible: usize,
    open: bool,
}

#[derive(Default)]
struct State {
    files: BTreeMap<PathBuf, MemFile>,
    streams: HashMap<u64, PathBuf>,
    next_handle: u64,
    /// Operations that fail until `set_failing(false)`.
    failing_ops: HashSet<&'static str>,
}

/// In-memory storage. Stands in for the distributed filesystem in tests
/// and dry runs.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    failing: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent mutating call fail with a storage error.
    /// `false` also clears failures set with [`Self::fail_operation`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
        if !failing {
            self.lock().failing_ops.clear();
        }
    }

    /// Make one operation (`"create"`, `"write"`, `"force_durable"`,
    /// `"close"` or `"rename"`) fail from now on.
    pub fn fail_operation(&self, op: &'static str) {
        self.lock().failing_ops.insert(op);
    }

    /// Total bytes written to `path`, including bytes not yet visible.
    pub fn written_len(&self, path: &Path) -> Option<u64> {
        self.lock().files.get(path).map(|f| f.data.len() as u64)
    }

    /// Whether `path` still has an open writer.
    pub fn is_open(&self, path: &Path) -> bool {
        self.lock().files.get(path).is_some_and(|f| f.open)
    }

    /// Every stored path, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory storage lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn check_failing(&self, op: &str) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) || self.lock().failing_ops.contains(op) {
            return Err(SinkError::storage(format!("{op}: injected failure")));
        }
        Ok(())
    }
}

fn stream_file<'a>(state: &'a mut State, handle: StreamHandle) -> Result<&'a mut MemFile, SinkError> {
    let path = state
        .streams
        .get(&handle.id())
        .ok_or_else(|| SinkError::not_found(format!("unknown stream handle {}", handle.id())))?;
    state
        .files
        .get_mut(path)
        .ok_or_else(|| SinkError::not_found(format!("file {} vanished", path.display())))
}

impl StorageClient for MemoryStorage {
    fn create(&self, path: &Path) -> Result<StreamHandle, SinkError> {
        self.check_failing("create")?;
        let mut state = self.lock();
        if state.files.contains_key(path) {
            return Err(SinkError::already_exists(format!("{} already exists", path.display())));
        }

        state.next_handle += 1;
        let id = state.next_handle;
        state.files.insert(
            path.to_path_buf(),
            MemFile { open: true, ..MemFile::default() },
        );
        state.streams.insert(id, path.to_path_buf());
        Ok(StreamHandle::new(id))
    }

    fn write(&self, handle: StreamHandle, bytes: &[u8]) -> Result<(), SinkError> {
        self.check_failing("write")?;
        let mut state = self.lock();
        stream_file(&mut state, handle)?.data.extend_from_slice(bytes);
        Ok(())
    }

    fn force_durable(&self, handle: StreamHandle) -> Result<(), SinkError> {
        self.check_failing("force_durable")?;
        let mut state = self.lock();
        let file = stream_file(&mut state, handle)?;
        file.visible = file.data.len();
        Ok(())
    }

    fn close(&self, handle: StreamHandle) -> Result<(), SinkError> {
        self.check_failing("close")?;
        let mut state = self.lock();
        let file = stream_file(&mut state, handle)?;
        file.visible = file.data.len();
        file.open = false;
        state.streams.remove(&handle.id());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), SinkError> {
        self.check_failing("rename")?;
        let mut state = self.lock();
        if state.files.contains_key(to) {
            return Err(SinkError::already_exists(format!("{} already exists", to.display())));
        }
        match state.files.get(from) {
            None => return Err(SinkError::not_found(format!("{} not found", from.display()))),
            Some(file) if file.open => {
                return Err(SinkError::storage(format!("{} is still open", from.display())));
            }
            Some(_) => {}
        }
        if let Some(file) = state.files.remove(from) {
            state.files.insert(to.to_path_buf(), file);
        }
        Ok(())
    }

    fn list(&self, dir: &Path) -> Result<Vec<FileStatus>, SinkError> {
        let state = self.lock();
        Ok(state
            .files
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, file)| FileStatus {
                path: path.clone(),
                len: file.visible as u64,
            })
            .collect())
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>, SinkError> {
        let state = self.lock();
        let file = state
            .files
            .get(path)
            .ok_or_else(|| SinkError::not_found(format!("{} not found", path.display())))?;
        Ok(Box::new(Cursor::new(file.data[..file.visible].to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use avrosink_api::ErrorKind;

    use super::*;

    fn read_all(storage: &MemoryStorage, path: &Path) -> Vec<u8> {
        let mut buf = Vec::new();
        storage.open(path).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn bytes_become_visible_on_force_durable() {
        let storage = MemoryStorage::new();
        let path = Path::new("/out/a.avro");
        let handle = storage.create(path).unwrap();

        storage.write(handle, b"hello").unwrap();
        assert!(read_all(&storage, path).is_empty());
        assert_eq!(storage.written_len(path), Some(5));

        storage.force_durable(handle).unwrap();
        assert_eq!(read_all(&storage, path), b"hello");

        storage.write(handle, b" world").unwrap();
        storage.close(handle).unwrap();
        assert_eq!(read_all(&storage, path), b"hello world");
        assert!(!storage.is_open(path));
    }

    #[test]
    fn create_refuses_existing_paths() {
        let storage = MemoryStorage::new();
        let path = Path::new("/out/a.avro");
        storage.create(path).unwrap();
        let err = storage.create(path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn closed_handles_are_rejected() {
        let storage = MemoryStorage::new();
        let handle = storage.create(Path::new("/out/a.avro")).unwrap();
        storage.close(handle).unwrap();
        assert_eq!(storage.write(handle, b"x").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn list_reports_visible_lengths_per_directory() {
        let storage = MemoryStorage::new();
        let a = storage.create(Path::new("/out/a.avro")).unwrap();
        let b = storage.create(Path::new("/out/b.avro")).unwrap();
        storage.create(Path::new("/elsewhere/c.avro")).unwrap();

        storage.write(a, b"abc").unwrap();
        storage.close(a).unwrap();
        storage.write(b, b"unsynced").unwrap();

        let listed = storage.list(Path::new("/out")).unwrap();
        assert_eq!(
            listed,
            vec![
                FileStatus { path: PathBuf::from("/out/a.avro"), len: 3 },
                FileStatus { path: PathBuf::from("/out/b.avro"), len: 0 },
            ]
        );
    }

    #[test]
    fn rename_moves_closed_files_only() {
        let storage = MemoryStorage::new();
        let from = Path::new("/out/a.avro");
        let to = Path::new("/done/a.avro");
        let handle = storage.create(from).unwrap();

        assert_eq!(storage.rename(from, to).unwrap_err().kind(), ErrorKind::Storage);

        storage.close(handle).unwrap();
        storage.rename(from, to).unwrap();
        assert_eq!(storage.paths(), vec![PathBuf::from("/done/a.avro")]);
    }

    #[test]
    fn injected_failures_surface_as_storage_errors() {
        let storage = MemoryStorage::new();
        let handle = storage.create(Path::new("/out/a.avro")).unwrap();
        storage.set_failing(true);
        assert_eq!(storage.write(handle, b"x").unwrap_err().kind(), ErrorKind::Storage);
        storage.set_failing(false);
        storage.write(handle, b"x").unwrap();
    }

    #[test]
    fn single_operation_failures() {
        let storage = MemoryStorage::new();
        let handle = storage.create(Path::new("/out/a.avro")).unwrap();
        storage.fail_operation("close");

        storage.write(handle, b"x").unwrap();
        storage.force_durable(handle).unwrap();
        assert_eq!(storage.close(handle).unwrap_err().kind(), ErrorKind::Storage);

        storage.set_failing(false);
        storage.close(handle).unwrap();
    }
}
