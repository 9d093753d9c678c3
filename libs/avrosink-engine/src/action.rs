use std::path::{Path, PathBuf};

use avrosink_api::{SinkError, StorageClient};

/// Runs against a file right after it has been finalized.
pub trait RotationAction: Send + Sync {
    fn execute(&self, storage: &dyn StorageClient, path: &Path) -> Result<(), SinkError>;
}

/// Move the finalized file into another directory, keeping its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveFileAction {
    destination: PathBuf,
}

impl MoveFileAction {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

impl RotationAction for MoveFileAction {
    fn execute(&self, storage: &dyn StorageClient, path: &Path) -> Result<(), SinkError> {
        let name = path
            .file_name()
            .ok_or_else(|| SinkError::storage(format!("{} has no file name", path.display())))?;
        let target = self.destination.join(name);
        storage.rename(path, &target)?;
        tracing::info!(from = %path.display(), to = %target.display(), "moved finalized file");
        Ok(())
    }
}
