use std::path::{Path, PathBuf};

/// Derives the output path of each rotated file.
///
/// Implementations must be pure: the same rotation index always maps to the
/// same path, distinct indices map to distinct paths, and paths of
/// instances with distinct identifiers never overlap.
pub trait FileNameFormat: Send + Sync {
    /// Path of the file with the given rotation index.
    fn next_path(&self, rotation: u64) -> PathBuf;

    /// Directory every produced path lives in.
    fn directory(&self) -> &Path;
}

/// `{dir}/{prefix}{instance_id}-{rotation}{extension}`
///
/// The rotation index is the only all-digit component after the last `-`,
/// so two instance identifiers can only produce the same name if they are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultFileNameFormat {
    dir: PathBuf,
    prefix: String,
    instance_id: String,
    extension: String,
}

impl DefaultFileNameFormat {
    pub fn new(dir: impl Into<PathBuf>, instance_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: String::new(),
            instance_id: instance_id.into(),
            extension: ".avro".to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// File name (no directory) for a rotation index.
    pub fn file_name(&self, rotation: u64) -> String {
        format!("{}{}-{}{}", self.prefix, self.instance_id, rotation, self.extension)
    }
}

impl FileNameFormat for DefaultFileNameFormat {
    fn next_path(&self, rotation: u64) -> PathBuf {
        self.dir.join(self.file_name(rotation))
    }

    fn directory(&self) -> &Path {
        &self.dir
    }
}
