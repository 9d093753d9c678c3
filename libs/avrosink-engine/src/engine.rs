use std::path::{Path, PathBuf};
use std::sync::Arc;

use avrosink_api::{ErrorKind, SinkError, StorageClient};
use avrosink_avro::{ContainerCodec, RecordEncoder, SchemaDescriptor};

use crate::action::RotationAction;
use crate::naming::FileNameFormat;
use crate::rotation::RotationPolicy;
use crate::sync::SyncPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No file open; the next record opens one.
    NoActiveFile,
    Active,
    /// Finalizing the current file. Only observable from inside a rotation.
    Rotating,
    /// Shut down or failed. Rejects every further record.
    Closed,
}

/// The pluggable decisions an engine makes over its lifetime.
pub struct LifecyclePolicies {
    pub naming: Box<dyn FileNameFormat>,
    pub rotation: Box<dyn RotationPolicy>,
    pub sync: Box<dyn SyncPolicy>,
    /// Run in order against every finalized file.
    pub actions: Vec<Box<dyn RotationAction>>,
    pub codec: ContainerCodec,
}

impl LifecyclePolicies {
    pub fn new(
        naming: impl FileNameFormat + 'static,
        rotation: impl RotationPolicy + 'static,
        sync: impl SyncPolicy + 'static,
    ) -> Self {
        Self {
            naming: Box::new(naming),
            rotation: Box::new(rotation),
            sync: Box::new(sync),
            actions: Vec::new(),
            codec: ContainerCodec::default(),
        }
    }

    pub fn with_action(mut self, action: impl RotationAction + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn with_codec(mut self, codec: ContainerCodec) -> Self {
        self.codec = codec;
        self
    }
}

/// What happened to one accepted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Bytes in the file the record landed in, this record included.
    pub bytes_written: u64,
    /// The file was made durable after this record.
    pub synced: bool,
    /// The file was finalized after this record.
    pub rotated: Option<PathBuf>,
}

struct ActiveFile<'s> {
    path: PathBuf,
    encoder: RecordEncoder<'s>,
    bytes_written: u64,
    records_since_sync: u64,
}

// ═══════════════════════════════════════════════════════════════
//  FileLifecycleEngine
// ═══════════════════════════════════════════════════════════════

/// Streams records into a sequence of rotated Avro container files.
///
/// One engine owns one sequence of files; run one engine per instance
/// identifier. Files are opened lazily on the first record after start or
/// after a rotation, so an idle engine never leaves empty files behind.
///
/// Any storage failure is fatal: the open file is abandoned, the engine
/// moves to [`EngineState::Closed`] and every later call fails. A record
/// that does not match the schema is rejected on its own and the engine
/// keeps going.
pub struct FileLifecycleEngine<'s> {
    schema: &'s SchemaDescriptor,
    storage: Arc<dyn StorageClient>,
    policies: LifecyclePolicies,
    state: EngineState,
    rotation: u64,
    active: Option<ActiveFile<'s>>,
}

impl<'s> FileLifecycleEngine<'s> {
    pub fn new(
        schema: &'s SchemaDescriptor,
        storage: Arc<dyn StorageClient>,
        policies: LifecyclePolicies,
    ) -> Self {
        Self {
            schema,
            storage,
            policies,
            state: EngineState::NoActiveFile,
            rotation: 0,
            active: None,
        }
    }

    /// Write one record, then apply the sync and rotation policies.
    pub fn on_record(&mut self, record: &serde_json::Value) -> Result<RecordOutcome, SinkError> {
        if self.state == EngineState::Closed {
            return Err(SinkError::closed("engine is closed"));
        }
        if self.active.is_none() {
            let opened = self.open_next();
            self.absorb(opened)?;
        }

        let appended = match self.active.as_mut() {
            Some(active) => active.encoder.append(record),
            None => Err(SinkError::storage("no active file after open")),
        };
        let size = match appended {
            Ok(size) => size,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(rotation = self.rotation, error = %e, "record rejected");
                return Err(e);
            }
            Err(e) => return Err(self.fail(e)),
        };

        let synced = match self.after_append(size) {
            Ok(synced) => synced,
            Err(e) => return Err(self.fail(e)),
        };
        let bytes_written = self.active.as_ref().map_or(0, |a| a.bytes_written);

        let mut rotated = None;
        if self.policies.rotation.should_rotate(bytes_written) {
            let path = self.rotate();
            rotated = Some(self.absorb(path)?);
        }

        Ok(RecordOutcome {
            bytes_written,
            synced,
            rotated,
        })
    }

    /// Finalize the open file, if any, and close the engine. Idempotent.
    ///
    /// Rotation actions run against the last file too.
    pub fn shutdown(&mut self) -> Result<(), SinkError> {
        if self.state == EngineState::Closed {
            return Ok(());
        }
        let finished = self.finish_active();
        self.state = EngineState::Closed;
        match finished {
            Ok(Some(path)) => {
                tracing::info!(path = %path.display(), files = self.rotation, "engine shut down");
                Ok(())
            }
            Ok(None) => {
                tracing::info!(files = self.rotation, "engine shut down");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Index the next opened file will carry. Equals the number of files
    /// finalized so far.
    pub fn rotation_index(&self) -> u64 {
        self.rotation
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    fn open_next(&mut self) -> Result<(), SinkError> {
        let path = self.policies.naming.next_path(self.rotation);
        let handle = self.storage.create(&path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => SinkError::naming_collision(format!(
                "{} already exists; another instance may share this identifier",
                path.display()
            )),
            _ => e.with_context(path.display()),
        })?;
        let encoder = RecordEncoder::open(
            Arc::clone(&self.storage),
            handle,
            self.schema,
            self.policies.codec,
        )
        .map_err(|e| e.with_context(path.display()))?;

        tracing::info!(path = %path.display(), rotation = self.rotation, "opened file");
        self.active = Some(ActiveFile {
            path,
            encoder,
            bytes_written: 0,
            records_since_sync: 0,
        });
        self.state = EngineState::Active;
        Ok(())
    }

    fn after_append(&mut self, size: u64) -> Result<bool, SinkError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };
        active.bytes_written += size;
        active.records_since_sync += 1;

        if !self.policies.sync.should_sync(active.records_since_sync) {
            return Ok(false);
        }
        active
            .encoder
            .force_durable()
            .map_err(|e| e.with_context(active.path.display()))?;
        tracing::debug!(
            path = %active.path.display(),
            records = active.records_since_sync,
            "synced"
        );
        active.records_since_sync = 0;
        self.policies.sync.reset();
        Ok(true)
    }

    fn rotate(&mut self) -> Result<PathBuf, SinkError> {
        self.state = EngineState::Rotating;
        let path = self
            .finish_active()?
            .ok_or_else(|| SinkError::storage("rotation without an active file"))?;
        self.state = EngineState::NoActiveFile;
        Ok(path)
    }

    /// Finalize the active file, run the rotation actions and advance the
    /// rotation index.
    fn finish_active(&mut self) -> Result<Option<PathBuf>, SinkError> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        let records = active.encoder.records();
        let bytes = active.bytes_written;
        active
            .encoder
            .finalize()
            .map_err(|e| e.with_context(active.path.display()))?;
        tracing::info!(
            path = %active.path.display(),
            records,
            bytes,
            "finalized file"
        );

        self.rotation += 1;
        for action in &self.policies.actions {
            action
                .execute(self.storage.as_ref(), &active.path)
                .map_err(|e| e.with_context(active.path.display()))?;
        }
        self.policies.sync.reset();
        Ok(Some(active.path))
    }

    /// Route a fatal error through [`Self::fail`].
    fn absorb<T>(&mut self, result: Result<T, SinkError>) -> Result<T, SinkError> {
        result.map_err(|e| self.fail(e))
    }

    /// Abandon the open file and close the engine.
    fn fail(&mut self, error: SinkError) -> SinkError {
        let abandoned = self.active.take().map(|a| a.path);
        self.state = EngineState::Closed;
        tracing::error!(
            error = %error,
            abandoned = ?abandoned,
            rotation = self.rotation,
            "engine failed, closing"
        );
        error
    }
}

impl Drop for FileLifecycleEngine<'_> {
    fn drop(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "shutdown on drop failed");
        }
    }
}
