use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use avrosink_api::{SinkError, StorageClient};
use avrosink_avro::{ContainerCodec, SchemaDescriptor};
use avrosink_storage_file::{FileStorage, FileStorageConfig};
use avrosink_storage_memory::MemoryStorage;

use crate::action::MoveFileAction;
use crate::config::{RotationKind, SinkConfig, StorageConfig, StorageKind};
use crate::engine::{FileLifecycleEngine, LifecyclePolicies};
use crate::error::EngineError;
use crate::naming::DefaultFileNameFormat;
use crate::rotation::{FileSizeRotationPolicy, NoRotationPolicy};
use crate::sync::CountSyncPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationSettings {
    Size(FileSizeRotationPolicy),
    Never,
}

/// A validated [`SinkConfig`]: schema parsed, policies constructed.
///
/// Owns the schema every engine built from it borrows.
#[derive(Debug)]
pub struct SinkSettings {
    pub schema: SchemaDescriptor,
    pub codec: ContainerCodec,
    pub naming: DefaultFileNameFormat,
    pub rotation: RotationSettings,
    pub sync: CountSyncPolicy,
    pub move_to: Option<PathBuf>,
    pub storage: StorageConfig,
}

impl SinkSettings {
    /// Validate a configuration, stamping `unique_per_start` identifiers
    /// with the current time.
    pub fn from_config(config: &SinkConfig) -> Result<Self, EngineError> {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self::from_config_at(config, started_at)
    }

    /// Validate a configuration with an explicit startup stamp in
    /// milliseconds since the epoch.
    pub fn from_config_at(config: &SinkConfig, started_at_ms: u128) -> Result<Self, EngineError> {
        let output = &config.output;
        if output.path.as_os_str().is_empty() {
            return Err(SinkError::config("output.path must not be empty").into());
        }
        if output.instance_id.is_empty() {
            return Err(SinkError::config("output.instance_id must not be empty").into());
        }
        if output.instance_id.contains(['/', '\\']) {
            return Err(SinkError::config(format!(
                "output.instance_id '{}' must not contain path separators",
                output.instance_id
            ))
            .into());
        }

        let schema = match (&config.schema.inline, &config.schema.path) {
            (Some(inline), None) => SchemaDescriptor::parse(inline)?,
            (None, Some(path)) => SchemaDescriptor::from_file(path)?,
            (Some(_), Some(_)) => {
                return Err(
                    SinkError::schema("schema.inline and schema.path are mutually exclusive")
                        .into(),
                );
            }
            (None, None) => {
                return Err(SinkError::schema("one of schema.inline or schema.path is required").into());
            }
        };

        let instance_id = if output.unique_per_start {
            format!("{}-{started_at_ms}", output.instance_id)
        } else {
            output.instance_id.clone()
        };
        let naming = DefaultFileNameFormat::new(&output.path, instance_id)
            .with_prefix(&output.prefix)
            .with_extension(&output.extension);

        let rotation = match config.rotation.policy {
            RotationKind::Size => RotationSettings::Size(
                FileSizeRotationPolicy::new(config.rotation.size, config.rotation.unit)
                    .map_err(|e| e.with_context("rotation"))?,
            ),
            RotationKind::None => RotationSettings::Never,
        };
        let sync = CountSyncPolicy::new(config.sync.count).map_err(|e| e.with_context("sync"))?;

        tracing::debug!(
            schema = %schema.name(),
            instance = %naming.instance_id(),
            rotation = ?rotation,
            sync = sync.count(),
            "validated config"
        );

        Ok(Self {
            schema,
            codec: config.schema.codec,
            naming,
            rotation,
            sync,
            move_to: config.rotation.move_to.clone(),
            storage: config.storage.clone(),
        })
    }

    /// Fresh policy objects for one engine.
    pub fn policies(&self) -> LifecyclePolicies {
        let policies = match self.rotation {
            RotationSettings::Size(size) => {
                LifecyclePolicies::new(self.naming.clone(), size, self.sync)
            }
            RotationSettings::Never => {
                LifecyclePolicies::new(self.naming.clone(), NoRotationPolicy, self.sync)
            }
        }
        .with_codec(self.codec);

        match &self.move_to {
            Some(dir) => policies.with_action(MoveFileAction::new(dir)),
            None => policies,
        }
    }

    pub fn build_engine(&self, storage: Arc<dyn StorageClient>) -> FileLifecycleEngine<'_> {
        FileLifecycleEngine::new(&self.schema, storage, self.policies())
    }
}

impl SinkConfig {
    /// Parse the schema and construct every policy, failing fast.
    pub fn validate(&self) -> Result<SinkSettings, EngineError> {
        SinkSettings::from_config(self)
    }
}

/// Construct the storage backend a configuration names.
pub fn open_storage(config: &StorageConfig) -> Arc<dyn StorageClient> {
    match config.kind {
        StorageKind::File => {
            tracing::info!(durability = ?config.durability, "using file storage");
            Arc::new(FileStorage::new(FileStorageConfig {
                durability: config.durability,
            }))
        }
        StorageKind::Memory => {
            tracing::info!("using in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use avrosink_api::ErrorKind;

    use super::*;
    use crate::naming::FileNameFormat;

    fn config(body: &str) -> SinkConfig {
        SinkConfig::parse(body).unwrap()
    }

    const SCHEMA: &str = r#"inline = '{"type":"record","name":"r","fields":[{"name":"a","type":"int"}]}'"#;

    #[test]
    fn validates_minimal_config() {
        let settings = SinkSettings::from_config(&config(&format!(
            "[output]\npath = \"/out\"\ninstance_id = \"i\"\nunique_per_start = false\n[schema]\n{SCHEMA}"
        )))
        .unwrap();
        assert_eq!(settings.naming.next_path(0), Path::new("/out/i-0.avro"));
        assert!(matches!(settings.rotation, RotationSettings::Size(p) if p.max_bytes() == 128 << 20));
        assert_eq!(settings.sync.count(), 1);
    }

    #[test]
    fn unique_per_start_stamps_instance() {
        let settings = SinkSettings::from_config_at(
            &config(&format!("[output]\npath = \"/out\"\ninstance_id = \"i\"\n[schema]\n{SCHEMA}")),
            1700000000123,
        )
        .unwrap();
        assert_eq!(settings.naming.next_path(2), Path::new("/out/i-1700000000123-2.avro"));
    }

    #[test]
    fn schema_source_must_be_unique() {
        let both = config(
            "[output]\npath = \"/out\"\ninstance_id = \"i\"\n[schema]\ninline = \"{}\"\npath = \"/x.avsc\"",
        );
        let neither = config("[output]\npath = \"/out\"\ninstance_id = \"i\"\n[schema]\n");
        for cfg in [both, neither] {
            let err = SinkSettings::from_config(&cfg).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Schema);
        }
    }

    #[test]
    fn rejects_invalid_policies() {
        let bad = [
            "[rotation]\nsize = 0.0",
            "[rotation]\nsize = -3.0",
            "[sync]\ncount = 0",
        ];
        for extra in bad {
            let cfg = config(&format!(
                "[output]\npath = \"/out\"\ninstance_id = \"i\"\n[schema]\n{SCHEMA}\n{extra}"
            ));
            let err = SinkSettings::from_config(&cfg).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{extra}");
        }
    }

    #[test]
    fn rejects_bad_instance_ids() {
        for id in ["", "a/b"] {
            let cfg = config(&format!(
                "[output]\npath = \"/out\"\ninstance_id = \"{id}\"\n[schema]\n{SCHEMA}"
            ));
            let err = SinkSettings::from_config(&cfg).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{id}");
        }
    }

    #[test]
    fn move_to_adds_action() {
        let settings = SinkSettings::from_config(&config(&format!(
            "[output]\npath = \"/out\"\ninstance_id = \"i\"\n[schema]\n{SCHEMA}\n[rotation]\nmove_to = \"/done\""
        )))
        .unwrap();
        assert_eq!(settings.policies().actions.len(), 1);
    }
}
