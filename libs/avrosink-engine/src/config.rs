use std::path::{Path, PathBuf};

use avrosink_avro::ContainerCodec;
use avrosink_storage_file::Durability;
use serde::Deserialize;

use crate::error::EngineError;
use crate::rotation::SizeUnit;

/// Root configuration, parsed from TOML or any registered [`ConfigParser`].
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub output: OutputConfig,
    pub schema: SchemaConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where files go and how they are named.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Target directory.
    pub path: PathBuf,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Identifier unique among concurrently running instances.
    pub instance_id: String,
    /// Fold the startup time into the instance identifier so restarts
    /// never reuse a previous run's names.
    #[serde(default = "default_unique_per_start")]
    pub unique_per_start: bool,
}

fn default_extension() -> String {
    ".avro".to_string()
}

fn default_unique_per_start() -> bool {
    true
}

/// Record schema, inline JSON or a path to a `.avsc` file. Exactly one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub inline: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub codec: ContainerCodec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationKind {
    #[default]
    Size,
    None,
}

/// `size` × `unit` is compared against the uncompressed encoded size of
/// the records in the current file. With `codec = "deflate"` the file on
/// disk ends up smaller than the threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct RotationConfig {
    #[serde(default)]
    pub policy: RotationKind,
    #[serde(default = "default_rotation_size")]
    pub size: f64,
    #[serde(default)]
    pub unit: SizeUnit,
    /// Directory finalized files are moved into.
    #[serde(default)]
    pub move_to: Option<PathBuf>,
}

fn default_rotation_size() -> f64 {
    128.0
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            policy: RotationKind::default(),
            size: default_rotation_size(),
            unit: SizeUnit::default(),
            move_to: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_count")]
    pub count: u64,
}

fn default_sync_count() -> u64 {
    1
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            count: default_sync_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// Only meaningful for `kind = "file"`.
    #[serde(default)]
    pub durability: Durability,
}

// ════════════════════════════════════════════════════════════════
//  Parsers
// ════════════════════════════════════════════════════════════════

/// A configuration syntax, selected by file extension.
pub trait ConfigParser: Send + Sync {
    fn extensions(&self) -> &[&str];
    fn parse(&self, content: &str) -> Result<SinkConfig, EngineError>;
}

pub struct TomlParser;

impl ConfigParser for TomlParser {
    fn extensions(&self) -> &[&str] {
        &["toml"]
    }

    fn parse(&self, content: &str) -> Result<SinkConfig, EngineError> {
        SinkConfig::parse(content)
    }
}

impl SinkConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        Self::load_with(path, &[&TomlParser])
    }

    /// Load configuration, picking the parser by the file's extension.
    pub fn load_with(path: &Path, parsers: &[&dyn ConfigParser]) -> Result<Self, EngineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let parser = parsers
            .iter()
            .find(|p| p.extensions().contains(&ext.as_str()))
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "{}: no parser registered for extension '{ext}'",
                    path.display()
                ))
            })?;

        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        parser
            .parse(&content)
            .map_err(|e| e.with_context(path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))
    }
}
