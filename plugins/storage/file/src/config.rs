// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

/// What `force_durable` asks of the local filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Flush user-space buffers only. Bytes become visible to other
    /// readers but may still sit in the page cache.
    Flush,
    /// Flush and `fdatasync` the file.
    #[default]
    Sync,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub durability: Durability,
}
