use avrosink_api::SinkError;

/// Decides when the open file must be finalized and a new one started.
///
/// Evaluated after every successful append with the bytes written to the
/// current file so far.
pub trait RotationPolicy: Send + Sync {
    fn should_rotate(&self, bytes_written: u64) -> bool;
}

/// Size unit of a rotation threshold. Binary multiples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    #[serde(alias = "b")]
    Bytes,
    Kb,
    #[default]
    Mb,
    Gb,
    Tb,
}

impl SizeUnit {
    pub fn byte_count(self) -> u64 {
        match self {
            SizeUnit::Bytes => 1,
            SizeUnit::Kb => 1 << 10,
            SizeUnit::Mb => 1 << 20,
            SizeUnit::Gb => 1 << 30,
            SizeUnit::Tb => 1 << 40,
        }
    }
}

/// Rotate once the current file holds at least `max_bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSizeRotationPolicy {
    max_bytes: u64,
}

impl FileSizeRotationPolicy {
    /// Threshold of `count` × `unit`. Fractional counts are allowed
    /// (`0.5 MB`); the product is truncated to whole bytes.
    pub fn new(count: f64, unit: SizeUnit) -> Result<Self, SinkError> {
        if !count.is_finite() || count <= 0.0 {
            return Err(SinkError::config(format!(
                "rotation size must be a positive number, got {count}"
            )));
        }
        Ok(Self {
            max_bytes: (count * unit.byte_count() as f64) as u64,
        })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl RotationPolicy for FileSizeRotationPolicy {
    fn should_rotate(&self, bytes_written: u64) -> bool {
        bytes_written >= self.max_bytes
    }
}

/// Never rotate; the single file is finalized at shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRotationPolicy;

impl RotationPolicy for NoRotationPolicy {
    fn should_rotate(&self, _bytes_written: u64) -> bool {
        false
    }
}
