use avrosink_api::SinkError;

/// Decides when the open file must be made visible/durable.
///
/// Evaluated after every successful append, before the rotation check.
pub trait SyncPolicy: Send + Sync {
    fn should_sync(&self, records_since_sync: u64) -> bool;

    /// Called right after a sync went through.
    fn reset(&mut self) {}
}

/// Sync after every `count` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountSyncPolicy {
    count: u64,
}

impl CountSyncPolicy {
    pub fn new(count: u64) -> Result<Self, SinkError> {
        if count == 0 {
            return Err(SinkError::config("sync count must be at least 1"));
        }
        Ok(Self { count })
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for CountSyncPolicy {
    fn default() -> Self {
        Self { count: 1 }
    }
}

impl SyncPolicy for CountSyncPolicy {
    fn should_sync(&self, records_since_sync: u64) -> bool {
        records_since_sync >= self.count
    }
}
