mod config;
mod storage;

pub use config::{Durability, FileStorageConfig};
pub use storage::FileStorage;
