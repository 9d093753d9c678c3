pub mod action;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod naming;
pub mod rotation;
pub mod sync;

pub use bootstrap::{SinkSettings, open_storage};
pub use config::{ConfigParser, SinkConfig, TomlParser};
pub use engine::{EngineState, FileLifecycleEngine, LifecyclePolicies, RecordOutcome};
pub use error::EngineError;
