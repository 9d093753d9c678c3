use avrosink_engine::config::{ConfigParser, SinkConfig};
use avrosink_engine::error::EngineError;

/// HCL configuration syntax. Blocks map one-to-one onto the TOML tables.
///
/// ```text
/// output {
///   path        = "/data/out"
///   instance_id = "worker-1"
/// }
/// schema {
///   path = "/etc/avrosink/user.avsc"
/// }
/// ```
pub struct HclParser;

impl ConfigParser for HclParser {
    fn extensions(&self) -> &[&str] {
        &["hcl"]
    }

    fn parse(&self, content: &str) -> Result<SinkConfig, EngineError> {
        hcl::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }
}
