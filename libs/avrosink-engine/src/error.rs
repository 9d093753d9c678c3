use avrosink_api::{ErrorKind, SinkError};

/// Errors raised while loading configuration and bootstrapping a sink.
///
/// Record-path failures stay [`SinkError`]s; they only pass through here
/// when validation constructs a policy or parses the schema.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Unreadable or syntactically invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl EngineError {
    /// Prefix the message with `ctx`, keeping the error kind.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Sink(e) => EngineError::Sink(e.with_context(ctx)),
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
        }
    }

    /// Syntax errors report [`ErrorKind::Config`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Sink(e) => e.kind(),
            EngineError::Config(_) => ErrorKind::Config,
        }
    }
}
