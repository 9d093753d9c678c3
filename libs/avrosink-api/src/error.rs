use std::fmt;

/// Error kind for sink errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration value.
    Config,
    /// Malformed or absent schema.
    Schema,
    /// A record does not conform to the bound schema.
    Encoding,
    /// The storage backend failed an operation.
    Storage,
    /// `create` hit a path that already exists.
    AlreadyExists,
    /// The requested path or handle does not exist.
    NotFound,
    /// The file name format produced a path that is already taken.
    NamingCollision,
    /// The engine or stream was already closed.
    Closed,
}

/// Error returned by storage clients, encoders and the lifecycle engine.
#[derive(Debug)]
pub struct SinkError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SinkError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Schema, message: msg.into() }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Encoding, message: msg.into() }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Storage, message: msg.into() }
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::AlreadyExists, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::NotFound, message: msg.into() }
    }

    pub fn naming_collision(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::NamingCollision, message: msg.into() }
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Closed, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the error must halt the sink instance.
    ///
    /// Only per-record encoding failures are recoverable; everything else
    /// leaves the instance's counters and the backend's view of the file
    /// possibly diverged.
    pub fn is_fatal(&self) -> bool {
        self.kind != ErrorKind::Encoding
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SinkError {}

// ---------------------------------------------------------------------------
// From impls: io errors → SinkError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::AlreadyExists => Self::already_exists(e.to_string()),
            std::io::ErrorKind::NotFound => Self::not_found(e.to_string()),
            _ => Self::storage(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_keep_their_meaning() {
        let exists = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "taken");
        assert_eq!(SinkError::from(exists).kind(), ErrorKind::AlreadyExists);

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(SinkError::from(missing).kind(), ErrorKind::NotFound);

        let other = std::io::Error::other("disk on fire");
        assert_eq!(SinkError::from(other).kind(), ErrorKind::Storage);
    }

    #[test]
    fn only_encoding_errors_are_recoverable() {
        assert!(!SinkError::encoding("bad field").is_fatal());
        assert!(SinkError::storage("hsync failed").is_fatal());
        assert!(SinkError::naming_collision("/out/a-0.avro").is_fatal());
        assert!(SinkError::schema("not json").is_fatal());
    }

    #[test]
    fn context_is_prepended() {
        let err = SinkError::storage("write failed").with_context("file '/out/a-0.avro'");
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.message, "file '/out/a-0.avro': write failed");
        assert_eq!(err.to_string(), "Storage: file '/out/a-0.avro': write failed");
    }
}
