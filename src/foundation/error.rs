/// Convenience result type used across the crate.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Error taxonomy for archive reading, writing and frame access.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    /// A required top-level path is missing; aborts the whole read.
    #[error("structural error: {0}")]
    Structural(String),

    /// Malformed or inconsistent stored data: bad shapes, dangling paths, broken boxes.
    #[error("format error: {0}")]
    Format(String),

    /// Errors when serializing or deserializing JSON records and snapshots.
    #[error("serialization error: {0}")]
    Serde(String),

    /// A frame or sample could not be decoded into pixels.
    #[error("decode error: {0}")]
    Decode(String),

    /// Filesystem errors while opening media or snapshot files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArchiveError {
    /// Build a [`ArchiveError::Structural`] value.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    /// Build a [`ArchiveError::Format`] value.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Build a [`ArchiveError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`ArchiveError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
