//! Error types for the tilekit library.

use std::path::PathBuf;
use thiserror::Error;

use crate::graph::PropertyKind;

/// Main error type for tilekit operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of a container
    #[error("Invalid magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: String, actual: String },

    /// Unsupported container version
    #[error("Unsupported {format} version: {version}")]
    UnsupportedVersion { format: &'static str, version: u32 },

    /// Buffer is shorter than its header claims
    #[error("Unexpected end of data: needed {needed} bytes, have {available}")]
    UnexpectedEof { needed: usize, available: usize },

    /// Chunk type differs from the one required at this position
    #[error("Unexpected chunk type: expected {expected:?}, got {actual:?}")]
    UnexpectedChunkType { expected: String, actual: String },

    /// Legacy GLB content format other than JSON
    #[error("Unsupported GLB 1.0 content format: {0}")]
    InvalidContentFormat(u32),

    /// Malformed legacy tile envelope
    #[error("Invalid tile: {0}")]
    InvalidTile(String),

    /// glTF JSON refers to missing or out-of-range data
    #[error("Invalid glTF document: {0}")]
    InvalidDocument(String),

    /// Property kind that cannot be requested as a top-level transfer
    #[error("Property of kind {0:?} cannot be transferred directly")]
    NotTransferable(PropertyKind),

    /// Property exists but has a different kind than required
    #[error("Kind mismatch: expected {expected:?}, got {actual:?}")]
    KindMismatch { expected: PropertyKind, actual: PropertyKind },

    /// Property id does not belong to the document
    #[error("Unknown property id: {0}")]
    UnknownProperty(usize),

    /// Schema, class or property missing where metadata requires it
    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    /// Primitive metadata reference without a canonical counterpart
    #[error("Unmatched {0} reference after reconciliation")]
    UnmatchedReference(&'static str),

    /// External schema could not be resolved
    #[error("Schema resolution failed for {uri:?}: {reason}")]
    SchemaResolution { uri: String, reason: String },

    /// Feature not covered by this implementation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`Error`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed binary container or tile envelope.
    BinaryFormat,
    /// Contract violation in the graph transfer engine.
    GraphTransfer,
    /// Dangling or unmatched metadata reference.
    MetadataConsistency,
    /// Failure of an external schema resolver.
    Resolution,
    /// File system or serialization failure.
    Io,
    Other,
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid tile error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidTile(msg.into())
    }

    /// Create an invalid glTF document error.
    pub fn document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    /// Create a missing metadata error.
    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingMetadata(msg.into())
    }

    pub(crate) fn eof(needed: usize, available: usize) -> Self {
        Self::UnexpectedEof { needed, available }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagic { .. }
            | Self::UnsupportedVersion { .. }
            | Self::UnexpectedEof { .. }
            | Self::UnexpectedChunkType { .. }
            | Self::InvalidContentFormat(_)
            | Self::InvalidTile(_)
            | Self::InvalidDocument(_) => ErrorKind::BinaryFormat,
            Self::NotTransferable(_) | Self::KindMismatch { .. } | Self::UnknownProperty(_) => {
                ErrorKind::GraphTransfer
            }
            Self::MissingMetadata(_) | Self::UnmatchedReference(_) => {
                ErrorKind::MetadataConsistency
            }
            Self::SchemaResolution { .. } => ErrorKind::Resolution,
            Self::FileNotFound(_) | Self::Io(_) | Self::Json(_) | Self::Utf8(_) => ErrorKind::Io,
            Self::Unsupported(_) | Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Result type alias for tilekit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic { expected: "glTF".into(), actual: "b3dm".into() };
        assert!(e.to_string().contains("magic"));

        let e = Error::eof(20, 12);
        assert!(e.to_string().contains("20"));
        assert!(e.to_string().contains("12"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::InvalidContentFormat(1).kind(), ErrorKind::BinaryFormat);
        assert_eq!(
            Error::NotTransferable(PropertyKind::TextureInfo).kind(),
            ErrorKind::GraphTransfer
        );
        assert_eq!(
            Error::UnmatchedReference("property texture").kind(),
            ErrorKind::MetadataConsistency
        );
        assert_eq!(
            Error::SchemaResolution { uri: "a.json".into(), reason: "gone".into() }.kind(),
            ErrorKind::Resolution
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
