//! Error types for apidiagram.
//!
//! Library crates use [`DiagramError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all apidiagram operations.
#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    /// Inputs or configuration the caller must fix before retrying.
    #[error("config error: {message}")]
    Config { message: String },

    /// The generation step left no diagram-like file behind.
    #[error("no diagram file could be identified in {directory:?} after generation")]
    ArtifactIdentification { directory: PathBuf },

    /// An external process exited unsuccessfully.
    #[error("{program} exited with {status}")]
    ExternalProcess { program: String, status: String },

    /// An external process exceeded its time budget and was killed.
    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    /// An external process could not be started at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// YAML/JSON decoding or encoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error (bad relative path, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Local content server error.
    #[error("content server error: {0}")]
    Server(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The renderer failed on a specific diagram.
    #[error("rendering {diagram:?} failed: {source}")]
    Render {
        diagram: PathBuf,
        source: Box<DiagramError>,
    },

    /// A failure while processing one document.
    #[error("failed to process {document:?} (expected {artifact:?}): {source}")]
    Document {
        document: PathBuf,
        artifact: PathBuf,
        source: Box<DiagramError>,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DiagramError>;

impl DiagramError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the offending document and its expected artifact.
    pub fn in_document(self, document: impl Into<PathBuf>, artifact: impl Into<PathBuf>) -> Self {
        Self::Document {
            document: document.into(),
            artifact: artifact.into(),
            source: Box::new(self),
        }
    }

    /// Attach the diagram the renderer was working on.
    pub fn in_diagram(self, diagram: impl Into<PathBuf>) -> Self {
        Self::Render {
            diagram: diagram.into(),
            source: Box::new(self),
        }
    }

    /// Whether a retry of the same external step could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ExternalProcess { .. } | Self::Timeout { .. })
    }
}
