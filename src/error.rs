//! Centralized error types for eml2html.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the eml2html library.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified input file does not exist.
    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    /// The message envelope could not be parsed as an email.
    #[error("Cannot parse email: {0}")]
    ParseMail(PathBuf),

    /// An output directory could not be created.
    #[error("Cannot create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The HTML document could not be rewritten or serialized.
    #[error("Cannot rewrite HTML: {0}")]
    Rewrite(String),

    /// The HTTP client could not be constructed.
    #[error("Cannot build HTTP client: {0}")]
    HttpClient(String),

    /// The final document could not be written to disk.
    #[error("Cannot write output '{path}': {source}")]
    WriteOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Fatal errors leave nothing for later inputs to recover from: missing
    /// output directories, a document that cannot be rewritten or
    /// serialized, an output file that cannot be written. Per-message errors
    /// (unreadable or unparsable input) terminate only that message's
    /// conversion; whether the run continues is the caller's policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CreateDir { .. }
                | Self::Rewrite(_)
                | Self::HttpClient(_)
                | Self::WriteOutput { .. }
        )
    }
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Allow `?` on `std::io::Error` inside functions returning `ConvertError`
/// when no path context is available (rare — prefer `ConvertError::io`).
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
