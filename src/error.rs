//! Fatal, user-facing conditions.
//!
//! Internal invariant breaches panic instead; only conditions a caller can
//! cause (bad inputs, unreadable files) travel through `Error`.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no input samples to infer from")]
    NoInput,

    #[error("no files matched pattern {pattern:?}")]
    NoFilesMatched { pattern: String },

    #[error("invalid glob pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("cannot walk files for pattern {pattern:?}")]
    Walk {
        pattern: String,
        #[source]
        source: glob::GlobError,
    },

    #[error("cannot read {}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON", .path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
