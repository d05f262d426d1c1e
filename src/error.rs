use std::path::PathBuf;

use thiserror::Error;

use crate::bundle_format::Encoding;

/// Failure to turn a block's text into bytes (or back).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid Base64 payload: {0}")]
    Base64(String),
    #[error("UTF-16LE payload has odd length {0}")]
    OddUtf16Length(usize),
    #[error("invalid UTF-16LE payload: {0}")]
    Utf16(String),
    #[error("content is not valid UTF-8: {0}")]
    Utf8(String),
}

/// Per-file failure reported in a [`crate::FileBlockResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("could not decode {encoding:?} content: {source}")]
    Decode {
        encoding: Encoding,
        #[source]
        source: CodecError,
    },
    #[error("no usable delta directive in block: {0}")]
    InvalidDirective(String),
    #[error("delta target not found in reference bundle")]
    DeltaTargetMissing,
    #[error("reference content is not text: {0}")]
    ReferenceNotText(CodecError),
}

/// Why a single delta command was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    #[error("line numbers are 1-based, got {0}")]
    ZeroLine(usize),
    #[error("inverted range {start}..{end}")]
    InvertedRange { start: usize, end: usize },
    #[error("position {index} outside 0..={len}")]
    OutOfRange { index: usize, len: usize },
    #[error("range of {count} lines from {index} runs past end ({len} lines)")]
    PastEnd { index: usize, count: usize, len: usize },
    #[error("DELETE_FILE cannot be replayed as a line edit")]
    NotALineEdit,
}

/// A destination path that could not be proven to stay under the output root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rejected path {raw:?}: {reason}")]
pub struct PathRejected {
    pub raw: String,
    pub reason: String,
    pub attempted: Option<PathBuf>,
}
