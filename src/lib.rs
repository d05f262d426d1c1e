//! Bundle a file tree into one text artifact an LLM can read, and extract
//! file operations back out of a (possibly messy) LLM reply in the same
//! format, optionally replaying line-level delta commands against a
//! reference bundle.

pub mod bundle_format;
pub mod codec;
pub mod delta;
pub mod directive;
pub mod error;
pub mod marker;
pub mod parser;
pub mod resolve;
pub mod sanitize;
pub mod writer;

pub use bundle_format::{
    BundleFile, BundleHeader, BundleKind, BundleOptions, DeltaCommand, Encoding, FileBlockResult,
    ForceEncoding, ParseOptions, ParsedBundle, Payload,
};
pub use delta::{apply_commands, PatchOutcome, SkippedCommand};
pub use error::{CodecError, DeltaError, FileError, PathRejected};
pub use parser::parse_bundle;
pub use resolve::{resolve_deltas, ReferenceIndex};
pub use sanitize::sanitize_path;
pub use writer::{check_bundle_path, create_bundle};
