use std::collections::HashMap;

use rayon::prelude::*;

use crate::bundle_format::{DeltaCommand, FileBlockResult, ParseOptions, Payload};
use crate::delta;
use crate::error::{CodecError, FileError};
use crate::parser::parse_bundle;

/// Original lines of one reference file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFile {
    pub lines: Vec<String>,
    pub trailing_newline: bool,
}

impl ReferenceFile {
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(bytes).map_err(|e| CodecError::Utf8(e.to_string()))?;
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        let lines = if body.is_empty() && !trailing_newline {
            Vec::new()
        } else {
            body.split('\n').map(str::to_string).collect()
        };
        Ok(ReferenceFile {
            lines,
            trailing_newline,
        })
    }

    fn render(&self, lines: &[String]) -> Vec<u8> {
        let mut text = lines.join("\n");
        if self.trailing_newline && !lines.is_empty() {
            text.push('\n');
        }
        text.into_bytes()
    }
}

/// Path → reference content, built once per extraction run.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    files: HashMap<String, Result<ReferenceFile, CodecError>>,
}

impl ReferenceIndex {
    /// Parse a reference bundle in full-content mode and index its files.
    pub fn build(reference_text: &str) -> Self {
        let parsed = parse_bundle(reference_text, &ParseOptions::default());
        let mut files = HashMap::new();
        for result in parsed.files {
            if let Ok(Payload::FullContent { bytes, .. }) = result.payload {
                files.insert(result.path, ReferenceFile::from_bytes(&bytes));
            }
        }
        log::debug!("reference index holds {} file(s)", files.len());
        ReferenceIndex { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Result<ReferenceFile, CodecError>> {
        self.files.get(path)
    }
}

/// Turn every `DeltaCommands` payload into full content using the reference
/// bundle. Other results pass through untouched; order is preserved.
pub fn resolve_deltas(blocks: Vec<FileBlockResult>, reference_text: &str) -> Vec<FileBlockResult> {
    let index = ReferenceIndex::build(reference_text);
    resolve_with_index(blocks, &index)
}

pub fn resolve_with_index(blocks: Vec<FileBlockResult>, index: &ReferenceIndex) -> Vec<FileBlockResult> {
    blocks
        .into_par_iter()
        .map(|block| resolve_one(block, index))
        .collect()
}

fn resolve_one(mut block: FileBlockResult, index: &ReferenceIndex) -> FileBlockResult {
    if let Ok(Payload::DeltaCommands(commands)) = &block.payload {
        let (payload, warnings) = patch_file(&block.path, commands, index);
        block.payload = payload;
        block.warnings.extend(warnings);
    }
    block
}

fn patch_file(
    path: &str,
    commands: &[DeltaCommand],
    index: &ReferenceIndex,
) -> (Result<Payload, FileError>, Vec<String>) {
    let reference = match index.get(path) {
        None => {
            log::warn!("{path}: no such file in reference bundle");
            return (Err(FileError::DeltaTargetMissing), Vec::new());
        }
        Some(Err(e)) => return (Err(FileError::ReferenceNotText(e.clone())), Vec::new()),
        Some(Ok(reference)) => reference,
    };

    let outcome = delta::apply_commands(&reference.lines, commands);
    let warnings = outcome
        .skipped
        .iter()
        .map(|skipped| {
            log::warn!("{path}: {skipped}");
            skipped.to_string()
        })
        .collect();

    let payload = Payload::FullContent {
        bytes: reference.render(&outcome.lines),
        binary_hint: false,
    };
    (Ok(payload), warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle_format::{BundleFile, BundleOptions};
    use crate::writer::create_bundle;

    fn reference() -> String {
        create_bundle(
            &[
                BundleFile::new("src/app.txt", b"a\nb\nc\nd\ne\n".to_vec()),
                BundleFile::new("notes.txt", b"keep me\n".to_vec()),
            ],
            &BundleOptions {
                delta_reference: true,
                ..Default::default()
            },
        )
    }

    fn delta_parse(text: &str) -> Vec<FileBlockResult> {
        parse_bundle(
            text,
            &ParseOptions {
                apply_delta: true,
                forced_encoding: None,
            },
        )
        .files
    }

    fn content(result: &FileBlockResult) -> String {
        match &result.payload {
            Ok(Payload::FullContent { bytes, .. }) => String::from_utf8(bytes.clone()).unwrap(),
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_applies_commands() {
        let dogs = [
            "🐕 --- DOGS_START_FILE: src/app.txt ---",
            "@@ PAWS_CMD REPLACE_LINES(2,3) @@",
            "X",
            "Y",
            "Z",
            "@@ PAWS_CMD INSERT_AFTER_LINE(5) @@",
            "F",
            "🐕 --- DOGS_END_FILE: src/app.txt ---",
        ]
        .join("\n");

        let resolved = resolve_deltas(delta_parse(&dogs), &reference());
        assert_eq!(resolved.len(), 1);
        assert_eq!(content(&resolved[0]), "a\nX\nY\nZ\nd\ne\nF\n");
        assert!(resolved[0].warnings.is_empty());
    }

    #[test]
    fn test_missing_target_is_per_file() {
        let dogs = [
            "🐕 --- DOGS_START_FILE: ghost.txt ---",
            "@@ PAWS_CMD DELETE_LINES(1,1) @@",
            "🐕 --- DOGS_END_FILE: ghost.txt ---",
            "🐕 --- DOGS_START_FILE: new.txt ---",
            "fresh",
            "🐕 --- DOGS_END_FILE: new.txt ---",
        ]
        .join("\n");

        let resolved = resolve_deltas(delta_parse(&dogs), &reference());
        assert_eq!(resolved[0].payload, Err(FileError::DeltaTargetMissing));
        assert_eq!(content(&resolved[1]), "fresh\n");
    }

    #[test]
    fn test_bad_command_reported_siblings_applied() {
        let dogs = [
            "🐕 --- DOGS_START_FILE: src/app.txt ---",
            "@@ PAWS_CMD DELETE_LINES(4,2) @@",
            "@@ PAWS_CMD REPLACE_LINES(1,1) @@",
            "A",
            "🐕 --- DOGS_END_FILE: src/app.txt ---",
        ]
        .join("\n");

        let resolved = resolve_deltas(delta_parse(&dogs), &reference());
        assert_eq!(content(&resolved[0]), "A\nb\nc\nd\ne\n");
        assert_eq!(resolved[0].warnings.len(), 1);
        assert!(resolved[0].warnings[0].contains("DELETE_LINES(4,2)"));
    }

    #[test]
    fn test_delete_passes_through() {
        let dogs = [
            "🐕 --- DOGS_START_FILE: notes.txt ---",
            "@@ PAWS_CMD REPLACE_LINES(1,2) @@",
            "gone",
            "@@ PAWS_CMD DELETE_FILE() @@",
            "🐕 --- DOGS_END_FILE: notes.txt ---",
        ]
        .join("\n");

        let resolved = resolve_deltas(delta_parse(&dogs), &reference());
        assert_eq!(resolved[0].payload, Ok(Payload::Delete));
    }

    #[test]
    fn test_reference_without_trailing_newline() {
        let reference = create_bundle(
            &[BundleFile::new("x.txt", b"one\ntwo".to_vec())],
            &BundleOptions::default(),
        );
        let dogs = [
            "🐕 --- DOGS_START_FILE: x.txt ---",
            "@@ PAWS_CMD INSERT_AFTER_LINE(2) @@",
            "three",
            "🐕 --- DOGS_END_FILE: x.txt ---",
        ]
        .join("\n");
        let resolved = resolve_deltas(delta_parse(&dogs), &reference);
        assert_eq!(content(&resolved[0]), "one\ntwo\nthree");
    }

    #[test]
    fn test_index_skips_failed_files() {
        let index = ReferenceIndex::build(&reference());
        assert_eq!(index.len(), 2);
        assert!(index.get("src/app.txt").is_some());
        assert!(index.get("missing").is_none());
    }
}
