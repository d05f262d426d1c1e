use crate::error::FileError;

pub const CATS_GLYPH: &str = "🐈";
pub const DOGS_GLYPH: &str = "🐕";
pub const CATS_FAMILY: &str = "CATS_";
pub const DOGS_FAMILY: &str = "DOGS_";

pub const START_TOKEN: &str = "START_FILE:";
pub const END_TOKEN: &str = "END_FILE:";
pub const MARKER_RULE: &str = "---";
pub const BASE64_HINT: &str = "(Content:Base64)";

pub const DIRECTIVE_OPEN: &str = "@@ PAWS_CMD";
pub const DIRECTIVE_CLOSE: &str = "@@";

pub const HEADER_FORMAT_PREFIX: &str = "# Format:";
pub const HEADER_DELTA_REFERENCE: &str = "# Delta Reference: Yes";

pub const PERSONA_START: &str = "--- START PERSONA ---";
pub const PERSONA_END: &str = "--- END PERSONA ---";
pub const SYSTEM_PROMPT_START: &str = "--- START SYSTEM PROMPT ---";
pub const SYSTEM_PROMPT_END: &str = "--- END SYSTEM PROMPT ---";

/// Number of leading bytes inspected when sniffing for binary content.
pub const BINARY_SNIFF_LEN: usize = 512;

/// Which side of the round trip produced a bundle. Only changes the header
/// title and the marker glyph; the parser accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleKind {
    #[default]
    Cats,
    Dogs,
}

impl BundleKind {
    pub fn title(self) -> &'static str {
        match self {
            BundleKind::Cats => "# Cats Bundle",
            BundleKind::Dogs => "# Dogs Bundle",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            BundleKind::Cats => CATS_GLYPH,
            BundleKind::Dogs => DOGS_GLYPH,
        }
    }

    pub fn family(self) -> &'static str {
        match self {
            BundleKind::Cats => CATS_FAMILY,
            BundleKind::Dogs => DOGS_FAMILY,
        }
    }
}

/// Content encoding of a single file block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Base64,
}

impl Encoding {
    /// Best-effort reading of a free-text `# Format:` descriptor.
    pub fn from_descriptor(descriptor: &str) -> Option<Encoding> {
        let lower = descriptor.to_ascii_lowercase();
        if lower.contains("utf-16") || lower.contains("utf16") {
            Some(Encoding::Utf16Le)
        } else if lower.starts_with("base64") {
            Some(Encoding::Base64)
        } else if lower.contains("utf-8") || lower.contains("utf8") {
            Some(Encoding::Utf8)
        } else {
            None
        }
    }
}

/// Header lines seen before the first file block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleHeader {
    pub kind: Option<String>,
    pub format: Option<String>,
    pub delta_reference: bool,
}

impl BundleHeader {
    pub fn encoding(&self) -> Option<Encoding> {
        self.format.as_deref().and_then(Encoding::from_descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaCommand {
    Replace {
        start_line: usize,
        end_line: usize,
        new_lines: Vec<String>,
    },
    InsertAfter {
        line_num: usize,
        new_lines: Vec<String>,
    },
    DeleteLines {
        start_line: usize,
        end_line: usize,
    },
    DeleteFile,
}

impl DeltaCommand {
    /// Whether content lines following the directive belong to this command.
    pub fn takes_content(&self) -> bool {
        matches!(
            self,
            DeltaCommand::Replace { .. } | DeltaCommand::InsertAfter { .. }
        )
    }

    pub fn push_line(&mut self, line: String) {
        match self {
            DeltaCommand::Replace { new_lines, .. } | DeltaCommand::InsertAfter { new_lines, .. } => {
                new_lines.push(line)
            }
            DeltaCommand::DeleteLines { .. } | DeltaCommand::DeleteFile => {}
        }
    }
}

impl std::fmt::Display for DeltaCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeltaCommand::Replace {
                start_line,
                end_line,
                ..
            } => write!(f, "REPLACE_LINES({start_line},{end_line})"),
            DeltaCommand::InsertAfter { line_num, .. } => write!(f, "INSERT_AFTER_LINE({line_num})"),
            DeltaCommand::DeleteLines {
                start_line,
                end_line,
            } => write!(f, "DELETE_LINES({start_line},{end_line})"),
            DeltaCommand::DeleteFile => write!(f, "DELETE_FILE()"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    FullContent { bytes: Vec<u8>, binary_hint: bool },
    DeltaCommands(Vec<DeltaCommand>),
    Delete,
}

/// Outcome of one file block. `payload` is the tagged success/failure;
/// `warnings` collects recoverable oddities noticed along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlockResult {
    pub path: String,
    pub payload: Result<Payload, FileError>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBundle {
    pub header: BundleHeader,
    pub files: Vec<FileBlockResult>,
}

/// One input file for the writer.
#[derive(Debug, Clone)]
pub struct BundleFile {
    pub path: String,
    pub bytes: Vec<u8>,
    pub is_binary: bool,
}

impl BundleFile {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let is_binary = crate::codec::is_binary(&bytes);
        BundleFile {
            path: path.into(),
            bytes,
            is_binary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceEncoding {
    #[default]
    Auto,
    Base64,
}

#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    pub kind: BundleKind,
    pub force_encoding: ForceEncoding,
    pub delta_reference: bool,
    pub persona: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub apply_delta: bool,
    pub forced_encoding: Option<Encoding>,
}
