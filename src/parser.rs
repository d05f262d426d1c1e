//! Block parser.
//!
//! The state machine is a reducer: [`step`] takes the current [`ParserState`]
//! by value plus one line and returns the next state and, when a block
//! closes, the [`RawBlock`] it produced. Block accumulators live inside the
//! `InsideBlock` variant, so every block starts from a fresh value.

use crate::bundle_format::{
    BundleHeader, DeltaCommand, FileBlockResult, ParseOptions, ParsedBundle, Payload,
    HEADER_DELTA_REFERENCE, HEADER_FORMAT_PREFIX, PERSONA_END, PERSONA_START, SYSTEM_PROMPT_END,
    SYSTEM_PROMPT_START,
};
use crate::codec;
use crate::directive::{self, Directive};
use crate::error::FileError;
use crate::marker::{self, Direction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserState {
    Outside,
    InsideBlock(OpenBlock),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBlock {
    path: String,
    base64_hint: bool,
    lines: Vec<BlockLine>,
    deleted: bool,
    warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockLine {
    Text(String),
    Command(DeltaCommand),
    /// Boundary left by a malformed directive; its payload is discarded.
    Dropped(String),
}

impl BlockLine {
    fn is_blank(&self) -> bool {
        matches!(self, BlockLine::Text(s) if s.trim().is_empty())
    }

    fn is_fence(&self) -> bool {
        matches!(self, BlockLine::Text(s) if is_fence_line(s))
    }
}

/// A closed block, before its text is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub path: String,
    pub base64_hint: bool,
    pub body: BlockBody,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockBody {
    Lines(Vec<String>),
    Commands(Vec<DeltaCommand>),
    Delete,
    /// Directives were present but none of them could be used.
    Invalid(String),
}

pub fn is_fence_line(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

impl OpenBlock {
    fn new(path: String, base64_hint: bool) -> Self {
        OpenBlock {
            path,
            base64_hint,
            lines: Vec::new(),
            deleted: false,
            warnings: Vec::new(),
        }
    }

    fn accept(&mut self, directive: Directive) {
        match directive {
            Directive::Command(DeltaCommand::DeleteFile) => {
                self.deleted = true;
                self.lines.clear();
            }
            Directive::Command(command) => self.lines.push(BlockLine::Command(command)),
            Directive::Malformed { line, reason } => {
                self.warnings
                    .push(format!("ignored malformed directive `{line}`: {reason}"));
                self.lines.push(BlockLine::Dropped(reason));
            }
        }
    }

    /// Close a block whose END marker never arrived.
    fn recover(mut self, why: &str) -> RawBlock {
        log::warn!("{}: {why}; keeping accumulated content", self.path);
        self.warnings.push(format!("{why}; block closed implicitly"));
        self.close()
    }

    fn close(self) -> RawBlock {
        let OpenBlock {
            path,
            base64_hint,
            mut lines,
            deleted,
            mut warnings,
        } = self;

        let body = if deleted {
            BlockBody::Delete
        } else {
            trim_edges(&mut lines);
            if lines.iter().any(|l| !matches!(l, BlockLine::Text(_))) {
                partition_commands(lines, &mut warnings)
            } else {
                BlockBody::Lines(
                    lines
                        .into_iter()
                        .filter_map(|l| match l {
                            BlockLine::Text(s) => Some(s),
                            _ => None,
                        })
                        .collect(),
                )
            }
        };

        RawBlock {
            path,
            base64_hint,
            body,
            warnings,
        }
    }
}

/// Blank padding, then at most one fence per edge, then blank padding again.
fn trim_edges(lines: &mut Vec<BlockLine>) {
    trim_blank(lines);
    if lines.first().is_some_and(BlockLine::is_fence) {
        lines.remove(0);
    }
    if lines.last().is_some_and(BlockLine::is_fence) {
        lines.pop();
    }
    trim_blank(lines);
}

fn trim_blank(lines: &mut Vec<BlockLine>) {
    let lead = lines.iter().take_while(|l| l.is_blank()).count();
    lines.drain(..lead);
    while lines.last().is_some_and(BlockLine::is_blank) {
        lines.pop();
    }
}

/// Attach each run of text lines to the command before it.
fn partition_commands(lines: Vec<BlockLine>, warnings: &mut Vec<String>) -> BlockBody {
    let mut commands: Vec<DeltaCommand> = Vec::new();
    let mut pending: Option<DeltaCommand> = None;
    let mut dropped_reason: Option<String> = None;
    let mut preamble = 0usize;
    let mut orphaned = 0usize;

    for line in lines {
        match line {
            BlockLine::Command(command) => {
                commands.extend(pending.take());
                dropped_reason = None;
                pending = Some(command);
            }
            BlockLine::Dropped(reason) => {
                commands.extend(pending.take());
                dropped_reason = Some(reason);
            }
            BlockLine::Text(text) => match pending.as_mut() {
                Some(command) if command.takes_content() => command.push_line(text),
                Some(_) if !text.trim().is_empty() => orphaned += 1,
                None if dropped_reason.is_none() && !text.trim().is_empty() => preamble += 1,
                _ => {}
            },
        }
    }
    commands.extend(pending);

    if preamble > 0 {
        warnings.push(format!(
            "discarded {preamble} line(s) before the first directive"
        ));
    }
    if orphaned > 0 {
        warnings.push(format!(
            "discarded {orphaned} line(s) following a command that takes no content"
        ));
    }

    if commands.is_empty() {
        let reasons = warnings.join("; ");
        return BlockBody::Invalid(reasons);
    }
    BlockBody::Commands(commands)
}

/// Advance the state machine by one line.
pub fn step(state: ParserState, line: &str, apply_delta: bool) -> (ParserState, Option<RawBlock>) {
    match state {
        ParserState::Outside => match marker::scan(line) {
            Some(m) if m.direction == Direction::Start => (
                ParserState::InsideBlock(OpenBlock::new(m.path, m.base64_hint)),
                None,
            ),
            _ => (ParserState::Outside, None),
        },
        ParserState::InsideBlock(mut block) => {
            if let Some(m) = marker::scan(line) {
                match m.direction {
                    Direction::End if m.path == block.path => {
                        return (ParserState::Outside, Some(block.close()));
                    }
                    Direction::Start if m.path != block.path => {
                        let closed = block.recover(&format!(
                            "missing END marker before START of {}",
                            m.path
                        ));
                        return (
                            ParserState::InsideBlock(OpenBlock::new(m.path, m.base64_hint)),
                            Some(closed),
                        );
                    }
                    _ => {}
                }
            }

            if block.deleted {
                return (ParserState::InsideBlock(block), None);
            }

            if apply_delta {
                if let Some(directive) = directive::scan(line) {
                    block.accept(directive);
                    return (ParserState::InsideBlock(block), None);
                }
            }

            block.lines.push(BlockLine::Text(line.to_string()));
            (ParserState::InsideBlock(block), None)
        }
    }
}

/// Flush the state at end of input.
pub fn finish(state: ParserState) -> Option<RawBlock> {
    match state {
        ParserState::Outside => None,
        ParserState::InsideBlock(block) => Some(block.recover("missing END marker at end of input")),
    }
}

/// Split bundle text into raw blocks, collecting header lines on the way.
pub fn scan_blocks(text: &str, apply_delta: bool) -> (BundleHeader, Vec<RawBlock>) {
    let normalized = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut header = BundleHeader::default();
    let mut blocks = Vec::new();
    let mut state = ParserState::Outside;
    let mut preamble_end: Option<&str> = None;

    for line in normalized.split('\n') {
        if blocks.is_empty() && matches!(state, ParserState::Outside) {
            if let Some(end) = preamble_end {
                if line.trim() == end {
                    preamble_end = None;
                }
                continue;
            }
            if let Some(end) = preamble_close(line) {
                preamble_end = Some(end);
                continue;
            }
            read_header_line(&mut header, line);
        }
        let (next, closed) = step(state, line, apply_delta);
        state = next;
        blocks.extend(closed);
    }
    blocks.extend(finish(state));

    log::debug!("scanned {} block(s)", blocks.len());
    (header, blocks)
}

/// Persona and system prompt sections are opaque: marker lines quoted
/// inside them are not blocks.
fn preamble_close(line: &str) -> Option<&'static str> {
    match line.trim() {
        PERSONA_START => Some(PERSONA_END),
        SYSTEM_PROMPT_START => Some(SYSTEM_PROMPT_END),
        _ => None,
    }
}

fn read_header_line(header: &mut BundleHeader, line: &str) {
    let t = line.trim();
    if let Some(format) = t.strip_prefix(HEADER_FORMAT_PREFIX) {
        header.format = Some(format.trim().to_string());
    } else if t.eq_ignore_ascii_case(HEADER_DELTA_REFERENCE) {
        header.delta_reference = true;
    } else if let Some(title) = t.strip_prefix("# ") {
        if header.kind.is_none() && title.ends_with("Bundle") {
            header.kind = Some(title.to_string());
        }
    }
}

/// Parse bundle text into per-file results. Never fails: malformed input
/// yields fewer files, failed files, or warnings.
pub fn parse_bundle(text: &str, options: &ParseOptions) -> ParsedBundle {
    let (header, blocks) = scan_blocks(text, options.apply_delta);
    let files = blocks
        .into_iter()
        .map(|block| decode_block(block, &header, options))
        .collect();
    ParsedBundle { header, files }
}

fn decode_block(block: RawBlock, header: &BundleHeader, options: &ParseOptions) -> FileBlockResult {
    let RawBlock {
        path,
        base64_hint,
        body,
        warnings,
    } = block;

    let payload = match body {
        BlockBody::Delete => Ok(Payload::Delete),
        BlockBody::Commands(commands) => Ok(Payload::DeltaCommands(commands)),
        BlockBody::Invalid(reason) => Err(FileError::InvalidDirective(reason)),
        BlockBody::Lines(lines) => {
            let encoding = codec::select_encoding(options.forced_encoding, base64_hint, header);
            codec::decode(&codec::text_from_lines(&lines), encoding)
                .map(|bytes| Payload::FullContent {
                    bytes,
                    binary_hint: base64_hint,
                })
                .map_err(|source| {
                    log::warn!("{path}: {source}");
                    FileError::Decode { encoding, source }
                })
        }
    };

    FileBlockResult {
        path,
        payload,
        warnings,
    }
}
