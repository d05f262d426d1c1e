use crate::bundle_format::{
    BundleFile, BundleOptions, Encoding, ForceEncoding, BASE64_HINT, HEADER_DELTA_REFERENCE,
    HEADER_FORMAT_PREFIX, PERSONA_END, PERSONA_START, SYSTEM_PROMPT_END, SYSTEM_PROMPT_START,
};
use crate::codec;
use crate::directive;
use crate::error::PathRejected;
use crate::marker::{self, Direction};
use crate::parser::is_fence_line;

/// Serialize `files` into bundle text, in input order. Files whose path
/// fails [`check_bundle_path`] are left out with a warning.
pub fn create_bundle(files: &[BundleFile], options: &BundleOptions) -> String {
    let mut out = String::new();

    push_preamble(&mut out, PERSONA_START, PERSONA_END, options.persona.as_deref());
    push_preamble(
        &mut out,
        SYSTEM_PROMPT_START,
        SYSTEM_PROMPT_END,
        options.system_prompt.as_deref(),
    );

    let encoded: Vec<(&BundleFile, bool)> = files
        .iter()
        .filter(|f| match check_bundle_path(&f.path) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{e}; file not bundled");
                false
            }
        })
        .map(|f| {
            let as_base64 = options.force_encoding == ForceEncoding::Base64 || needs_base64(f);
            (f, as_base64)
        })
        .collect();

    out.push_str(options.kind.title());
    out.push('\n');
    out.push_str(&format!(
        "{HEADER_FORMAT_PREFIX} {}\n",
        format_descriptor(options.force_encoding, encoded.iter().any(|(_, b)| *b))
    ));
    if options.delta_reference {
        out.push_str(HEADER_DELTA_REFERENCE);
        out.push('\n');
    }

    for (file, as_base64) in encoded {
        // Forced mode carries no per-file hint.
        let hint = as_base64 && options.force_encoding != ForceEncoding::Base64;
        let encoding = if as_base64 {
            Encoding::Base64
        } else {
            Encoding::Utf8
        };
        let body = codec::encode(&file.bytes, encoding)
            .unwrap_or_else(|_| codec::encode(&file.bytes, Encoding::Base64).unwrap_or_default());

        out.push('\n');
        out.push_str(&marker::render(options.kind, Direction::Start, &file.path, hint));
        out.push('\n');
        out.push_str(&body);
        if !body.is_empty() && !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&marker::render(options.kind, Direction::End, &file.path, hint));
        out.push('\n');
    }

    out
}

/// Whether `path` survives the marker line unchanged. Marker parsing trims
/// whitespace and strips a trailing hint, so such paths cannot be framed.
pub fn check_bundle_path(path: &str) -> Result<(), PathRejected> {
    let reason = if path.trim().is_empty() {
        "empty path"
    } else if path.trim() != path {
        "leading or trailing whitespace in path"
    } else if path.chars().any(char::is_control) {
        "control character in path"
    } else if path.to_ascii_lowercase().ends_with(&BASE64_HINT.to_ascii_lowercase()) {
        "path ends with the Base64 hint"
    } else {
        return Ok(());
    };
    Err(PathRejected {
        raw: path.to_string(),
        reason: reason.to_string(),
        attempted: None,
    })
}

fn format_descriptor(force: ForceEncoding, any_base64: bool) -> &'static str {
    match force {
        ForceEncoding::Base64 => "Base64",
        ForceEncoding::Auto if any_base64 => "Raw UTF-8; binary files as Base64 (marked)",
        ForceEncoding::Auto => "Raw UTF-8",
    }
}

fn push_preamble(out: &mut String, start: &str, end: &str, text: Option<&str>) {
    let Some(text) = text else {
        return;
    };
    out.push_str(start);
    out.push('\n');
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(end);
    out.push_str("\n\n");
}

/// Whether a file must travel as Base64 to come back byte-identical.
///
/// Besides binary and non-UTF-8 data this covers text the plain framing
/// would alter: CRs, a missing final newline, blank or fence lines at the
/// edges, and lines the parser would read as markers or directives.
pub fn needs_base64(file: &BundleFile) -> bool {
    if file.is_binary || codec::is_binary(&file.bytes) {
        return true;
    }
    let Ok(text) = std::str::from_utf8(&file.bytes) else {
        return true;
    };
    if text.is_empty() {
        return false;
    }
    if text.contains('\r') || !text.ends_with('\n') {
        return true;
    }

    let lines: Vec<&str> = text[..text.len() - 1].split('\n').collect();
    let edge = |line: &str| line.trim().is_empty() || is_fence_line(line);
    if lines.first().is_some_and(|l| edge(*l)) || lines.last().is_some_and(|l| edge(*l)) {
        return true;
    }
    lines
        .iter()
        .any(|l| marker::scan(l).is_some() || directive::scan(l).is_some())
}
