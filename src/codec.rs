use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::bundle_format::{BundleHeader, Encoding, BINARY_SNIFF_LEN};
use crate::error::CodecError;

/// Base64 bodies are wrapped so pasted bundles stay readable.
pub const BASE64_LINE_WIDTH: usize = 76;

/// A file is binary when its first 512 bytes contain a NUL.
pub fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// Pick the decoding for one block.
/// A caller override beats the per-file hint, which beats the header.
pub fn select_encoding(
    forced: Option<Encoding>,
    base64_hint: bool,
    header: &BundleHeader,
) -> Encoding {
    if let Some(encoding) = forced {
        return encoding;
    }
    if base64_hint {
        return Encoding::Base64;
    }
    header.encoding().unwrap_or(Encoding::Utf8)
}

/// Render file bytes as block text.
pub fn encode(data: &[u8], encoding: Encoding) -> Result<String, CodecError> {
    match encoding {
        Encoding::Utf8 => String::from_utf8(data.to_vec()).map_err(|e| CodecError::Utf8(e.to_string())),
        Encoding::Utf16Le => {
            if data.len() % 2 != 0 {
                return Err(CodecError::OddUtf16Length(data.len()));
            }
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|e| CodecError::Utf16(e.to_string()))
        }
        Encoding::Base64 => Ok(wrap(&BASE64.encode(data), BASE64_LINE_WIDTH)),
    }
}

/// Turn block text back into file bytes. Base64 tolerates any whitespace,
/// including the line breaks an LLM likes to insert.
pub fn decode(text: &str, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        Encoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        Encoding::Base64 => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            BASE64
                .decode(compact.as_bytes())
                .map_err(|e| CodecError::Base64(e.to_string()))
        }
    }
}

/// Block text for a list of content lines: joined with `\n`, newline-terminated
/// unless empty.
pub fn text_from_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn wrap(encoded: &str, width: usize) -> String {
    let mut out = String::with_capacity(encoded.len() + encoded.len() / width + 1);
    for (i, chunk) in encoded.as_bytes().chunks(width).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        // Base64 output is pure ASCII.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nul_in_prefix_is_binary() {
        assert!(is_binary(b"abc\0def"));
        assert!(!is_binary(b"plain text\n"));
    }

    #[test]
    fn test_nul_after_sniff_window_is_text() {
        let mut data = vec![b'a'; BINARY_SNIFF_LEN];
        data.push(0);
        assert!(!is_binary(&data));
    }

    #[test]
    fn test_base64_decode_ignores_whitespace() {
        let encoded = encode(b"hello binary world \x00\x01\x02", Encoding::Base64).unwrap();
        let mangled = format!("  {}\n\n", encoded.replace('=', "=\n "));
        let mangled = mangled.replacen('G', "G \t", 1);
        assert_eq!(
            decode(&mangled, Encoding::Base64).unwrap(),
            b"hello binary world \x00\x01\x02"
        );
    }

    #[test]
    fn test_base64_is_wrapped() {
        let encoded = encode(&[7u8; 300], Encoding::Base64).unwrap();
        assert!(encoded.lines().all(|l| l.len() <= BASE64_LINE_WIDTH));
        assert!(encoded.lines().count() > 1);
    }

    #[test]
    fn test_invalid_base64_is_error() {
        assert!(matches!(
            decode("not*base64!", Encoding::Base64),
            Err(CodecError::Base64(_))
        ));
    }

    #[test]
    fn test_utf16le_both_directions() {
        let bytes: Vec<u8> = "héllo\n".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let text = encode(&bytes, Encoding::Utf16Le).unwrap();
        assert_eq!(text, "héllo\n");
        assert_eq!(decode(&text, Encoding::Utf16Le).unwrap(), bytes);
        assert_eq!(
            encode(&bytes[..3], Encoding::Utf16Le),
            Err(CodecError::OddUtf16Length(3))
        );
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        assert!(matches!(
            encode(&[0xff, 0xfe, 0x41], Encoding::Utf8),
            Err(CodecError::Utf8(_))
        ));
    }

    #[test]
    fn test_selection_precedence() {
        let header = BundleHeader {
            format: Some("Base64".into()),
            ..Default::default()
        };
        assert_eq!(select_encoding(None, false, &header), Encoding::Base64);
        assert_eq!(
            select_encoding(Some(Encoding::Utf8), true, &header),
            Encoding::Utf8
        );
        assert_eq!(
            select_encoding(None, true, &BundleHeader::default()),
            Encoding::Base64
        );
        let unknown = BundleHeader {
            format: Some("Klingon".into()),
            ..Default::default()
        };
        assert_eq!(select_encoding(None, false, &unknown), Encoding::Utf8);
    }

    #[test]
    fn test_text_from_lines() {
        assert_eq!(text_from_lines(&[]), "");
        assert_eq!(text_from_lines(&["a".into(), "b".into()]), "a\nb\n");
    }
}
