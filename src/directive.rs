//! Inline delta directives: `@@ PAWS_CMD <COMMAND>(<args>) @@`.

use crate::bundle_format::{DeltaCommand, DIRECTIVE_CLOSE, DIRECTIVE_OPEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Command(DeltaCommand),
    /// A known command name whose arguments could not be used.
    Malformed { line: String, reason: String },
}

/// Recognize a directive line. Unknown command names and lines that are not
/// directive-shaped yield `None` and stay ordinary content.
pub fn scan(line: &str) -> Option<Directive> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix(DIRECTIVE_OPEN)?
        .strip_suffix(DIRECTIVE_CLOSE)?
        .trim();

    let open = inner.find('(')?;
    let args = inner[open + 1..].strip_suffix(')')?;
    let name = inner[..open].trim();

    let arity = match name {
        "REPLACE_LINES" | "DELETE_LINES" => 2,
        "INSERT_AFTER_LINE" => 1,
        "DELETE_FILE" => 0,
        _ => return None,
    };

    let numbers = match parse_args(args, arity) {
        Ok(numbers) => numbers,
        Err(reason) => {
            return Some(Directive::Malformed {
                line: trimmed.to_string(),
                reason,
            })
        }
    };

    let command = match name {
        "REPLACE_LINES" => DeltaCommand::Replace {
            start_line: numbers[0],
            end_line: numbers[1],
            new_lines: Vec::new(),
        },
        "DELETE_LINES" => DeltaCommand::DeleteLines {
            start_line: numbers[0],
            end_line: numbers[1],
        },
        "INSERT_AFTER_LINE" => DeltaCommand::InsertAfter {
            line_num: numbers[0],
            new_lines: Vec::new(),
        },
        _ => DeltaCommand::DeleteFile,
    };
    Some(Directive::Command(command))
}

fn parse_args(args: &str, arity: usize) -> Result<Vec<usize>, String> {
    let args = args.trim();
    if args.is_empty() {
        return if arity == 0 {
            Ok(Vec::new())
        } else {
            Err(format!("expected {arity} argument(s), got none"))
        };
    }

    let numbers = args
        .split(',')
        .map(|a| {
            let a = a.trim();
            a.parse::<usize>()
                .map_err(|_| format!("argument {a:?} is not a line number"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if numbers.len() != arity {
        return Err(format!(
            "expected {arity} argument(s), got {}",
            numbers.len()
        ));
    }
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_all_commands() {
        assert_eq!(
            scan("@@ PAWS_CMD REPLACE_LINES(2, 4) @@"),
            Some(Directive::Command(DeltaCommand::Replace {
                start_line: 2,
                end_line: 4,
                new_lines: vec![],
            }))
        );
        assert_eq!(
            scan("  @@ PAWS_CMD INSERT_AFTER_LINE(0) @@  "),
            Some(Directive::Command(DeltaCommand::InsertAfter {
                line_num: 0,
                new_lines: vec![],
            }))
        );
        assert_eq!(
            scan("@@ PAWS_CMD DELETE_LINES(5,5) @@"),
            Some(Directive::Command(DeltaCommand::DeleteLines {
                start_line: 5,
                end_line: 5,
            }))
        );
        assert_eq!(
            scan("@@ PAWS_CMD DELETE_FILE() @@"),
            Some(Directive::Command(DeltaCommand::DeleteFile))
        );
    }

    #[test]
    fn test_unknown_command_is_content() {
        assert_eq!(scan("@@ PAWS_CMD RENAME_FILE(a) @@"), None);
        assert_eq!(scan("@@ -1,3 +1,4 @@"), None);
        assert_eq!(scan("@@ PAWS_CMD REPLACE_LINES @@"), None);
    }

    #[test]
    fn test_bad_arguments_are_malformed() {
        for line in [
            "@@ PAWS_CMD REPLACE_LINES(1) @@",
            "@@ PAWS_CMD DELETE_LINES(a,b) @@",
            "@@ PAWS_CMD INSERT_AFTER_LINE(-1) @@",
            "@@ PAWS_CMD DELETE_FILE(3) @@",
        ] {
            assert!(
                matches!(scan(line), Some(Directive::Malformed { .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn test_inverted_range_still_parses() {
        // Range validation belongs to the patch engine.
        assert!(matches!(
            scan("@@ PAWS_CMD REPLACE_LINES(4,2) @@"),
            Some(Directive::Command(DeltaCommand::Replace { start_line: 4, end_line: 2, .. }))
        ));
    }
}
