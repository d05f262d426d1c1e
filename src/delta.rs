use crate::bundle_format::DeltaCommand;
use crate::error::DeltaError;

/// A command that could not be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCommand {
    /// 1-based position of the command in author order.
    pub index: usize,
    pub command: String,
    pub reason: DeltaError,
}

impl std::fmt::Display for SkippedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "command #{} {} skipped: {}",
            self.index, self.command, self.reason
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub lines: Vec<String>,
    pub skipped: Vec<SkippedCommand>,
}

/// Replay `commands` against `original` in author order.
///
/// Line numbers in every command refer to the original file; `offset`
/// carries the net line-count change of the commands already applied. A
/// command that does not fit is skipped and leaves the offset untouched.
pub fn apply_commands(original: &[String], commands: &[DeltaCommand]) -> PatchOutcome {
    let mut lines = original.to_vec();
    let mut offset: isize = 0;
    let mut skipped = Vec::new();

    for (i, command) in commands.iter().enumerate() {
        match apply_one(&mut lines, offset, command) {
            Ok(delta) => offset += delta,
            Err(reason) => {
                log::debug!("skipping {command}: {reason}");
                skipped.push(SkippedCommand {
                    index: i + 1,
                    command: command.to_string(),
                    reason,
                });
            }
        }
    }

    PatchOutcome { lines, skipped }
}

/// Apply one command, returning its change in line count.
fn apply_one(lines: &mut Vec<String>, offset: isize, command: &DeltaCommand) -> Result<isize, DeltaError> {
    match command {
        DeltaCommand::Replace {
            start_line,
            end_line,
            new_lines,
        } => {
            let (start, count) = locate_range(lines.len(), offset, *start_line, *end_line)?;
            lines.splice(start..start + count, new_lines.iter().cloned());
            Ok(new_lines.len() as isize - count as isize)
        }
        DeltaCommand::InsertAfter {
            line_num,
            new_lines,
        } => {
            let idx = shift(*line_num, offset, lines.len())?;
            lines.splice(idx..idx, new_lines.iter().cloned());
            Ok(new_lines.len() as isize)
        }
        DeltaCommand::DeleteLines {
            start_line,
            end_line,
        } => {
            let (start, count) = locate_range(lines.len(), offset, *start_line, *end_line)?;
            lines.drain(start..start + count);
            Ok(-(count as isize))
        }
        DeltaCommand::DeleteFile => Err(DeltaError::NotALineEdit),
    }
}

fn locate_range(len: usize, offset: isize, start_line: usize, end_line: usize) -> Result<(usize, usize), DeltaError> {
    if start_line == 0 {
        return Err(DeltaError::ZeroLine(start_line));
    }
    if end_line < start_line {
        return Err(DeltaError::InvertedRange {
            start: start_line,
            end: end_line,
        });
    }
    let start = shift(start_line - 1, offset, len)?;
    let count = (end_line - start_line).saturating_add(1);
    match start.checked_add(count) {
        Some(end) if end <= len => Ok((start, count)),
        _ => Err(DeltaError::PastEnd {
            index: start,
            count,
            len,
        }),
    }
}

fn shift(position: usize, offset: isize, len: usize) -> Result<usize, DeltaError> {
    match position.checked_add_signed(offset) {
        Some(shifted) if shifted <= len => Ok(shifted),
        Some(shifted) => Err(DeltaError::OutOfRange { index: shifted, len }),
        None => Err(DeltaError::OutOfRange {
            index: if offset < 0 { 0 } else { position },
            len,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_offset_carries_across_commands() {
        let original = lines(&["a", "b", "c", "d", "e"]);
        let commands = vec![
            DeltaCommand::Replace {
                start_line: 2,
                end_line: 3,
                new_lines: lines(&["X", "Y", "Z"]),
            },
            DeltaCommand::InsertAfter {
                line_num: 5,
                new_lines: lines(&["F"]),
            },
        ];
        let outcome = apply_commands(&original, &commands);
        assert_eq!(outcome.lines, lines(&["a", "X", "Y", "Z", "d", "e", "F"]));
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_insert_at_start() {
        let outcome = apply_commands(
            &lines(&["b"]),
            &[DeltaCommand::InsertAfter {
                line_num: 0,
                new_lines: lines(&["a"]),
            }],
        );
        assert_eq!(outcome.lines, lines(&["a", "b"]));
    }

    #[test]
    fn test_replace_with_nothing_deletes() {
        let outcome = apply_commands(
            &lines(&["a", "b", "c"]),
            &[DeltaCommand::Replace {
                start_line: 2,
                end_line: 2,
                new_lines: vec![],
            }],
        );
        assert_eq!(outcome.lines, lines(&["a", "c"]));
    }

    #[test]
    fn test_delete_then_replace_uses_original_numbering() {
        let original = lines(&["1", "2", "3", "4", "5", "6"]);
        let commands = vec![
            DeltaCommand::DeleteLines {
                start_line: 1,
                end_line: 2,
            },
            DeltaCommand::Replace {
                start_line: 5,
                end_line: 5,
                new_lines: lines(&["five"]),
            },
        ];
        let outcome = apply_commands(&original, &commands);
        assert_eq!(outcome.lines, lines(&["3", "4", "five", "6"]));
    }

    #[test]
    fn test_bad_command_is_isolated() {
        let original = lines(&["a", "b", "c"]);
        let commands = vec![
            DeltaCommand::DeleteLines {
                start_line: 3,
                end_line: 1,
            },
            DeltaCommand::Replace {
                start_line: 1,
                end_line: 1,
                new_lines: lines(&["A"]),
            },
            DeltaCommand::InsertAfter {
                line_num: 10,
                new_lines: lines(&["never"]),
            },
            DeltaCommand::DeleteLines {
                start_line: 3,
                end_line: 3,
            },
        ];
        let outcome = apply_commands(&original, &commands);
        assert_eq!(outcome.lines, lines(&["A", "b"]));
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.skipped[0].index, 1);
        assert_eq!(
            outcome.skipped[0].reason,
            DeltaError::InvertedRange { start: 3, end: 1 }
        );
        assert_eq!(outcome.skipped[1].index, 3);
        assert!(matches!(
            outcome.skipped[1].reason,
            DeltaError::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_huge_line_numbers_are_skipped() {
        let original = lines(&["a", "b"]);
        let commands = vec![
            DeltaCommand::InsertAfter {
                line_num: 0,
                new_lines: lines(&["x"]),
            },
            DeltaCommand::Replace {
                start_line: 1,
                end_line: usize::MAX,
                new_lines: vec![],
            },
            DeltaCommand::InsertAfter {
                line_num: isize::MAX as usize,
                new_lines: vec![],
            },
            DeltaCommand::InsertAfter {
                line_num: usize::MAX,
                new_lines: vec![],
            },
            DeltaCommand::DeleteLines {
                start_line: usize::MAX,
                end_line: usize::MAX,
            },
        ];
        let outcome = apply_commands(&original, &commands);
        assert_eq!(outcome.lines, lines(&["x", "a", "b"]));
        assert_eq!(outcome.skipped.len(), 4);
        assert!(matches!(
            outcome.skipped[0].reason,
            DeltaError::PastEnd { .. }
        ));
        assert!(outcome.skipped[1..]
            .iter()
            .all(|s| matches!(s.reason, DeltaError::OutOfRange { .. })));
    }

    #[test]
    fn test_zero_and_past_end_ranges_are_skipped() {
        let original = lines(&["a", "b"]);
        let outcome = apply_commands(
            &original,
            &[
                DeltaCommand::DeleteLines {
                    start_line: 0,
                    end_line: 1,
                },
                DeltaCommand::Replace {
                    start_line: 2,
                    end_line: 4,
                    new_lines: vec![],
                },
            ],
        );
        assert_eq!(outcome.lines, original);
        assert_eq!(outcome.skipped[0].reason, DeltaError::ZeroLine(0));
        assert!(matches!(
            outcome.skipped[1].reason,
            DeltaError::PastEnd { .. }
        ));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let original = lines(&["x", "y", "z"]);
        let commands = vec![
            DeltaCommand::InsertAfter {
                line_num: 1,
                new_lines: lines(&["x2"]),
            },
            DeltaCommand::Replace {
                start_line: 3,
                end_line: 3,
                new_lines: lines(&["Z", "ZZ"]),
            },
        ];
        let first = apply_commands(&original, &commands);
        let second = apply_commands(&original, &commands);
        assert_eq!(first, second);
        assert_eq!(first.lines, lines(&["x", "x2", "y", "Z", "ZZ"]));
    }
}
