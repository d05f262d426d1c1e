use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Write,
    Skip,
    WriteAll,
    SkipAll,
    Abort,
}

/// What to do when extraction would touch a file that already exists.
/// `new` is `None` for a deletion.
pub trait ConfirmPolicy {
    fn decide(&mut self, path: &Path, existing: Option<&[u8]>, new: Option<&[u8]>) -> Decision;
}

/// Non-interactive answer for every file (`-y` / `-n`).
pub struct Always(pub Decision);

impl ConfirmPolicy for Always {
    fn decide(&mut self, _path: &Path, _existing: Option<&[u8]>, _new: Option<&[u8]>) -> Decision {
        self.0
    }
}

/// Ask on a terminal-like reader/writer pair.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompt { input, output }
    }
}

impl<R: BufRead, W: Write> ConfirmPolicy for Prompt<R, W> {
    fn decide(&mut self, path: &Path, existing: Option<&[u8]>, new: Option<&[u8]>) -> Decision {
        let action = match new {
            Some(_) => "Overwrite",
            None => "Delete",
        };
        let size = existing.map(<[u8]>::len).unwrap_or(0);

        loop {
            // Prompt I/O failure aborts.
            if write!(
                self.output,
                "{action} {} ({size} bytes)? [y]es/[n]o/[a]ll/[s]kip all/[q]uit: ",
                path.display()
            )
            .and_then(|_| self.output.flush())
            .is_err()
            {
                return Decision::Abort;
            }

            let mut answer = String::new();
            match self.input.read_line(&mut answer) {
                Ok(0) | Err(_) => return Decision::Abort,
                Ok(_) => {}
            }
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Decision::Write,
                "n" | "no" => return Decision::Skip,
                "a" | "all" => return Decision::WriteAll,
                "s" | "skip all" => return Decision::SkipAll,
                "q" | "quit" => return Decision::Abort,
                _ => {}
            }
        }
    }
}
