use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use paws::{sanitize_path, FileBlockResult, Payload};

use crate::confirm::{ConfirmPolicy, Decision};
use crate::util;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileNote {
    pub path: String,
    pub message: String,
}

/// What extraction did, file by file. Serialized for `dogs --report`.
#[derive(Debug, Default, Serialize)]
pub struct ExtractReport {
    pub dry_run: bool,
    pub written: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FileNote>,
    pub warnings: Vec<FileNote>,
    pub aborted: bool,
}

enum Change<'a> {
    Write(&'a [u8]),
    Delete,
}

/// Apply parsed results under `output_dir`.
///
/// Every destination goes through [`sanitize_path`] first. Existing files are
/// only replaced or removed with the policy's consent; identical content is
/// left alone.
pub fn extract_files(
    results: Vec<FileBlockResult>,
    output_dir: &Path,
    dry_run: bool,
    policy: &mut dyn ConfirmPolicy,
) -> Result<ExtractReport> {
    let mut report = ExtractReport {
        dry_run,
        ..Default::default()
    };
    let mut sticky: Option<Decision> = None;

    if !dry_run {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    }

    for result in results {
        let FileBlockResult {
            path,
            payload,
            warnings,
        } = result;

        report.warnings.extend(warnings.into_iter().map(|message| FileNote {
            path: path.clone(),
            message,
        }));

        let change = match &payload {
            Ok(Payload::FullContent { bytes, .. }) => Change::Write(bytes),
            Ok(Payload::Delete) => Change::Delete,
            Ok(Payload::DeltaCommands(_)) => {
                report.failed.push(FileNote {
                    path,
                    message: "delta commands need a reference bundle (-d)".into(),
                });
                continue;
            }
            Err(e) => {
                report.failed.push(FileNote {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let target = match sanitize_path(&path, output_dir) {
            Ok(target) => target,
            Err(rejected) => {
                log::warn!("{rejected}");
                report.failed.push(FileNote {
                    path,
                    message: rejected.to_string(),
                });
                continue;
            }
        };

        let existing = if target.is_file() {
            Some(
                std::fs::read(&target)
                    .with_context(|| format!("Failed to read existing file: {}", target.display()))?,
            )
        } else {
            None
        };

        let new = match change {
            Change::Write(bytes) => Some(bytes),
            Change::Delete => None,
        };

        match (&existing, new) {
            (None, None) => {
                report.warnings.push(FileNote {
                    path,
                    message: "nothing to delete".into(),
                });
                continue;
            }
            (Some(old), Some(new)) if util::hash_bytes(old) == util::hash_bytes(new) => {
                report.unchanged.push(path);
                continue;
            }
            (None, Some(_)) => {}
            (Some(_), _) => {
                let decision = match sticky {
                    Some(d) => d,
                    None => policy.decide(&target, existing.as_deref(), new),
                };
                match decision {
                    Decision::Write => {}
                    Decision::WriteAll => sticky = Some(Decision::WriteAll),
                    Decision::Skip => {
                        report.skipped.push(path);
                        continue;
                    }
                    Decision::SkipAll => {
                        sticky = Some(Decision::SkipAll);
                        report.skipped.push(path);
                        continue;
                    }
                    Decision::Abort => {
                        report.aborted = true;
                        return Ok(report);
                    }
                }
            }
        }

        match new {
            Some(bytes) => {
                if !dry_run {
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
                    }
                    std::fs::write(&target, bytes)
                        .with_context(|| format!("Failed to write file: {}", target.display()))?;
                }
                report.written.push(path);
            }
            None => {
                if !dry_run {
                    std::fs::remove_file(&target)
                        .with_context(|| format!("Failed to delete file: {}", target.display()))?;
                }
                report.deleted.push(path);
            }
        }
    }

    Ok(report)
}
