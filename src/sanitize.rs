use std::path::{Component, Path, PathBuf};

use crate::error::PathRejected;

/// Map an untrusted bundle path to a destination under `root`.
///
/// `.`/`..`/empty components are dropped rather than rejected. The result is
/// then checked on its own: a plain-name-only relative path, a lexical prefix
/// test, and, when `root` exists, a canonical prefix test of the deepest
/// existing ancestor so symlinked directories cannot lead outside.
pub fn sanitize_path(raw: &str, root: &Path) -> Result<PathBuf, PathRejected> {
    let reject = |reason: &str, attempted: Option<PathBuf>| PathRejected {
        raw: raw.to_string(),
        reason: reason.to_string(),
        attempted,
    };

    let normalized = raw.replace('\\', "/");
    let parts: Vec<&str> = normalized
        .split('/')
        .filter(|c| !matches!(c.trim(), "" | "." | ".."))
        .collect();

    if parts.iter().any(|c| c.contains('\0')) {
        return Err(reject("path contains a NUL byte", None));
    }
    if parts.first().is_some_and(|c| has_drive_prefix(c)) {
        return Err(reject("drive letter in path", None));
    }
    if cfg!(windows) && parts.iter().any(|c| c.contains(':')) {
        return Err(reject("stream separator in path", None));
    }

    let relative: PathBuf = if parts.is_empty() {
        PathBuf::from(placeholder_name(raw))
    } else {
        parts.iter().collect()
    };

    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(reject("path is not a plain relative path", Some(relative)));
    }

    let target = root.join(&relative);
    if !target.starts_with(root) {
        return Err(reject("path escapes the output root", Some(target)));
    }

    if let Ok(canonical_root) = root.canonicalize() {
        if let Some(existing) = deepest_existing(&target) {
            let resolved = existing.canonicalize().map_err(|e| {
                reject(&format!("cannot resolve {}: {e}", existing.display()), Some(target.clone()))
            })?;
            if !resolved.starts_with(&canonical_root) {
                return Err(reject(
                    "path resolves outside the output root",
                    Some(resolved),
                ));
            }
        }
    }

    Ok(target)
}

/// Stand-in name for a path that normalizes to nothing. Deterministic per raw path.
pub fn placeholder_name(raw: &str) -> String {
    let hash = blake3::hash(raw.as_bytes()).to_hex();
    format!("unnamed_{}", &hash.as_str()[..8])
}

fn has_drive_prefix(component: &str) -> bool {
    let bytes = component.trim_start().as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn deepest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.symlink_metadata().is_ok())
}
