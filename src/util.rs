use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct InputEntry {
    /// Path written into the bundle, forward slashes, relative to the base.
    pub relative_path: String,
    pub full_path: PathBuf,
    /// File size in bytes. Free from the OS directory scan.
    pub size: u64,
}

/// Expand the command-line inputs into a sorted, de-duplicated file list.
///
/// Directories are walked recursively. An exclude pattern matches a relative
/// path exactly, any directory prefix of it, or any single path component.
pub fn collect_files(inputs: &[PathBuf], base: &Path, excludes: &[String]) -> Result<Vec<InputEntry>> {
    let base = base
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize base directory: {}", base.display()))?;

    let mut entries: BTreeMap<String, InputEntry> = BTreeMap::new();

    for input in inputs {
        let input = base.join(input);
        let root = input
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize input: {}", input.display()))?;

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to read directory entry in {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let full_path = entry.path().to_path_buf();
            let relative = relative_to(&full_path, &base, &root)?;
            if is_excluded(&relative, excludes) {
                log::debug!("excluded {relative}");
                continue;
            }

            let size = entry
                .metadata()
                .with_context(|| format!("Failed to read metadata: {}", full_path.display()))?
                .len();

            entries.insert(
                relative.clone(),
                InputEntry {
                    relative_path: relative,
                    full_path,
                    size,
                },
            );
        }
    }

    Ok(entries.into_values().collect())
}

/// Inputs under the base keep their base-relative path; anything else is
/// named relative to the input's parent.
fn relative_to(full_path: &Path, base: &Path, root: &Path) -> Result<String> {
    let relative = match full_path.strip_prefix(base) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let anchor = root.parent().unwrap_or(root);
            full_path
                .strip_prefix(anchor)
                .with_context(|| "Failed to compute relative path")?
                .to_path_buf()
        }
    };
    let relative = relative
        .to_str()
        .with_context(|| format!("Non-UTF8 path: {}", relative.display()))?
        .replace('\\', "/");
    if relative.is_empty() {
        bail!("Input resolves to the base directory itself: {}", full_path.display());
    }
    Ok(relative)
}

fn is_excluded(relative: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|pattern| {
        let pattern = pattern.trim_matches('/');
        !pattern.is_empty()
            && (relative == pattern
                || relative.starts_with(&format!("{pattern}/"))
                || relative.split('/').any(|c| c == pattern))
    })
}

/// Read a whole file through a read-only memory map.
///
/// # Safety
/// The mapping is read-only. Callers must not concurrently truncate or replace
/// the underlying file while the `Mmap` is live.
pub fn read_file(path: &Path, size: u64) -> Result<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    // SAFETY: We only read from this mapping and copy it out before returning.
    let mmap = unsafe {
        Mmap::map(&file).with_context(|| format!("Failed to memory-map file: {}", path.display()))?
    };
    Ok(mmap.to_vec())
}

/// Compute the BLAKE3 hash of a byte slice.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(root: &Path, files: &[(&str, &[u8])]) {
        for (rel, content) in files {
            let full = root.join(rel);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
    }

    #[test]
    fn test_collect_walks_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        tree(
            dir.path(),
            &[
                ("src/z.rs", b"z"),
                ("src/a.rs", b"a"),
                ("README.md", b"readme"),
                ("target/debug/out", b"junk"),
                ("src/node_modules/x.js", b"junk"),
            ],
        );

        let entries = collect_files(
            &[PathBuf::from("src"), PathBuf::from("README.md"), PathBuf::from("src/a.rs"), PathBuf::from("target")],
            dir.path(),
            &["target".into(), "node_modules".into()],
        )
        .unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, ["README.md", "src/a.rs", "src/z.rs"]);
        assert_eq!(entries[0].size, 6);
    }

    #[test]
    fn test_read_file_including_empty() {
        let dir = tempfile::tempdir().unwrap();
        tree(dir.path(), &[("a.bin", &[1, 2, 3]), ("empty", b"")]);
        assert_eq!(read_file(&dir.path().join("a.bin"), 3).unwrap(), vec![1, 2, 3]);
        assert!(read_file(&dir.path().join("empty"), 0).unwrap().is_empty());
    }

    #[test]
    fn test_missing_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_files(&[PathBuf::from("nope")], dir.path(), &[]).is_err());
    }
}
