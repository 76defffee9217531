//! Filesystem scan (C1, spec §4.1): walk the project root, apply the ignore
//! list, filter by extension, and hash every surviving file's content.

use std::path::{Path, PathBuf};

use codegraph_core::{CoreError, CoreResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub hash: String,
}

/// Walk `root`, skipping anything matched by `ignore_globs`, keeping files
/// whose extension (without the dot) is in `extensions`. Order is the
/// directory walker's order — stable for a given tree, not globally sorted.
/// A single unreadable file is logged and skipped; it never aborts the scan.
pub fn scan(root: &Path, extensions: &[String], ignore_globs: &[String]) -> CoreResult<Vec<ScannedFile>> {
    if !root.is_dir() {
        return Err(CoreError::Validation(format!("{} is not a directory", root.display())));
    }

    let ignore_set = build_glob_set(ignore_globs)?;
    let mut out = Vec::new();

    let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).build();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("scan: skipping unreadable directory entry: {e}");
                continue;
            }
        };
        if entry.file_type().map(|t| !t.is_file()).unwrap_or(true) {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if ignore_set.is_match(relative) {
            continue;
        }
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => continue,
        };
        if !extensions.iter().any(|e| e == ext) {
            continue;
        }

        match hash_file(path) {
            Ok(hash) => out.push(ScannedFile { path: path.to_path_buf(), hash }),
            Err(e) => tracing::warn!("scan: skipping {}: {e}", path.display()),
        }
    }

    Ok(out)
}

fn build_glob_set(globs: &[String]) -> CoreResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let glob = Glob::new(pattern)
            .map_err(|e| CoreError::Validation(format!("invalid ignore glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CoreError::Validation(format!("invalid ignore glob set: {e}")))
}

/// First 16 hex characters of the file's SHA-256 — spec §4.1's content hash.
fn hash_file(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let digest = hasher.finalize();
    Ok(digest.iter().take(8).map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_filters_by_extension_and_ignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "const a = 1;").unwrap();
        fs::write(dir.path().join("b.txt"), "not code").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules").join("c.ts"), "ignored").unwrap();

        let extensions = vec!["ts".to_string()];
        let ignore = vec!["node_modules/**".to_string()];
        let files = scan(dir.path(), &extensions, &ignore).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, dir.path().join("a.ts"));
    }

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "const a = 1;").unwrap();
        let extensions = vec!["ts".to_string()];

        let first = scan(dir.path(), &extensions, &[]).unwrap();
        let second = scan(dir.path(), &extensions, &[]).unwrap();
        assert_eq!(first[0].hash, second[0].hash);
        assert_eq!(first[0].hash.len(), 16);

        fs::write(dir.path().join("a.ts"), "const a = 2;").unwrap();
        let third = scan(dir.path(), &extensions, &[]).unwrap();
        assert_ne!(first[0].hash, third[0].hash);
    }

    #[test]
    fn scan_rejects_non_directory_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.ts");
        fs::write(&file, "x").unwrap();
        let result = scan(&file, &[], &[]);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
