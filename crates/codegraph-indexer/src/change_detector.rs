//! Change detection (C2, spec §4.2): join the stored hash set against a
//! fresh scan, then fold matching-hash add/delete pairs into renames.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::scanner::ScannedFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed { old_path: PathBuf },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: FileChangeKind,
    pub hash: String,
    pub previous_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSummary {
    pub added: Vec<FileChange>,
    pub modified: Vec<FileChange>,
    pub deleted: Vec<FileChange>,
    pub renamed: Vec<FileChange>,
    pub unchanged: Vec<FileChange>,
}

impl ChangeSummary {
    /// Files that need (re-)parsing: added, modified, and the new side of a
    /// rename (its content did not change, but its entities' `filePath`
    /// metadata did, so C3 still has to re-run on it).
    pub fn to_parse(&self) -> Vec<&FileChange> {
        self.added.iter().chain(self.modified.iter()).chain(self.renamed.iter()).collect()
    }

    /// File paths whose entities must be swept from the graph: true deletes,
    /// plus the old side of a rename.
    pub fn to_delete(&self) -> Vec<PathBuf> {
        self.deleted
            .iter()
            .map(|c| c.path.clone())
            .chain(self.renamed.iter().filter_map(|c| match &c.kind {
                FileChangeKind::Renamed { old_path } => Some(old_path.clone()),
                _ => None,
            }))
            .collect()
    }
}

/// Join `stored` (the hash set from the previous ingest) against `current`
/// (a fresh `scanner::scan` result), then fold same-hash add/delete pairs
/// into renames using deterministic first-unused-pair matching over paths
/// sorted lexicographically, so the result never depends on walk order.
pub fn detect_changes(stored: &[StoredFile], current: &[ScannedFile]) -> ChangeSummary {
    let stored_by_path: HashMap<&PathBuf, &str> = stored.iter().map(|f| (&f.path, f.hash.as_str())).collect();
    let current_by_path: HashMap<&PathBuf, &str> = current.iter().map(|f| (&f.path, f.hash.as_str())).collect();

    let mut summary = ChangeSummary::default();
    let mut tentative_added: Vec<ScannedFile> = Vec::new();
    let mut tentative_deleted: Vec<StoredFile> = Vec::new();

    for file in current {
        match stored_by_path.get(&file.path) {
            Some(&old_hash) if old_hash == file.hash => summary.unchanged.push(FileChange {
                path: file.path.clone(),
                kind: FileChangeKind::Unchanged,
                hash: file.hash.clone(),
                previous_hash: Some(old_hash.to_string()),
            }),
            Some(&old_hash) => summary.modified.push(FileChange {
                path: file.path.clone(),
                kind: FileChangeKind::Modified,
                hash: file.hash.clone(),
                previous_hash: Some(old_hash.to_string()),
            }),
            None => tentative_added.push(file.clone()),
        }
    }

    for file in stored {
        if !current_by_path.contains_key(&file.path) {
            tentative_deleted.push(file.clone());
        }
    }

    tentative_added.sort_by(|a, b| a.path.cmp(&b.path));
    tentative_deleted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut matched_deleted = vec![false; tentative_deleted.len()];
    for added in tentative_added {
        let candidate = tentative_deleted
            .iter()
            .enumerate()
            .find(|(i, deleted)| !matched_deleted[*i] && deleted.hash == added.hash);
        match candidate {
            Some((i, deleted)) => {
                matched_deleted[i] = true;
                summary.renamed.push(FileChange {
                    path: added.path,
                    kind: FileChangeKind::Renamed { old_path: deleted.path.clone() },
                    hash: added.hash,
                    previous_hash: Some(deleted.hash.clone()),
                });
            }
            None => summary.added.push(FileChange {
                path: added.path,
                kind: FileChangeKind::Added,
                hash: added.hash,
                previous_hash: None,
            }),
        }
    }

    for (i, deleted) in tentative_deleted.into_iter().enumerate() {
        if !matched_deleted[i] {
            summary.deleted.push(FileChange {
                path: deleted.path,
                kind: FileChangeKind::Deleted,
                hash: deleted.hash.clone(),
                previous_hash: Some(deleted.hash),
            });
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned(path: &str, hash: &str) -> ScannedFile {
        ScannedFile { path: PathBuf::from(path), hash: hash.to_string() }
    }
    fn stored(path: &str, hash: &str) -> StoredFile {
        StoredFile { path: PathBuf::from(path), hash: hash.to_string() }
    }

    #[test]
    fn detects_added_modified_deleted_unchanged() {
        let before = vec![stored("a.ts", "h1"), stored("b.ts", "h2"), stored("c.ts", "h3")];
        let after = vec![scanned("a.ts", "h1"), scanned("b.ts", "h2-changed"), scanned("d.ts", "h4")];

        let summary = detect_changes(&before, &after);
        assert_eq!(summary.unchanged.len(), 1);
        assert_eq!(summary.modified.len(), 1);
        assert_eq!(summary.added.len(), 1);
        assert_eq!(summary.deleted.len(), 1);
        assert_eq!(summary.deleted[0].path, PathBuf::from("c.ts"));
    }

    #[test]
    fn same_hash_add_delete_pair_becomes_rename() {
        let before = vec![stored("old/name.ts", "hsame")];
        let after = vec![scanned("new/name.ts", "hsame")];

        let summary = detect_changes(&before, &after);
        assert!(summary.added.is_empty());
        assert!(summary.deleted.is_empty());
        assert_eq!(summary.renamed.len(), 1);
        assert_eq!(summary.renamed[0].path, PathBuf::from("new/name.ts"));
        assert_eq!(summary.renamed[0].kind, FileChangeKind::Renamed { old_path: PathBuf::from("old/name.ts") });
    }

    #[test]
    fn rename_matching_is_deterministic_with_duplicate_hashes() {
        let before = vec![stored("a.ts", "dup"), stored("b.ts", "dup")];
        let after = vec![scanned("c.ts", "dup")];

        let summary = detect_changes(&before, &after);
        assert_eq!(summary.renamed.len(), 1);
        assert_eq!(summary.renamed[0].kind, FileChangeKind::Renamed { old_path: PathBuf::from("a.ts") });
        assert_eq!(summary.deleted.len(), 1);
        assert_eq!(summary.deleted[0].path, PathBuf::from("b.ts"));
    }
}
