//! Shared fixtures for tests across the workspace: build a throwaway
//! on-disk project tree so ingestion/extraction tests don't each hand-roll
//! their own `TempDir` + `fs::write` boilerplate.

use std::fs;
use tempfile::TempDir;

/// Materialize `structure` (relative path -> file content) under a fresh
/// temp directory, creating parent directories as needed.
pub fn create_repo_with_structure(structure: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    for (path, content) in structure {
        let full_path = root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
    }

    temp_dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_nested_files_under_a_temp_root() {
        let repo = create_repo_with_structure(&[
            ("src/main.rs", "fn main() {}\n"),
            ("src/lib/helper.rs", "pub fn helper() {}\n"),
        ]);
        let root = repo.path();
        assert!(root.join("src/main.rs").exists());
        assert!(root.join("src/lib/helper.rs").exists());
    }

    #[test]
    fn empty_structure_still_produces_a_usable_root() {
        let repo = create_repo_with_structure(&[]);
        assert!(repo.path().is_dir());
    }
}
