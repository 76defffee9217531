//! Workspace/monorepo detection (spec supplement: record the build-tool
//! convention a project root uses on its `Project` node's metadata —
//! informational only, doesn't change graph semantics).

use std::path::Path;

/// Detect which build-tool convention a project root uses, by the presence
/// of its manifest file. Checked in a fixed order so a root carrying more
/// than one (e.g. a Cargo crate with a `package.json` for tooling) reports
/// the first match deterministically.
pub fn detect_workspace(root: &Path) -> Option<WorkspaceType> {
    if root.join("Cargo.toml").exists() {
        Some(WorkspaceType::Cargo)
    } else if root.join("package.json").exists() {
        Some(WorkspaceType::Npm)
    } else if root.join("go.mod").exists() {
        Some(WorkspaceType::GoModules)
    } else if root.join("pom.xml").exists() {
        Some(WorkspaceType::Maven)
    } else if root.join("build.gradle").exists() || root.join("build.gradle.kts").exists() {
        Some(WorkspaceType::Gradle)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkspaceType {
    Cargo,
    Npm,
    GoModules,
    Maven,  // pom.xml
    Gradle, // build.gradle
}

impl WorkspaceType {
    pub fn label(&self) -> &'static str {
        match self {
            WorkspaceType::Cargo => "cargo",
            WorkspaceType::Npm => "npm",
            WorkspaceType::GoModules => "go-modules",
            WorkspaceType::Maven => "maven",
            WorkspaceType::Gradle => "gradle",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "cargo" => Some(WorkspaceType::Cargo),
            "npm" => Some(WorkspaceType::Npm),
            "go-modules" => Some(WorkspaceType::GoModules),
            "maven" => Some(WorkspaceType::Maven),
            "gradle" => Some(WorkspaceType::Gradle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cargo_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").unwrap();
        assert_eq!(detect_workspace(dir.path()), Some(WorkspaceType::Cargo));
    }

    #[test]
    fn detects_npm_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(detect_workspace(dir.path()), Some(WorkspaceType::Npm));
    }

    #[test]
    fn no_manifest_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_workspace(dir.path()), None);
    }

    #[test]
    fn label_round_trips() {
        for wt in [WorkspaceType::Cargo, WorkspaceType::Npm, WorkspaceType::GoModules, WorkspaceType::Maven, WorkspaceType::Gradle] {
            assert_eq!(WorkspaceType::from_label(wt.label()), Some(wt));
        }
    }
}
