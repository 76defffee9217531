//! Ingestion orchestrator (C6, spec §4.6). Owns the scan -> diff -> extract
//! -> resolve -> persist pipeline for a whole project, and the single-file
//! fast path the watcher drives. Whole-project ingest is not atomic as a
//! unit — it is a composition of file-atomic steps (spec §5); a crash
//! mid-run leaves already-persisted files durable and the rest untouched.

use std::path::{Path, PathBuf};
use std::time::Instant;

use codegraph_core::{CoreError, CoreResult, EdgeKind, FileEntities, GraphNode, GraphStore, NodeId, NodeKind, Project};

use crate::change_detector::{self, FileChangeKind, StoredFile};
use crate::config::{self, IndexerConfig};
use crate::extractor::ExtractedFile;
use crate::languages;
use crate::parser_pool::{create_parser_pool, ParserPool};
use crate::scanner;
use crate::symbols::SymbolRegistry;

#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub files: usize,
    pub entities: usize,
    pub edges: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub stats: IngestStats,
    pub errors: Vec<FileError>,
}

pub struct Coordinator {
    store: GraphStore,
    parser_pool: ParserPool,
}

impl Coordinator {
    pub fn new(store: GraphStore) -> Self {
        Coordinator { store, parser_pool: create_parser_pool() }
    }

    /// Full-project ingest, spec §4.6 steps 1-9: verify the root, diff
    /// against the stored hash set, parse everything added/modified/renamed,
    /// sweep deleted files, resolve symbols in two passes, then persist.
    pub async fn ingest_project(&self, root: &Path, config: &IndexerConfig) -> CoreResult<IngestReport> {
        let started = Instant::now();
        if !root.is_dir() {
            return Err(CoreError::Validation(format!("{} is not a directory", root.display())));
        }

        let project = match self.store.get_project_by_root(root).await? {
            Some(p) => p,
            None => self.store.upsert_project(Project::new(root.to_path_buf())).await?,
        };

        let stored = self.load_stored_hashes(&project.id).await?;
        let scanned = scanner::scan(root, &config.extensions, &config.effective_ignore_globs())?;
        let changes = change_detector::detect_changes(&stored, &scanned);

        let mut report = IngestReport::default();

        // A rename swaps the structural id of every entity in the renamed
        // file (ids are keyed on file path), so the edges an unchanged
        // caller file held into the old path are orphaned by the delete
        // sweep below and never regenerated unless that caller is
        // re-parsed this round too (spec §8.9: edges must follow the
        // rename). Find every unchanged file with an edge into a renamed
        // path *before* the delete sweep removes the old path's nodes (and
        // with them, the very edges this lookup needs to see).
        let old_paths: Vec<PathBuf> = changes
            .renamed
            .iter()
            .filter_map(|c| match &c.kind {
                FileChangeKind::Renamed { old_path } => Some(old_path.clone()),
                _ => None,
            })
            .collect();
        let caller_paths = if old_paths.is_empty() {
            Vec::new()
        } else {
            self.callers_of(&old_paths, &std::collections::HashSet::new()).await
        };

        for path in changes.to_delete() {
            if let Err(e) = self.store.delete_file_entities(&path).await {
                report.errors.push(FileError { path, message: e.to_string() });
            }
        }

        let mut extracted: Vec<(PathBuf, String, ExtractedFile)> = Vec::new();
        for change in changes.to_parse() {
            match self.extract_file(&change.path) {
                Ok(file) => extracted.push((change.path.clone(), change.hash.clone(), file)),
                Err(e) => report.errors.push(FileError { path: change.path.clone(), message: e.to_string() }),
            }
        }

        let already_parsed: std::collections::HashSet<PathBuf> =
            extracted.iter().map(|(p, _, _)| p.clone()).collect();
        for path in caller_paths {
            if already_parsed.contains(&path) {
                continue;
            }
            let hash = scanned
                .iter()
                .find(|s| s.path == path)
                .map(|s| s.hash.clone())
                .unwrap_or_default();
            match self.extract_file(&path) {
                Ok(file) => extracted.push((path, hash, file)),
                Err(e) => report.errors.push(FileError { path, message: e.to_string() }),
            }
        }

        // Pass 1: index every entity already in the graph (unchanged files)
        // plus every entity freshly extracted this run, so pass 2 can resolve
        // a call into a file that didn't change this round.
        let mut registry = SymbolRegistry::new();
        {
            let graph = self.store.read().await;
            for node in graph.all_nodes() {
                if matches!(node.kind, NodeKind::File | NodeKind::Project | NodeKind::Import) {
                    continue;
                }
                registry.register(node);
            }
        }
        for (path, _, file) in &extracted {
            for entity in &file.entities {
                registry.register(entity);
            }
            registry.register_imports(path, &file.imports, &config.extensions);
        }

        // Pass 2: resolve and persist, one file at a time.
        for (path, hash, file) in extracted {
            let mut entities = file.entities;
            let mut edges = file.edges;
            let resolved = registry.resolve(&path, &file.unresolved, config.include_externals, config::builtin_denylist());
            edges.extend(resolved);
            if !config.deep_analysis {
                edges.retain(|e| !matches!(e.kind, EdgeKind::Calls | EdgeKind::Renders));
            }
            for import in file.imports {
                entities.push(import.node);
            }

            report.stats.entities += entities.len();
            report.stats.edges += edges.len();

            let file_node = file_node(&path, &hash);
            let batch = FileEntities { file_path: path.clone(), file_node, entities, edges };
            match self.store.batch_upsert(batch).await {
                Ok(_) => {
                    self.store.link_project_file(&project.id, &path).await?;
                    report.stats.files += 1;
                }
                Err(e) => report.errors.push(FileError { path, message: e.to_string() }),
            }
        }

        let mut project = project;
        project.last_parsed = Some(chrono::Utc::now());
        self.store.upsert_project(project).await?;

        report.stats.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Single-file ingest — the watcher's hot path (spec §4.6: "ingestFile
    /// skips the full scan, change detection, and delete sweep"). Resolves
    /// against the graph's current state plus this file's fresh entities.
    pub async fn ingest_file(&self, root: &Path, path: &Path, config: &IndexerConfig) -> CoreResult<IngestStats> {
        let started = Instant::now();
        let project = self
            .store
            .get_project_by_root(root)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("no project indexed at {}", root.display())))?;

        let content = std::fs::read(path)
            .map_err(|e| CoreError::ParseFailure { path: path.to_path_buf(), message: e.to_string() })?;
        let hash = content_hash(&content);
        let file = self.extract_file(path)?;

        let mut registry = SymbolRegistry::new();
        {
            let graph = self.store.read().await;
            for node in graph.all_nodes() {
                if node.file_path == path || matches!(node.kind, NodeKind::File | NodeKind::Project | NodeKind::Import) {
                    continue;
                }
                registry.register(node);
            }
        }
        for entity in &file.entities {
            registry.register(entity);
        }
        registry.register_imports(path, &file.imports, &config.extensions);

        let resolved = registry.resolve(path, &file.unresolved, config.include_externals, config::builtin_denylist());
        let mut entities = file.entities;
        let mut edges = file.edges;
        edges.extend(resolved);
        if !config.deep_analysis {
            edges.retain(|e| !matches!(e.kind, EdgeKind::Calls | EdgeKind::Renders));
        }
        for import in file.imports {
            entities.push(import.node);
        }

        let stats = IngestStats {
            files: 1,
            entities: entities.len(),
            edges: edges.len(),
            duration_ms: 0,
        };

        let batch = FileEntities { file_path: path.to_path_buf(), file_node: file_node(path, &hash), entities, edges };
        self.store.batch_upsert(batch).await?;
        self.store.link_project_file(&project.id, path).await?;

        Ok(IngestStats { duration_ms: started.elapsed().as_millis() as u64, ..stats })
    }

    /// Files with an edge into any entity under `target_paths`, excluding
    /// the targets themselves and anything already slated for parsing.
    async fn callers_of(&self, target_paths: &[PathBuf], exclude: &std::collections::HashSet<PathBuf>) -> Vec<PathBuf> {
        let graph = self.store.read().await;
        let mut callers = std::collections::HashSet::new();
        for node in graph.all_nodes().filter(|n| target_paths.contains(&n.file_path)) {
            for edge in graph.edges_to(&node.id) {
                let Some(source) = graph.node(&edge.source) else { continue };
                if !target_paths.contains(&source.file_path) && !exclude.contains(&source.file_path) {
                    callers.insert(source.file_path.clone());
                }
            }
        }
        callers.into_iter().collect()
    }

    fn extract_file(&self, path: &Path) -> CoreResult<ExtractedFile> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::ParseFailure { path: path.to_path_buf(), message: e.to_string() })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let extractor = languages::for_extension(ext, &self.parser_pool);
        extractor.extract(path, &content)
    }

    async fn load_stored_hashes(&self, project_id: &str) -> CoreResult<Vec<StoredFile>> {
        let graph = self.store.read().await;
        let project_node = NodeId::project(project_id);
        Ok(graph
            .edges_from(&project_node)
            .filter(|e| e.kind == EdgeKind::ContainsFile)
            .filter_map(|e| graph.node(&e.target))
            .filter(|n| n.kind == NodeKind::File)
            .map(|n| StoredFile {
                path: n.file_path.clone(),
                hash: n.metadata.get("hash").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            })
            .collect())
    }
}

fn file_node(path: &Path, hash: &str) -> GraphNode {
    GraphNode::new(
        NodeId::file(path),
        NodeKind::File,
        path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        path.to_path_buf(),
    )
    .with_meta("hash", serde_json::json!(hash))
}

fn content_hash(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.finalize().iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_core::test_utils::create_repo_with_structure;
    use std::fs;

    fn write_project(extra_files: &[(&str, &str)]) -> tempfile::TempDir {
        create_repo_with_structure(extra_files)
    }

    #[tokio::test]
    async fn fresh_ingest_indexes_functions_and_calls() {
        let dir = write_project(&[(
            "main.js",
            "function helper() { return 1; }\nfunction main() { return helper(); }\n",
        )]);
        let store = GraphStore::new();
        let coordinator = Coordinator::new(store.clone());
        let config = IndexerConfig::default();

        let report = coordinator.ingest_project(dir.path(), &config).await.unwrap();
        assert_eq!(report.stats.files, 1);
        assert!(report.errors.is_empty());

        let graph = store.read().await;
        let functions: Vec<_> = graph.nodes_of_kind(NodeKind::Function).collect();
        assert_eq!(functions.len(), 2);
    }

    #[tokio::test]
    async fn reingest_is_idempotent_on_unchanged_content() {
        let dir = write_project(&[("a.js", "function a() {}\n")]);
        let store = GraphStore::new();
        let coordinator = Coordinator::new(store.clone());
        let config = IndexerConfig::default();

        coordinator.ingest_project(dir.path(), &config).await.unwrap();
        let before = store.node_count().await;
        coordinator.ingest_project(dir.path(), &config).await.unwrap();
        let after = store.node_count().await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn deleted_file_sweeps_its_entities() {
        let dir = write_project(&[("a.js", "function a() {}\n")]);
        let store = GraphStore::new();
        let coordinator = Coordinator::new(store.clone());
        let config = IndexerConfig::default();

        coordinator.ingest_project(dir.path(), &config).await.unwrap();
        assert!(store.node_count().await > 0);

        fs::remove_file(dir.path().join("a.js")).unwrap();
        let report = coordinator.ingest_project(dir.path(), &config).await.unwrap();
        assert_eq!(report.stats.files, 0);

        let graph = store.read().await;
        assert_eq!(graph.nodes_of_kind(NodeKind::Function).count(), 0);
    }

    #[tokio::test]
    async fn rename_preserves_calls_edge_from_untouched_caller() {
        let dir = write_project(&[
            ("a.js", "function foo() { return bar(); }\n"),
            ("b.js", "function bar() { return 1; }\n"),
        ]);
        let store = GraphStore::new();
        let coordinator = Coordinator::new(store.clone());
        let mut config = IndexerConfig::default();
        config.deep_analysis = true;

        coordinator.ingest_project(dir.path(), &config).await.unwrap();
        {
            let graph = store.read().await;
            let bar = graph.nodes_of_kind(NodeKind::Function).find(|n| n.name == "bar").unwrap();
            assert_eq!(graph.edges_to(&bar.id).filter(|e| e.kind == EdgeKind::Calls).count(), 1);
        }

        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::rename(dir.path().join("b.js"), dir.path().join("lib/b.js")).unwrap();

        let report = coordinator.ingest_project(dir.path(), &config).await.unwrap();
        assert!(report.errors.is_empty());

        let graph = store.read().await;
        let bar = graph
            .nodes_of_kind(NodeKind::Function)
            .find(|n| n.name == "bar")
            .expect("bar survives the rename");
        assert_eq!(bar.file_path, dir.path().join("lib/b.js"));

        let callers: Vec<_> = graph.edges_to(&bar.id).filter(|e| e.kind == EdgeKind::Calls).collect();
        assert_eq!(callers.len(), 1, "the CALLS edge from foo must survive the rename");
        let foo = graph.node(&callers[0].source).unwrap();
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.file_path, dir.path().join("a.js"));
    }

    #[tokio::test]
    async fn unparseable_extension_preserves_previous_state_and_reports_error() {
        let dir = write_project(&[("a.js", "function a() {}\n"), ("notes.md", "# hi")]);
        let store = GraphStore::new();
        let coordinator = Coordinator::new(store.clone());
        let mut config = IndexerConfig::default();
        config.extensions.push("md".to_string());

        let report = coordinator.ingest_project(dir.path(), &config).await.unwrap();
        assert_eq!(report.stats.files, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, dir.path().join("notes.md"));
    }
}
