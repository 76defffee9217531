//! Low-level filesystem watch: wraps `notify` and turns its events into a
//! simple created/modified/removed stream, filtered to code files and with
//! VCS/build directories skipped before they ever reach a channel.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Thin wrapper over `notify::RecommendedWatcher`. `notify`'s callback runs
/// on its own thread; everything it sees gets relayed onto an unbounded
/// channel this struct owns the receiving end of.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let event_tx_clone = event_tx.clone();
        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                debug!("file system event: {:?}", event);
                Self::handle_notify_event(event, &event_tx_clone);
            }
            Err(e) => error!("file system watch error: {e}"),
        })?;

        Ok(Self { watcher, event_rx, watched_paths: HashSet::new(), root_path })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let wrap: fn(PathBuf) -> WatchEvent = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if should_ignore_path(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(wrap(path)) {
                warn!("failed to send watch event: {e}");
            }
        }
    }

    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.watcher.unwatch(path)?;
        self.watched_paths.remove(path);
        Ok(())
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }
}

/// Extensions the orchestrator has a reference plugin for, plus the ones
/// routed to the generic (`ParseFailure`) fallback — both still worth
/// watching, since a generic-fallback edit still needs its File node touched.
pub fn is_code_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| extensions.iter().any(|e| e == ext))
        .unwrap_or(false)
}

pub fn should_ignore_path(path: &Path) -> bool {
    for component in path.components() {
        if let Some(name) = component.as_os_str().to_str() {
            if matches!(name, "target" | ".git" | "node_modules" | ".codegraph") {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_watcher_creation_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let watcher = FileWatcher::new(temp_dir.path());
        assert!(watcher.is_ok());
    }

    #[test]
    fn is_code_file_matches_configured_extensions() {
        let extensions = vec!["ts".to_string(), "js".to_string()];
        assert!(is_code_file(Path::new("main.ts"), &extensions));
        assert!(!is_code_file(Path::new("readme.md"), &extensions));
    }

    #[test]
    fn ignores_build_and_vcs_directories() {
        assert!(should_ignore_path(Path::new("/repo/target/debug/out.js")));
        assert!(should_ignore_path(Path::new("/repo/node_modules/x/index.js")));
        assert!(!should_ignore_path(Path::new("/repo/src/main.js")));
    }
}
