use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{path::Path, sync::Arc};

use super::hub::{FsEvent, FsEventHub, FsEventKind};

/// Recursive watch over the directory holding the flag file.
///
/// Create and modify notifications are forwarded to the filesystem hub; all
/// other kinds are dropped. The watch stops when this value is dropped.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    pub fn start(directory: &Path, hub: Arc<FsEventHub>) -> Result<Self> {
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        let Some(kind) = classify(&event.kind) else {
                            return;
                        };
                        for path in event.paths {
                            hub.publish(&FsEvent { kind, path });
                        }
                    }
                    Err(e) => log::warn!("Watch error: {e}"),
                }
            })
            .context("Failed to create filesystem watcher")?;

        watcher
            .watch(directory, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", directory.display()))?;
        log::info!("👀 Watching {} for state changes", directory.display());

        Ok(Self { _watcher: watcher })
    }
}

fn classify(kind: &EventKind) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Created),
        EventKind::Modify(_) => Some(FsEventKind::Modified),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_only_create_and_modify_are_forwarded() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(FsEventKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Any)),
            Some(FsEventKind::Modified)
        );
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), None);
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let hub = Arc::new(FsEventHub::new());
        assert!(DirectoryWatcher::start(&missing, hub).is_err());
    }
}
