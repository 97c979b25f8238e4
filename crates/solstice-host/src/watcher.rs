//! Filesystem observation and event normalization.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::HostResult;
use crate::path::is_watched_artifact;

/// Normalized artifact event, as consumed by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactEvent {
    /// The artifact appeared or changed; a (debounced) reload is due.
    Reload(PathBuf),

    /// The artifact went away; an immediate unload is due.
    Unload(PathBuf),
}

/// Watches the plugin directory and forwards normalized events. Dropping
/// the watcher stops the stream.
pub struct PluginWatcher {
    // Kept alive for the watch registration; events arrive on the
    // notify callback thread and cross into the runtime over the
    // channel.
    _watcher: RecommendedWatcher,
}

impl PluginWatcher {
    /// Watch a directory (non-recursive; subdirectories are not
    /// scanned). Returns the watcher guard and the event stream.
    pub fn watch(directory: &Path) -> HostResult<(Self, UnboundedReceiver<ArtifactEvent>)> {
        let (tx, rx) = unbounded_channel();
        let sender: UnboundedSender<ArtifactEvent> = tx;

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for normalized in normalize(&event) {
                        let path = match &normalized {
                            ArtifactEvent::Reload(p) | ArtifactEvent::Unload(p) => p,
                        };
                        if !is_watched_artifact(path) {
                            continue;
                        }
                        // The receiver is gone during shutdown; nothing
                        // left to notify.
                        let _ = sender.send(normalized);
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "file watcher error");
                }
            }
        })?;

        watcher.watch(directory, RecursiveMode::NonRecursive)?;
        tracing::info!(directory = %directory.display(), "watching plugin directory");

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Map a raw notification onto artifact events.
///
/// Renames count as an update of the destination: the old name is
/// unloaded and the new name reloaded, unconditionally for every host
/// variant.
pub(crate) fn normalize(event: &Event) -> Vec<ArtifactEvent> {
    match event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => event
            .paths
            .iter()
            .map(|p| ArtifactEvent::Reload(p.clone()))
            .collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut events = Vec::new();
            if let Some(old) = event.paths.first() {
                events.push(ArtifactEvent::Unload(old.clone()));
            }
            if let Some(new) = event.paths.get(1) {
                events.push(ArtifactEvent::Reload(new.clone()));
            }
            events
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| ArtifactEvent::Unload(p.clone()))
            .collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|p| ArtifactEvent::Reload(p.clone()))
            .collect(),

        // Data, metadata, size, last-write: all reloads.
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| ArtifactEvent::Reload(p.clone()))
            .collect(),

        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| ArtifactEvent::Unload(p.clone()))
            .collect(),

        EventKind::Create(CreateKind::Folder) | EventKind::Create(CreateKind::Other) => Vec::new(),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::loadable_extension;
    use notify::event::{DataChange, MetadataKind, RemoveKind};

    fn artifact(name: &str) -> PathBuf {
        PathBuf::from(format!("/plugins/{name}.{}", loadable_extension()))
    }

    fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        let mut event = Event::new(kind);
        event.paths = paths;
        event
    }

    #[test]
    fn created_and_modified_become_reloads() {
        let path = artifact("a");

        let created = event(EventKind::Create(CreateKind::File), vec![path.clone()]);
        assert_eq!(normalize(&created), vec![ArtifactEvent::Reload(path.clone())]);

        let written = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec![path.clone()],
        );
        assert_eq!(normalize(&written), vec![ArtifactEvent::Reload(path.clone())]);

        let touched = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            vec![path.clone()],
        );
        assert_eq!(normalize(&touched), vec![ArtifactEvent::Reload(path)]);
    }

    #[test]
    fn deletion_becomes_an_unload() {
        let path = artifact("a");
        let removed = event(EventKind::Remove(RemoveKind::File), vec![path.clone()]);
        assert_eq!(normalize(&removed), vec![ArtifactEvent::Unload(path)]);
    }

    #[test]
    fn rename_unloads_old_and_reloads_new() {
        let old = artifact("a");
        let new = artifact("a_v2");

        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![old.clone(), new.clone()],
        );
        assert_eq!(
            normalize(&renamed),
            vec![ArtifactEvent::Unload(old), ArtifactEvent::Reload(new)]
        );
    }

    #[test]
    fn split_rename_halves_map_individually() {
        let old = artifact("a");
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            vec![old.clone()],
        );
        assert_eq!(normalize(&from), vec![ArtifactEvent::Unload(old)]);

        let new = artifact("b");
        let to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            vec![new.clone()],
        );
        assert_eq!(normalize(&to), vec![ArtifactEvent::Reload(new)]);
    }

    #[test]
    fn access_events_are_ignored() {
        let read = event(
            EventKind::Access(notify::event::AccessKind::Read),
            vec![artifact("a")],
        );
        assert!(normalize(&read).is_empty());
    }
}
