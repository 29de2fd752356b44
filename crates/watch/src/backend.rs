use std::path::Path;

use notify::event::{
    AccessKind, AccessMode, CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode,
};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Result, WatchError};
use crate::events::{RawEvent, RawKind};

/// Minimal capability surface over the platform notification facility.
///
/// One subscription per directory; recursion is the manager's job. Events
/// travel out of band through the channel handed out at construction.
pub trait WatchBackend: Send {
    fn watch(&mut self, dir: &Path) -> Result<()>;
    fn unwatch(&mut self, dir: &Path) -> Result<()>;
}

/// Production backend on `notify`'s recommended platform watcher.
///
/// Raw notifications are translated on the notify callback thread and
/// bridged into a tokio channel; the receiver side is handed to the
/// delivery loop. Dropping the backend stops event delivery.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    pub fn new(capacity: usize) -> Result<(Self, mpsc::Receiver<RawEvent>)> {
        let (tx, rx) = mpsc::channel(capacity);
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for raw in translate(event) {
                        if tx.blocking_send(raw).is_err() {
                            // Receiver dropped: shutting down.
                            return;
                        }
                    }
                }
                Err(err) => log::warn!("notification stream error: {err}"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| WatchError::Backend(format!("watcher init failed: {e}")))?;

        Ok((Self { watcher }, rx))
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, dir: &Path) -> Result<()> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Backend(format!("failed to watch {}: {e}", dir.display())))
    }

    fn unwatch(&mut self, dir: &Path) -> Result<()> {
        self.watcher
            .unwatch(dir)
            .map_err(|e| WatchError::Backend(format!("failed to unwatch {}: {e}", dir.display())))
    }
}

/// Map notify's event taxonomy onto the backend-neutral raw vocabulary.
/// One notify event can carry several paths (renames); each becomes its own
/// `RawEvent`.
fn translate(event: notify::Event) -> Vec<RawEvent> {
    let mut out = Vec::with_capacity(event.paths.len());
    match event.kind {
        EventKind::Create(kind) => {
            let is_dir = match kind {
                CreateKind::Folder => Some(true),
                CreateKind::File => Some(false),
                _ => None,
            };
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::Create,
                    is_dir,
                });
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // Source first, destination second.
            let mut paths = event.paths.into_iter();
            if let Some(from) = paths.next() {
                out.push(RawEvent {
                    path: from,
                    kind: RawKind::RenameOut,
                    is_dir: None,
                });
            }
            if let Some(to) = paths.next() {
                out.push(RawEvent {
                    path: to,
                    kind: RawKind::RenameIn,
                    is_dir: None,
                });
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::RenameOut,
                    is_dir: None,
                });
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::RenameIn,
                    is_dir: None,
                });
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            // Unpaired rename halves: decide by whether the path survived.
            for path in event.paths {
                let kind = if path.exists() {
                    RawKind::RenameIn
                } else {
                    RawKind::RenameOut
                };
                out.push(RawEvent {
                    path,
                    kind,
                    is_dir: None,
                });
            }
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::Metadata,
                    is_dir: None,
                });
            }
        }
        EventKind::Modify(_) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::Modify,
                    is_dir: None,
                });
            }
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::CloseWrite,
                    is_dir: Some(false),
                });
            }
        }
        EventKind::Access(AccessKind::Close(_)) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::CloseNoWrite,
                    is_dir: None,
                });
            }
        }
        EventKind::Access(AccessKind::Open(_)) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::Open,
                    is_dir: None,
                });
            }
        }
        EventKind::Access(_) => {
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: RawKind::Access,
                    is_dir: None,
                });
            }
        }
        EventKind::Remove(kind) => {
            let (raw, is_dir) = match kind {
                RemoveKind::Folder => (RawKind::Remove, Some(true)),
                RemoveKind::File => (RawKind::Remove, Some(false)),
                RemoveKind::Other => (RawKind::RootGone, None),
                _ => (RawKind::Remove, None),
            };
            for path in event.paths {
                out.push(RawEvent {
                    path,
                    kind: raw,
                    is_dir,
                });
            }
        }
        _ => {}
    }
    out
}
