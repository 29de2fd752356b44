use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::backend::WatchBackend;
use crate::error::{Result, WatchError};
use crate::events::{strip_unresolved_marker, CanonicalEvent, RawEvent, RawKind, WatchId};

/// Per-event-type delivery selection for a base watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    pub create: bool,
    pub modify: bool,
    pub delete: bool,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            create: true,
            modify: true,
            delete: true,
        }
    }
}

impl EventFilter {
    pub fn allows(&self, event: CanonicalEvent) -> bool {
        match event {
            CanonicalEvent::Create => self.create,
            CanonicalEvent::Modify => self.modify,
            CanonicalEvent::Delete => self.delete,
        }
    }
}

/// The watch layer's single upward entry point.
pub trait EventSink: Send + Sync {
    fn on_events(&self, watch: WatchId, events: &[(PathBuf, CanonicalEvent)]);
}

/// Parameters of one tracked directory. Auto-added children copy the record
/// of their nearest watched ancestor.
#[derive(Debug, Clone)]
struct WatchRecord {
    watch: WatchId,
    filter: EventFilter,
    recursive: bool,
    auto_add: bool,
}

struct WatchState<B> {
    backend: B,
    records: HashMap<PathBuf, WatchRecord>,
}

/// Maintains the table of active directory watches and converts raw
/// notifications into canonical events.
///
/// All table mutation goes through one mutex: setup-time calls and the
/// delivery task (which re-enters through auto-add) interleave safely. The
/// sink is always invoked with the lock released.
pub struct WatchManager<B: WatchBackend> {
    state: Mutex<WatchState<B>>,
    sink: Arc<dyn EventSink>,
    next_id: AtomicU64,
}

impl<B: WatchBackend> WatchManager<B> {
    pub fn new(backend: B, sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: Mutex::new(WatchState {
                backend,
                records: HashMap::new(),
            }),
            sink,
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WatchState<B>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Establish a root watch. When `recursive`, every subdirectory that
    /// exists now is registered with the same parameters; a child that
    /// fails to register is logged and skipped, the root itself is not.
    pub fn add_base_watch(
        &self,
        path: &Path,
        filter: EventFilter,
        recursive: bool,
        auto_add: bool,
    ) -> Result<WatchId> {
        if !path.is_dir() {
            return Err(WatchError::NotADirectory(path.to_path_buf()));
        }
        let watch = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = WatchRecord {
            watch,
            filter,
            recursive,
            auto_add,
        };

        let mut state = self.lock();
        state.backend.watch(path)?;
        state.records.insert(path.to_path_buf(), record.clone());

        if recursive {
            for entry in WalkDir::new(path)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_dir() {
                    continue;
                }
                let dir = entry.path();
                if let Err(err) = state.backend.watch(dir) {
                    log::warn!("skipping subdirectory {}: {err}", dir.display());
                    continue;
                }
                state.records.insert(dir.to_path_buf(), record.clone());
            }
        }

        log::debug!(
            "base watch {:?} on {} ({} dir(s) tracked)",
            watch,
            path.display(),
            state.records.len()
        );
        Ok(watch)
    }

    /// Idempotent: an already-watched directory is a no-op. Parameters are
    /// copied from the nearest watched ancestor's record; existing children
    /// are registered too when the inherited recursive flag is set.
    pub fn add_watch(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        add_watch_locked(&mut state, path)
    }

    /// Cancel the watch for `path` and every tracked descendant. Failures
    /// are logged and skipped: this can run on the delivery task, which is
    /// the sole source of future triggers and must never be brought down.
    pub fn remove_watch(&self, path: &Path) {
        let mut state = self.lock();
        remove_watch_locked(&mut state, path);
    }

    /// Translate one raw notification into canonical events, maintaining
    /// the watch table on the way. Delivery-loop entry point; infallible
    /// for the same reason `remove_watch` is.
    pub fn handle_raw(&self, raw: RawEvent) {
        let path = strip_unresolved_marker(&raw.path);
        let mut batch: Vec<(PathBuf, CanonicalEvent)> = Vec::new();

        let (watch, filter) = {
            let mut state = self.lock();
            let Some(gov) = governing(&state.records, &path).cloned() else {
                log::debug!("event for untracked path {}; ignoring", path.display());
                return;
            };

            match raw.kind {
                // Bounded log volume: these carry no import-relevant change.
                RawKind::Metadata
                | RawKind::Open
                | RawKind::CloseNoWrite
                | RawKind::Access
                | RawKind::RootGone => return,

                RawKind::Create | RawKind::RenameIn => {
                    let is_dir = raw.is_dir.unwrap_or_else(|| path.is_dir());
                    batch.push((path.clone(), CanonicalEvent::Create));
                    if is_dir && gov.auto_add {
                        adopt_directory(&mut state, &path, &mut batch);
                    }
                }

                RawKind::Modify | RawKind::CloseWrite => {
                    let is_dir = raw.is_dir.unwrap_or_else(|| path.is_dir());
                    if !is_dir {
                        batch.push((path.clone(), CanonicalEvent::Modify));
                    }
                }

                RawKind::Remove | RawKind::RenameOut => {
                    let was_dir = raw
                        .is_dir
                        .unwrap_or_else(|| state.records.contains_key(&path));
                    batch.push((path.clone(), CanonicalEvent::Delete));
                    if was_dir {
                        // Files inside are not individually reported.
                        remove_watch_locked(&mut state, &path);
                    }
                }
            }

            (gov.watch, gov.filter)
        };

        batch.retain(|(_, event)| filter.allows(*event));
        if !batch.is_empty() {
            self.sink.on_events(watch, &batch);
        }
    }

    /// Number of directories currently tracked.
    pub fn tracked_dirs(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.lock().records.contains_key(path)
    }
}

/// Drive a manager from a backend's raw event stream until the channel
/// closes.
pub fn spawn_delivery_loop<B>(
    manager: Arc<WatchManager<B>>,
    mut raw_rx: mpsc::Receiver<RawEvent>,
) -> JoinHandle<()>
where
    B: WatchBackend + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(raw) = raw_rx.recv().await {
            manager.handle_raw(raw);
        }
        log::debug!("raw event channel closed; delivery loop ending");
    })
}

fn governing<'a>(
    records: &'a HashMap<PathBuf, WatchRecord>,
    path: &Path,
) -> Option<&'a WatchRecord> {
    path.ancestors().find_map(|anc| records.get(anc))
}

fn inherited_record<B>(state: &WatchState<B>, path: &Path) -> Result<WatchRecord> {
    path.parent()
        .and_then(|parent| governing(&state.records, parent))
        .cloned()
        .ok_or_else(|| WatchError::NoWatchedAncestor(path.to_path_buf()))
}

fn add_watch_locked<B: WatchBackend>(state: &mut WatchState<B>, path: &Path) -> Result<()> {
    if state.records.contains_key(path) {
        return Ok(());
    }
    let record = inherited_record(state, path)?;
    state.backend.watch(path)?;
    state.records.insert(path.to_path_buf(), record.clone());

    if record.recursive {
        for entry in WalkDir::new(path)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();
            if state.records.contains_key(dir) {
                continue;
            }
            if let Err(err) = state.backend.watch(dir) {
                log::warn!("skipping subdirectory {}: {err}", dir.display());
                continue;
            }
            state.records.insert(dir.to_path_buf(), record.clone());
        }
    }
    Ok(())
}

fn remove_watch_locked<B: WatchBackend>(state: &mut WatchState<B>, path: &Path) {
    let doomed: Vec<PathBuf> = state
        .records
        .keys()
        .filter(|tracked| tracked.starts_with(path))
        .cloned()
        .collect();
    for dir in doomed {
        state.records.remove(&dir);
        if let Err(err) = state.backend.unwatch(&dir) {
            log::warn!("failed to unwatch {}: {err}", dir.display());
        }
    }
}

/// Register a newly created directory and report everything it already
/// contains: content can land between the mkdir notification and the watch
/// being in place, and those files produce no events of their own.
fn adopt_directory<B: WatchBackend>(
    state: &mut WatchState<B>,
    dir: &Path,
    batch: &mut Vec<(PathBuf, CanonicalEvent)>,
) {
    let record = match inherited_record(state, dir) {
        Ok(record) => record,
        Err(err) => {
            log::warn!("cannot adopt {}: {err}", dir.display());
            return;
        }
    };
    if let Err(err) = add_watch_locked(state, dir) {
        log::warn!("cannot adopt {}: {err}", dir.display());
        return;
    }

    let walker = if record.recursive {
        WalkDir::new(dir).min_depth(1)
    } else {
        WalkDir::new(dir).min_depth(1).max_depth(1)
    };
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        batch.push((entry.path().to_path_buf(), CanonicalEvent::Create));
    }
}
