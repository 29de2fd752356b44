use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{RegistryError, Result};
use crate::fileset::Fileset;
use crate::timer::OneshotTimer;

/// Arena identifier of one pending fileset. "Same entry" is an id
/// comparison; path links never alias entry storage directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub u64);

/// Shared debounce state for one fileset: the last-seen member sequence
/// and the single pending timer.
struct Entry {
    key: PathBuf,
    members: Vec<PathBuf>,
    timer: OneshotTimer,
    /// Identifies the currently scheduled firing; a late firing carrying a
    /// stale token lost a race against a reset and is ignored.
    token: u64,
}

struct RegistryState {
    entries: HashMap<EntryId, Entry>,
    paths: HashMap<PathBuf, EntryId>,
    next_entry: u64,
    next_token: u64,
}

/// Coalesces bursts of events per fileset and guarantees at most one
/// pending trigger per fileset at any time.
///
/// Cheap-clone handle over shared state, so timer tasks and the event
/// delivery task can each hold one. Two concurrent sources reach the
/// table: the delivery task (through `update`) and per-entry timer
/// firings. Both take the single state mutex, held only for map mutation
/// — fired filesets are delivered into the channel with the lock
/// released.
#[derive(Clone)]
pub struct DebounceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    state: Mutex<RegistryState>,
    /// Sink for fired filesets. `None` after `stop()`: late firings are
    /// dropped instead of triggering actions during shutdown.
    fired: Mutex<Option<mpsc::Sender<Fileset>>>,
}

impl DebounceRegistry {
    pub fn new(fired: mpsc::Sender<Fileset>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState {
                    entries: HashMap::new(),
                    paths: HashMap::new(),
                    next_entry: 0,
                    next_token: 0,
                }),
                fired: Mutex::new(Some(fired)),
            }),
        }
    }

    /// Register or refresh the pending state of each `(key, members)`
    /// fileset. A fileset touching an already-pending member is coalesced
    /// into that entry: its sequence is replaced and its window restarts.
    ///
    /// Must be called inside a tokio runtime; timers are spawned tasks.
    pub fn update(
        &self,
        filesets: HashMap<PathBuf, Vec<PathBuf>>,
        wait: Duration,
    ) -> Result<()> {
        for (key, members) in filesets {
            self.update_one(key, members, wait)?;
        }
        Ok(())
    }

    fn update_one(&self, key: PathBuf, members: Vec<PathBuf>, wait: Duration) -> Result<()> {
        if members.is_empty() {
            return Err(RegistryError::EmptySequence(key));
        }
        if !members.contains(&key) {
            return Err(RegistryError::KeyNotMember(key));
        }

        let mut guard = self.inner.lock();
        let state = &mut *guard;

        // Scan the sequence for an already-registered member. Two members
        // linked to different live entries means the caller handed us
        // overlapping filesets; merging them silently could join unrelated
        // imports, so that fails instead.
        let mut found: Option<(PathBuf, EntryId)> = None;
        for member in &members {
            let Some(&id) = state.paths.get(member) else {
                continue;
            };
            if !state.entries.contains_key(&id) {
                // Link left behind by an evicted entry; prune it.
                state.paths.remove(member);
                continue;
            }
            match &found {
                None => found = Some((member.clone(), id)),
                Some((first, prev)) if *prev != id => {
                    return Err(RegistryError::CrossLinked {
                        first: first.clone(),
                        second: member.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        state.next_token += 1;
        let token = state.next_token;

        match found {
            Some((_, id)) => {
                let timer = self.schedule(id, token, wait);
                if let Some(entry) = state.entries.get_mut(&id) {
                    for old in std::mem::take(&mut entry.members) {
                        state.paths.remove(&old);
                    }
                    entry.key = key;
                    entry.members = members.clone();
                    entry.token = token;
                    // Replacing the timer cancels the old schedule.
                    entry.timer = timer;
                }
                for member in members {
                    state.paths.insert(member, id);
                }
            }
            None => {
                let id = EntryId(state.next_entry);
                state.next_entry += 1;
                let timer = self.schedule(id, token, wait);
                for member in &members {
                    state.paths.insert(member.clone(), id);
                }
                state.entries.insert(
                    id,
                    Entry {
                        key,
                        members,
                        timer,
                        token,
                    },
                );
            }
        }
        Ok(())
    }

    fn schedule(&self, id: EntryId, token: u64, wait: Duration) -> OneshotTimer {
        let inner = Arc::clone(&self.inner);
        OneshotTimer::schedule(wait, move || async move {
            inner.fire(id, token).await;
        })
    }

    /// Cancel and unlink one pending fileset. Defensive: the race between
    /// an explicit clear and a firing timer is expected and benign, so a
    /// missing key or an already-evicted entry logs and returns.
    pub fn clear(&self, key: &Path) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let Some(&id) = state.paths.get(key) else {
            log::debug!("clear: {} has no pending fileset", key.display());
            return;
        };
        let Some(entry) = state.entries.remove(&id) else {
            state.paths.remove(key);
            log::debug!("clear: {} pointed at an evicted fileset", key.display());
            return;
        };
        for member in &entry.members {
            state.paths.remove(member);
        }
        // Dropping the entry cancels its timer.
    }

    /// Shutdown: cancel every pending timer, drop all entries, and close
    /// the fired channel so late firings cannot trigger new actions.
    /// In-flight consumers are not interrupted.
    pub fn stop(&self) {
        {
            let mut state = self.inner.lock();
            let pending = state.entries.len();
            state.paths.clear();
            state.entries.clear(); // drops timers, aborting their tasks
            if pending > 0 {
                log::info!("dropped {pending} pending fileset(s) at shutdown");
            }
        }
        *self
            .inner
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of filesets currently pending.
    pub fn pending(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether `path` is linked to a pending fileset.
    pub fn is_pending(&self, path: &Path) -> bool {
        let state = self.inner.lock();
        state
            .paths
            .get(path)
            .is_some_and(|id| state.entries.contains_key(id))
    }
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback: evict first, deliver second. Eviction under the
    /// lock guarantees at most one trigger per fileset state; a reset
    /// racing with this either lands before eviction (the firing becomes
    /// stale) or after (it finds no entry and creates a fresh one).
    async fn fire(&self, id: EntryId, token: u64) {
        let fired = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.entries.get(&id) {
                Some(entry) if entry.token == token => {}
                _ => {
                    log::debug!("stale firing for {id:?}; ignoring");
                    return;
                }
            }
            let Some(entry) = state.entries.remove(&id) else {
                return;
            };
            for member in &entry.members {
                state.paths.remove(member);
            }
            let Entry { key, members, timer, .. } = entry;
            // This is the timer's own task; it must not abort itself
            // before delivery completes.
            timer.disarm();
            Fileset { key, members }
        };

        let sender = self
            .fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sender {
            Some(tx) => {
                if tx.send(fired).await.is_err() {
                    log::warn!("fired fileset dropped: consumer gone");
                }
            }
            None => log::debug!("fired fileset dropped after stop()"),
        }
    }
}
