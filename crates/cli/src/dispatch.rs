use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use dropwatch_registry::{DebounceRegistry, FilesetResolver};
use dropwatch_watch::{CanonicalEvent, EventSink, PathFilter, WatchId};

/// The single boundary between the watch layer and the debounce registry:
/// filter the changed path, resolve its membership, update the registry.
pub struct EventDispatcher {
    filter: PathFilter,
    resolver: Arc<dyn FilesetResolver>,
    registry: DebounceRegistry,
    wait: Duration,
    /// Registry contract violations are programming errors. They are
    /// reported here so the daemon can fail fast while the delivery task
    /// itself stays alive long enough to report them.
    fatal: mpsc::Sender<String>,
}

impl EventDispatcher {
    pub fn new(
        filter: PathFilter,
        resolver: Arc<dyn FilesetResolver>,
        registry: DebounceRegistry,
        wait: Duration,
        fatal: mpsc::Sender<String>,
    ) -> Self {
        Self {
            filter,
            resolver,
            registry,
            wait,
            fatal,
        }
    }
}

impl EventSink for EventDispatcher {
    fn on_events(&self, watch: WatchId, events: &[(PathBuf, CanonicalEvent)]) {
        for (path, event) in events {
            match event {
                // Deletions never feed the registry: a unit that stops
                // existing simply stops being refreshed. Entries already
                // pending for it fire and fail at import time.
                CanonicalEvent::Delete => {
                    log::debug!("{watch:?}: {} deleted", path.display());
                }
                CanonicalEvent::Create | CanonicalEvent::Modify => {
                    if !self.filter.admits(path) {
                        continue;
                    }
                    let resolved = self.resolver.resolve(path);
                    if resolved.is_empty() {
                        log::debug!("{} is not part of a recognized unit yet", path.display());
                        continue;
                    }
                    if let Err(err) = self.registry.update(resolved, self.wait) {
                        log::error!("registry rejected update for {}: {err}", path.display());
                        let _ = self.fatal.try_send(err.to_string());
                    }
                }
            }
        }
    }
}
