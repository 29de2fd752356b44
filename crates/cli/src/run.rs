use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;

use dropwatch_import::{CommandAction, ImportInvoker, InvokerConfig, TokenSessionProvider};
use dropwatch_registry::DebounceRegistry;
use dropwatch_watch::{spawn_delivery_loop, NotifyBackend, WatchManager};

use crate::config::Config;
use crate::dispatch::EventDispatcher;
use crate::resolver::SidecarResolver;

/// Build the pipeline from the configuration and run it until Ctrl-C or a
/// registry contract violation.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    log::info!(
        "starting dropwatch: {} root(s), {:.1}s debounce",
        config.roots.len(),
        config.debounce_seconds
    );

    let (fired_tx, fired_rx) = mpsc::channel(64);
    let registry = DebounceRegistry::new(fired_tx);

    let resolver = Arc::new(SidecarResolver::new(
        config.resolver.data_extensions.clone(),
        config.resolver.companion_extensions.clone(),
    ));
    let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
    let dispatcher = Arc::new(EventDispatcher::new(
        config.filter.clone(),
        resolver,
        registry.clone(),
        config.debounce(),
        fatal_tx,
    ));

    let (backend, raw_rx) = NotifyBackend::new(1024)?;
    let manager = Arc::new(WatchManager::new(backend, dispatcher));
    for root in &config.roots {
        let (recursive, auto_add) = root.mode.flags();
        let watch = manager.add_base_watch(&root.path, root.events, recursive, auto_add)?;
        log::info!(
            "watching {} as {watch:?} ({:?})",
            root.path.display(),
            root.mode
        );
    }
    let delivery = spawn_delivery_loop(Arc::clone(&manager), raw_rx);

    let invoker = ImportInvoker::new(
        InvokerConfig {
            drop_roots: config.roots.iter().map(|root| root.path.clone()).collect(),
            endpoint: config.endpoint(),
        },
        TokenSessionProvider::new(config.import.credentials.clone(), config.session_ttl()),
        CommandAction::new(config.import.command.clone(), config.import.args.clone()),
    );
    let importer = tokio::spawn(async move { invoker.run(fired_rx).await });

    let fatal = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        msg = fatal_rx.recv() => msg,
    };
    if fatal.is_none() {
        log::info!("interrupt received; shutting down");
    }

    // Stop ingestion, drop pending windows, then let in-flight imports
    // finish: stopping the registry closes the fired channel, which ends
    // the import loop.
    delivery.abort();
    registry.stop();
    drop(manager);
    let _ = importer.await;

    match fatal {
        None => {
            log::info!("dropwatch stopped");
            Ok(())
        }
        Some(msg) => Err(anyhow!("fileset registry contract violated: {msg}")),
    }
}
