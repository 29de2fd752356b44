//! End-to-end pipeline: raw notifications through the watch manager,
//! dispatcher, registry, and invoker with a scripted action.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use dropwatch_cli::dispatch::EventDispatcher;
use dropwatch_cli::resolver::SidecarResolver;
use dropwatch_import::{
    ActionOutput, Endpoint, ImportAction, ImportInvoker, InvokerConfig, TokenSessionProvider,
};
use dropwatch_registry::DebounceRegistry;
use dropwatch_watch::{
    EventFilter, PathFilter, RawEvent, RawKind, Result as WatchResult, WatchBackend, WatchManager,
};

struct NullBackend;

impl WatchBackend for NullBackend {
    fn watch(&mut self, _dir: &Path) -> WatchResult<()> {
        Ok(())
    }

    fn unwatch(&mut self, _dir: &Path) -> WatchResult<()> {
        Ok(())
    }
}

struct RecordingAction {
    targets: Arc<Mutex<Vec<PathBuf>>>,
}

#[async_trait]
impl ImportAction for RecordingAction {
    async fn run(
        &self,
        target: &Path,
        _endpoint: &Endpoint,
        _credential: &str,
    ) -> dropwatch_import::Result<ActionOutput> {
        self.targets.lock().unwrap().push(target.to_path_buf());
        Ok(ActionOutput {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

struct Pipeline {
    registry: DebounceRegistry,
    manager: WatchManager<NullBackend>,
    importer: tokio::task::JoinHandle<()>,
    targets: Arc<Mutex<Vec<PathBuf>>>,
}

fn pipeline(root: &Path, owner: &str) -> Pipeline {
    let (fired_tx, fired_rx) = mpsc::channel(8);
    let registry = DebounceRegistry::new(fired_tx);

    let resolver = Arc::new(SidecarResolver::new(
        vec!["tif".into()],
        vec!["xml".into()],
    ));
    let (fatal_tx, _fatal_rx) = mpsc::channel(1);
    let filter = PathFilter {
        skip_housekeeping: true,
        ..PathFilter::default()
    };
    let dispatcher = Arc::new(EventDispatcher::new(
        filter,
        resolver,
        registry.clone(),
        Duration::from_secs(5),
        fatal_tx,
    ));

    let manager = WatchManager::new(NullBackend, dispatcher);

    let targets = Arc::new(Mutex::new(Vec::new()));
    let invoker = ImportInvoker::new(
        InvokerConfig {
            drop_roots: vec![root.to_path_buf()],
            endpoint: Endpoint {
                host: "localhost".to_string(),
                port: 4064,
            },
        },
        TokenSessionProvider::new(
            HashMap::from([(owner.to_string(), "k1".to_string())]),
            Duration::from_secs(600),
        ),
        RecordingAction {
            targets: Arc::clone(&targets),
        },
    );
    let importer = tokio::spawn(async move { invoker.run(fired_rx).await });

    Pipeline {
        registry,
        manager,
        importer,
        targets,
    }
}

fn close_write(path: PathBuf) -> RawEvent {
    RawEvent {
        path,
        kind: RawKind::CloseWrite,
        is_dir: Some(false),
    }
}

#[tokio::test(start_paused = true)]
async fn burst_of_member_events_triggers_one_import() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("alice/run1");
    fs::create_dir_all(&run_dir).unwrap();
    let data = run_dir.join("scan.tif");
    let sidecar = run_dir.join("scan.xml");
    fs::write(&data, b"pixels").unwrap();
    fs::write(&sidecar, b"<meta/>").unwrap();

    let p = pipeline(tmp.path(), "alice");
    p.manager
        .add_base_watch(tmp.path(), EventFilter::default(), true, true)
        .unwrap();

    // The data file lands, its sidecar a second later.
    p.manager.handle_raw(close_write(data.clone()));
    tokio::time::sleep(Duration::from_secs(1)).await;
    p.manager.handle_raw(close_write(sidecar.clone()));

    // One quiet period after the last member event.
    tokio::time::sleep(Duration::from_secs(6)).await;

    p.registry.stop();
    p.importer.await.unwrap();

    assert_eq!(p.targets.lock().unwrap().as_slice(), &[data]);
    assert_eq!(p.registry.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn preexisting_content_of_a_new_directory_gets_imported() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("alice")).unwrap();

    let p = pipeline(tmp.path(), "alice");
    p.manager
        .add_base_watch(tmp.path(), EventFilter::default(), true, true)
        .unwrap();

    // A whole run directory appears at once; its files were written before
    // any watch covered them, so only the mkdir is ever notified.
    let run_dir = tmp.path().join("alice/run2");
    fs::create_dir(&run_dir).unwrap();
    let data = run_dir.join("scan.tif");
    fs::write(&data, b"pixels").unwrap();
    fs::write(run_dir.join("scan.xml"), b"<meta/>").unwrap();

    p.manager.handle_raw(RawEvent {
        path: run_dir,
        kind: RawKind::Create,
        is_dir: Some(true),
    });

    tokio::time::sleep(Duration::from_secs(6)).await;

    p.registry.stop();
    p.importer.await.unwrap();

    assert_eq!(p.targets.lock().unwrap().as_slice(), &[data]);
}

#[tokio::test(start_paused = true)]
async fn separate_units_trigger_separate_imports() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("alice/run3");
    fs::create_dir_all(&run_dir).unwrap();
    let first = run_dir.join("a.tif");
    let second = run_dir.join("b.tif");
    fs::write(&first, b"x").unwrap();
    fs::write(&second, b"x").unwrap();

    let p = pipeline(tmp.path(), "alice");
    p.manager
        .add_base_watch(tmp.path(), EventFilter::default(), true, true)
        .unwrap();

    p.manager.handle_raw(close_write(first.clone()));
    p.manager.handle_raw(close_write(second.clone()));

    tokio::time::sleep(Duration::from_secs(6)).await;

    p.registry.stop();
    p.importer.await.unwrap();

    let mut targets = p.targets.lock().unwrap().clone();
    targets.sort();
    assert_eq!(targets, vec![first, second]);
}
