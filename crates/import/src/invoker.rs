use std::path::{Component, Path, PathBuf};

use dropwatch_registry::Fileset;
use tokio::sync::mpsc;

use crate::action::{ActionOutput, Endpoint, ImportAction, RETRY_EXIT_CODE};
use crate::error::Result;
use crate::session::{SessionPool, SessionProvider};

/// Settings the invoker needs to act on fired filesets.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Drop roots; the first path component below the containing root
    /// names the owner.
    pub drop_roots: Vec<PathBuf>,
    pub endpoint: Endpoint,
}

/// Consumes fired filesets and runs the external import action for each.
pub struct ImportInvoker<P: SessionProvider, A: ImportAction> {
    config: InvokerConfig,
    pool: SessionPool<P>,
    action: A,
}

impl<P: SessionProvider, A: ImportAction> ImportInvoker<P, A> {
    pub fn new(config: InvokerConfig, provider: P, action: A) -> Self {
        Self {
            config,
            pool: SessionPool::new(provider),
            action,
        }
    }

    /// Consume fired filesets until the channel closes. Failures are
    /// logged and swallowed: one bad import must never take down the loop
    /// that serves every other fileset.
    pub async fn run(&self, mut fired: mpsc::Receiver<Fileset>) {
        while let Some(fileset) = fired.recv().await {
            if let Err(err) = self.import(&fileset).await {
                log::error!("import of {} failed: {err}", fileset.key.display());
            }
        }
        log::debug!("fired channel closed; import loop ending");
    }

    fn owner_of(&self, path: &Path) -> Option<String> {
        self.config
            .drop_roots
            .iter()
            .find_map(|root| owner_for_path(root, path))
    }

    async fn import(&self, fileset: &Fileset) -> Result<()> {
        let Some(owner) = self.owner_of(&fileset.key) else {
            log::warn!(
                "skipping {}: no owner identity under any drop root",
                fileset.key.display()
            );
            return Ok(());
        };
        log::info!(
            "importing {} ({} member(s)) for {owner}",
            fileset.key.display(),
            fileset.members.len()
        );

        // The lease returns to the pool when it drops, on every path out.
        let lease = self.pool.lease(&owner).await?;

        let first = self
            .action
            .run(&fileset.key, &self.config.endpoint, lease.credential())
            .await?;
        if first.succeeded() {
            log::info!("imported {}", fileset.key.display());
            return Ok(());
        }

        if first.code == RETRY_EXIT_CODE {
            log::warn!(
                "import of {} hit a transient lock (exit {RETRY_EXIT_CODE}); retrying once",
                fileset.key.display()
            );
            let second = self
                .action
                .run(&fileset.key, &self.config.endpoint, lease.credential())
                .await?;
            if second.succeeded() {
                log::info!("imported {} on retry", fileset.key.display());
                return Ok(());
            }
            log_failure(&fileset.key, "first attempt", &first);
            log_failure(&fileset.key, "retry", &second);
            return Ok(());
        }

        log_failure(&fileset.key, "import", &first);
        Ok(())
    }
}

fn log_failure(target: &Path, attempt: &str, output: &ActionOutput) {
    log::error!(
        "{attempt} for {} failed with exit {}\nstdout:\n{}\nstderr:\n{}",
        target.display(),
        output.code,
        output.stdout,
        output.stderr
    );
}

/// Owning identity for a dropped path: the first component below the drop
/// root. Paths outside the root, or sitting directly in it, have no owner.
pub fn owner_for_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut components = rel.components();
    let first = components.next()?;
    components.next()?; // the owner segment must be a directory level
    match first {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TokenSessionProvider;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedAction {
        outputs: Mutex<VecDeque<ActionOutput>>,
        calls: AtomicUsize,
    }

    impl ScriptedAction {
        fn new(codes: &[i32]) -> Self {
            let outputs = codes
                .iter()
                .map(|&code| ActionOutput {
                    code,
                    stdout: format!("exit {code}"),
                    stderr: String::new(),
                })
                .collect();
            Self {
                outputs: Mutex::new(outputs),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImportAction for ScriptedAction {
        async fn run(
            &self,
            _target: &Path,
            _endpoint: &Endpoint,
            _credential: &str,
        ) -> Result<ActionOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .outputs
                .lock()
                .unwrap()
                .pop_front()
                .expect("action invoked more often than scripted"))
        }
    }

    fn invoker(
        codes: &[i32],
    ) -> ImportInvoker<TokenSessionProvider, ScriptedAction> {
        let provider = TokenSessionProvider::new(
            HashMap::from([("alice".to_string(), "k1".to_string())]),
            Duration::from_secs(600),
        );
        ImportInvoker::new(
            InvokerConfig {
                drop_roots: vec![PathBuf::from("/drop")],
                endpoint: Endpoint {
                    host: "localhost".to_string(),
                    port: 4064,
                },
            },
            provider,
            ScriptedAction::new(codes),
        )
    }

    fn fileset(key: &str) -> Fileset {
        Fileset {
            key: PathBuf::from(key),
            members: vec![PathBuf::from(key)],
        }
    }

    async fn drive(
        invoker: &ImportInvoker<TokenSessionProvider, ScriptedAction>,
        filesets: Vec<Fileset>,
    ) {
        let (tx, rx) = mpsc::channel(8);
        for fs in filesets {
            tx.send(fs).await.unwrap();
        }
        drop(tx);
        invoker.run(rx).await;
    }

    #[test]
    fn owner_is_the_first_component_below_the_root() {
        let root = Path::new("/drop");
        assert_eq!(
            owner_for_path(root, Path::new("/drop/alice/run1/a.tif")),
            Some("alice".to_string())
        );
        assert_eq!(
            owner_for_path(root, Path::new("/drop/bob/a.tif")),
            Some("bob".to_string())
        );
        // Directly in the root: nothing to own it.
        assert_eq!(owner_for_path(root, Path::new("/drop/a.tif")), None);
        assert_eq!(owner_for_path(root, Path::new("/elsewhere/a.tif")), None);
    }

    #[tokio::test]
    async fn success_invokes_the_action_once() {
        let invoker = invoker(&[0]);
        drive(&invoker, vec![fileset("/drop/alice/run1/a.tif")]).await;
        assert_eq!(invoker.action.calls(), 1);
        assert_eq!(invoker.pool.leased(), 0);
    }

    #[tokio::test]
    async fn transient_lock_is_retried_exactly_once() {
        let invoker = invoker(&[RETRY_EXIT_CODE, 0]);
        drive(&invoker, vec![fileset("/drop/alice/run1/a.tif")]).await;
        assert_eq!(invoker.action.calls(), 2);
    }

    #[tokio::test]
    async fn second_transient_failure_is_terminal() {
        let invoker = invoker(&[RETRY_EXIT_CODE, RETRY_EXIT_CODE]);
        drive(&invoker, vec![fileset("/drop/alice/run1/a.tif")]).await;
        // No third attempt.
        assert_eq!(invoker.action.calls(), 2);
        assert_eq!(invoker.pool.leased(), 0);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let invoker = invoker(&[1]);
        drive(&invoker, vec![fileset("/drop/alice/run1/a.tif")]).await;
        assert_eq!(invoker.action.calls(), 1);
    }

    #[tokio::test]
    async fn ownerless_filesets_are_skipped() {
        let invoker = invoker(&[]);
        drive(&invoker, vec![fileset("/drop/stray.tif")]).await;
        assert_eq!(invoker.action.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_does_not_stop_the_loop() {
        // bob has no credential; the alice import after him still runs.
        let invoker = invoker(&[0]);
        drive(
            &invoker,
            vec![
                fileset("/drop/bob/run1/a.tif"),
                fileset("/drop/alice/run1/a.tif"),
            ],
        )
        .await;
        assert_eq!(invoker.action.calls(), 1);
        assert_eq!(invoker.pool.leased(), 0);
    }
}
