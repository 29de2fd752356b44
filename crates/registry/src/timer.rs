use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// One-shot delayed callback. Cancelable by `cancel` or by dropping; never
/// reused — resetting a debounce window means dropping the old timer and
/// scheduling a fresh one.
///
/// Must be created inside a tokio runtime.
pub struct OneshotTimer {
    handle: Option<JoinHandle<()>>,
}

impl OneshotTimer {
    pub fn schedule<F, Fut>(delay: Duration, on_elapsed: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_elapsed().await;
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Detach without canceling. Used by the firing path itself: the
    /// callback runs on the timer's own task, which must not abort itself
    /// before delivery completes.
    pub fn disarm(mut self) {
        self.handle.take();
    }
}

impl Drop for OneshotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
