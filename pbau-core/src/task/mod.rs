use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Types
pub type Task = PbauTask;

/// A spawned loop tied to a cancellation token.
///
/// Connection tasks are long-lived: they run until their token fires or
/// their socket dies. Dropping the handle cancels the token and aborts the
/// task, so a forgotten connection never keeps polling.
#[derive(Debug)]
pub struct PbauTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PbauTask {
    /// Spawns `f` on the runtime, handing it the token it must watch.
    pub fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(f(cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Same as [`spawn`](Self::spawn) but with a caller-provided token,
    /// e.g. one that other handles also observe.
    pub fn spawn_with<Fut>(cancel: CancellationToken, fut: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            cancel,
            handle: Some(tokio::spawn(fut)),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Ask the loop to stop at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `true` once the loop has returned (cancelled, failed or aborted).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Cancel and wait for the loop to wind down.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PbauTask {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn shutdown_waits_for_loop_exit() {
        let exited = Arc::new(AtomicBool::new(false));
        let flag = exited.clone();
        let task = PbauTask::spawn(|cancel| async move {
            cancel.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!task.is_finished());
        task.shutdown().await;
        assert!(exited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drop_cancels_token() {
        let task = PbauTask::spawn(|cancel| async move {
            cancel.cancelled().await;
        });
        let token = task.token().clone();
        drop(task);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn finished_after_body_returns() {
        let task = PbauTask::spawn(|_cancel| async {});
        tokio::time::timeout(Duration::from_secs(1), async {
            while !task.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("task never finished");
        assert!(!task.is_cancelled());
    }
}
