//! Lifecycle scope for a realtime session.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Handle whose release frees every resource tied to a session's lifetime.
///
/// Tasks attached to the scope watch its cancellation token. [`ScopeToken::release`]
/// consumes the token, so teardown runs at most once. A token dropped without
/// release still cancels and aborts its tasks.
#[derive(Debug, Default)]
pub struct ScopeToken {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ScopeToken {
    /// Create a scope with a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token tasks inside this scope should watch.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether teardown has started.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Tie a task's lifetime to this scope.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    /// Number of attached tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel the scope and wait for every attached task to finish.
    pub async fn release(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await
                && e.is_panic()
            {
                warn!("Session task panicked during teardown: {}", e);
            }
        }
    }
}

impl Drop for ScopeToken {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}
