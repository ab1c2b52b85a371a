//! Graceful shutdown of the daemon's background tasks.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ShutdownManager {
    /// Cancelled once to stop every task
    cancel_token: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            task_handles: Vec::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn register_task(&mut self, handle: JoinHandle<()>) {
        self.task_handles.push(handle);
    }

    /// Spawn `make(token)` and track it for shutdown
    pub fn spawn<F, Fut>(&mut self, make: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(make(self.token()));
        self.register_task(handle);
    }

    /// Wait for ctrl+c, then cancel and join every task
    pub async fn wait_for_shutdown(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("🛑 Shutdown signal received");
        self.shutdown().await;
    }

    /// Cancel and join every task, giving up after a timeout.
    /// Returns false if some task was still running.
    pub async fn shutdown(mut self) -> bool {
        self.cancel_token.cancel();

        let handles = std::mem::take(&mut self.task_handles);
        let join_all = async move {
            for handle in handles {
                let _ = handle.await;
            }
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all).await {
            Ok(()) => {
                tracing::info!("✓ All tasks shut down gracefully");
                true
            }
            Err(_) => {
                tracing::warn!("⏱️  Shutdown timeout: Some tasks did not complete");
                false
            }
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_shutdown_cancels_tasks() {
        let mut manager = ShutdownManager::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        manager.spawn(|token| async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(manager.shutdown().await);
        assert!(stopped.load(Ordering::SeqCst));
    }
}
