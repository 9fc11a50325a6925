//! Dispatch loop: admit keys while slots are free, run them, release on
//! completion.
//!
//! This is the smallest useful queue manager. The executor is a caller-supplied
//! async closure; the dispatcher only decides when it runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{Instrument, info, warn};

use crate::queue::EnhancedQueue;

/// Configuration for the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Fallback re-check when nothing wakes the loop.
    pub poll_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

pub struct Dispatcher {
    queue: Arc<EnhancedQueue>,
    config: DispatchConfig,
    wake: Arc<Notify>,
    shutdown: Arc<Notify>,
}

impl Clone for Dispatcher {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            config: self.config.clone(),
            wake: Arc::clone(&self.wake),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

/// Releases its key when dropped, so a panicking executor still frees the slot.
struct Slot {
    key: String,
    queue: Arc<EnhancedQueue>,
    wake: Arc<Notify>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.queue.release(&self.key);
        self.wake.notify_one();
    }
}

impl Dispatcher {
    pub fn new(queue: Arc<EnhancedQueue>, config: DispatchConfig) -> Self {
        Self {
            queue,
            config,
            wake: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn queue(&self) -> &Arc<EnhancedQueue> {
        &self.queue
    }

    /// Re-check the queue now, e.g. after `add` or a window increase.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Stop admitting. In-flight work is awaited before `run` returns.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Dispatch until [`shutdown`](Self::shutdown). Returns keys in admission
    /// order.
    pub async fn run<F, Fut>(&self, exec: F) -> Vec<String>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatch(exec, false).await
    }

    /// Dispatch until the backlog is empty and nothing is running, or until
    /// shutdown. Never returns on its own while the window is zero and keys
    /// are pending.
    pub async fn drain<F, Fut>(&self, exec: F) -> Vec<String>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatch(exec, true).await
    }

    async fn dispatch<F, Fut>(&self, exec: F, stop_when_idle: bool) -> Vec<String>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let exec = Arc::new(exec);
        let mut running = JoinSet::new();
        let mut admitted = Vec::new();

        info!(
            window = self.queue.processing_window(),
            pending = self.queue.pending_len(),
            "dispatcher started"
        );

        loop {
            while let Some(key) = self.queue.admit_next() {
                admitted.push(key.clone());
                let slot = Slot {
                    key: key.clone(),
                    queue: Arc::clone(&self.queue),
                    wake: Arc::clone(&self.wake),
                };
                let exec = Arc::clone(&exec);
                let span = tracing::info_span!("dispatch.execute", key = key.as_str());
                running.spawn(
                    async move {
                        let _slot = slot;
                        exec(key).await;
                    }
                    .instrument(span),
                );
            }

            if stop_when_idle && running.is_empty() && self.queue.pending_len() == 0 {
                break;
            }

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("dispatcher shutting down");
                    break;
                }
                Some(done) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = done {
                        warn!("executor task failed: {e}");
                    }
                }
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        while let Some(done) = running.join_next().await {
            if let Err(e) = done {
                warn!("executor task failed: {e}");
            }
        }
        info!(admitted = admitted.len(), "dispatcher stopped");
        admitted
    }
}
