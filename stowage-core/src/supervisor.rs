//! Connection resilience for network-backed adapters.
//!
//! While an adapter is [`ConnState::Reconnecting`], every contract
//! operation fails fast instead of blocking behind a dead connection. A
//! single background task retries the reconnect future under an
//! exponential backoff policy and clears the gate once the caller's
//! closure has swapped in a working connection handle.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use backoff::ExponentialBackoff;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connected,
    Reconnecting,
}

#[derive(Debug, Default)]
pub struct Supervisor {
    reconnecting: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnState {
        if self.reconnecting.load(Ordering::SeqCst) {
            ConnState::Reconnecting
        } else {
            ConnState::Connected
        }
    }

    pub fn is_reconnecting(&self) -> bool {
        self.state() == ConnState::Reconnecting
    }

    /// Flips the gate and starts the reconnect loop, unless one is
    /// already running. At most one loop is active per supervisor.
    ///
    /// `reconnect` must swap the new connection handle into the adapter
    /// before returning `Ok`; the gate is cleared only after that.
    pub fn trigger<F, Fut, E>(&self, reconnect: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send,
        E: std::fmt::Display,
    {
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }

        let gate = Arc::clone(&self.reconnecting);
        let handle = tokio::spawn(async move {
            let policy = ExponentialBackoff {
                max_elapsed_time: None,
                ..ExponentialBackoff::default()
            };

            let outcome = backoff::future::retry(policy, || async {
                reconnect().await.map_err(|e| {
                    warn!("reconnection attempt failed: {e}");

                    backoff::Error::transient(e)
                })
            })
            .await;

            if outcome.is_ok() {
                debug!("connection re-established");
            }

            gate.store(false, Ordering::SeqCst);
        });

        if let Ok(mut task) = self.task.lock() {
            *task = Some(handle);
        }
    }

    /// Aborts an in-flight reconnect loop. The gate stays closed: an
    /// adapter shut down mid-reconnect keeps failing fast.
    pub fn shutdown(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
