use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

/// One-shot background task submission with the handles kept around, so
/// callers that need determinism (tests, shutdown) can wait for every
/// submitted task instead of racing a detached spawn.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        // Finished handles are reaped on every submit, so a long-lived
        // process never accumulates them between drains.
        guard.retain(|h| !h.is_finished());
        guard.push(handle);
    }

    /// Wait for everything submitted so far to finish.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "background task panicked");
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.handles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
