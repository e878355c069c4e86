use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::transport::Email;

/// One email awaiting another delivery attempt. `attempts` counts failed
/// retries by the sweeper; the initial inline failure is not counted.
#[derive(Debug, Clone)]
pub struct QueuedEmail {
    pub email: Email,
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QueuedEmail {
    pub fn new(email: Email, now: DateTime<Utc>) -> Self {
        Self {
            email,
            attempts: 0,
            last_attempt: Some(now),
            created_at: now,
        }
    }
}

/// Process-local retry queue, injected into the mailer rather than living
/// as a module global. Pending entries do not survive a restart.
#[derive(Clone, Default)]
pub struct EmailQueue {
    inner: Arc<Mutex<VecDeque<QueuedEmail>>>,
}

impl EmailQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: QueuedEmail) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
    }

    pub fn pop(&self) -> Option<QueuedEmail> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything currently queued, leaving the queue empty.
    pub fn drain(&self) -> Vec<QueuedEmail> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }
}
