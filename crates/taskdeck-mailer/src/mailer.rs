use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::queue::{EmailQueue, QueuedEmail};
use crate::transport::{Email, MailTransport, SendError};

/// Delivery tuning. The defaults match production behavior; tests shrink
/// the gap to drive the sweeper deterministically.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// When false, sends are logged and reported as delivered.
    pub enabled: bool,
    /// Seconds between sweeps of the retry queue.
    pub sweep_interval_secs: u64,
    /// Minimum gap between two attempts for the same entry.
    pub retry_gap: Duration,
    /// An entry is dropped once it has failed this many retries.
    pub max_attempts: u32,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sweep_interval_secs: 60,
            retry_gap: Duration::minutes(5),
            max_attempts: 3,
        }
    }
}

/// What `send` did with the message. Transient failures count as handled:
/// the message sits on the retry queue and the caller moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Mailer disabled; the message was logged instead of sent.
    Logged,
    /// Transient failure; queued for retry.
    Queued,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub delivered: usize,
    pub requeued: usize,
    pub deferred: usize,
    pub dropped: usize,
}

#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    queue: EmailQueue,
    config: MailerConfig,
}

impl Mailer {
    pub fn new(transport: Arc<dyn MailTransport>, queue: EmailQueue, config: MailerConfig) -> Self {
        Self {
            transport,
            queue,
            config,
        }
    }

    pub fn queue(&self) -> &EmailQueue {
        &self.queue
    }

    /// Best-effort send. Permanent failures are the only error surfaced;
    /// a transient failure parks the message on the retry queue and
    /// reports success to the caller.
    pub async fn send(&self, email: Email) -> Result<SendOutcome, SendError> {
        if !self.config.enabled {
            tracing::info!(to = %email.to, subject = %email.subject, "mailer disabled, logging instead of sending");
            return Ok(SendOutcome::Logged);
        }

        match self.transport.send(&email).await {
            Ok(()) => Ok(SendOutcome::Sent),
            Err(e) if e.is_transient() => {
                tracing::warn!(to = %email.to, error = %e, "transient send failure, queueing for retry");
                self.queue.push(QueuedEmail::new(email, Utc::now()));
                Ok(SendOutcome::Queued)
            }
            Err(e) => {
                tracing::error!(to = %email.to, error = %e, "permanent send failure");
                Err(e)
            }
        }
    }

    /// One pass over the retry queue. Entries younger than the retry gap
    /// are deferred; entries that fail their final permitted attempt are
    /// dropped with a log line and never resurface.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats::default();

        for mut entry in self.queue.drain() {
            let since_last = entry
                .last_attempt
                .map(|t| now - t)
                .unwrap_or_else(|| self.config.retry_gap);
            if since_last < self.config.retry_gap {
                stats.deferred += 1;
                self.queue.push(entry);
                continue;
            }

            match self.transport.send(&entry.email).await {
                Ok(()) => {
                    tracing::info!(to = %entry.email.to, attempts = entry.attempts, "queued email delivered");
                    stats.delivered += 1;
                }
                Err(e) => {
                    entry.attempts += 1;
                    entry.last_attempt = Some(now);
                    if entry.attempts >= self.config.max_attempts {
                        tracing::warn!(
                            to = %entry.email.to,
                            attempts = entry.attempts,
                            error = %e,
                            "dropping email after final retry"
                        );
                        stats.dropped += 1;
                    } else {
                        tracing::warn!(
                            to = %entry.email.to,
                            attempts = entry.attempts,
                            error = %e,
                            "retry failed, requeueing"
                        );
                        stats.requeued += 1;
                        self.queue.push(entry);
                    }
                }
            }
        }

        stats
    }

    /// Background sweeper on a fixed interval. Abort the handle to stop.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let mailer = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(std::time::Duration::from_secs(
                mailer.config.sweep_interval_secs,
            ));
            loop {
                ticker.tick().await;
                let stats = mailer.sweep_once(Utc::now()).await;
                if stats != SweepStats::default() {
                    tracing::debug!(?stats, "email retry sweep finished");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transport that fails a configurable number of times, then succeeds.
    struct FlakyTransport {
        failures_left: AtomicUsize,
        transient: bool,
        sent: Mutex<Vec<Email>>,
    }

    impl FlakyTransport {
        fn failing(n: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(n),
                transient: true,
                sent: Mutex::new(vec![]),
            }
        }

        fn permanent() -> Self {
            Self {
                failures_left: AtomicUsize::new(usize::MAX),
                transient: false,
                sent: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl MailTransport for FlakyTransport {
        async fn send(&self, email: &Email) -> Result<(), SendError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                if left != usize::MAX {
                    self.failures_left.fetch_sub(1, Ordering::SeqCst);
                }
                return if self.transient {
                    Err(SendError::Transient("connection reset".into()))
                } else {
                    Err(SendError::Permanent("mailbox rejected".into()))
                };
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn enabled_config() -> MailerConfig {
        MailerConfig {
            enabled: true,
            ..MailerConfig::default()
        }
    }

    fn email() -> Email {
        Email::new("ada@example.com", "Task due soon", "<p>due</p>")
    }

    #[tokio::test]
    async fn disabled_mailer_logs_and_reports_success() {
        let transport = Arc::new(FlakyTransport::permanent());
        let mailer = Mailer::new(transport, EmailQueue::new(), MailerConfig::default());

        let outcome = mailer.send(email()).await.unwrap();
        assert_eq!(outcome, SendOutcome::Logged);
        assert!(mailer.queue().is_empty());
    }

    #[tokio::test]
    async fn transient_failure_queues_and_reports_handled() {
        let transport = Arc::new(FlakyTransport::failing(1));
        let mailer = Mailer::new(transport, EmailQueue::new(), enabled_config());

        let outcome = mailer.send(email()).await.unwrap();
        assert_eq!(outcome, SendOutcome::Queued);
        assert_eq!(mailer.queue().len(), 1);
    }

    #[tokio::test]
    async fn permanent_failure_surfaces_and_does_not_queue() {
        let transport = Arc::new(FlakyTransport::permanent());
        let mailer = Mailer::new(transport, EmailQueue::new(), enabled_config());

        let err = mailer.send(email()).await.err().expect("must fail");
        assert!(!err.is_transient());
        assert!(mailer.queue().is_empty());
    }

    #[tokio::test]
    async fn sweep_respects_retry_gap() {
        let transport = Arc::new(FlakyTransport::failing(1));
        let mailer = Mailer::new(transport, EmailQueue::new(), enabled_config());
        let queued_at = Utc::now();
        mailer.send(email()).await.unwrap();

        // Two minutes later: under the 5-minute gap, nothing is attempted.
        let stats = mailer.sweep_once(queued_at + Duration::minutes(2)).await;
        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.delivered, 0);
        assert_eq!(mailer.queue().len(), 1);

        // Past the gap: the retry runs and succeeds.
        let stats = mailer.sweep_once(queued_at + Duration::minutes(6)).await;
        assert_eq!(stats.delivered, 1);
        assert!(mailer.queue().is_empty());
    }

    #[tokio::test]
    async fn entry_dropped_exactly_after_third_failed_attempt() {
        // usize::MAX means the transport never recovers.
        let transport = Arc::new(FlakyTransport::failing(usize::MAX));
        let mailer = Mailer::new(transport, EmailQueue::new(), enabled_config());
        let t0 = Utc::now();
        mailer.send(email()).await.unwrap();

        // Attempt 1 and 2 fail and requeue.
        let stats = mailer.sweep_once(t0 + Duration::minutes(6)).await;
        assert_eq!(stats.requeued, 1);
        let stats = mailer.sweep_once(t0 + Duration::minutes(12)).await;
        assert_eq!(stats.requeued, 1);
        assert_eq!(mailer.queue().len(), 1);

        // Third failed attempt drops the entry for good.
        let stats = mailer.sweep_once(t0 + Duration::minutes(18)).await;
        assert_eq!(stats.dropped, 1);
        assert!(mailer.queue().is_empty());

        // Nothing resurfaces later.
        let stats = mailer.sweep_once(t0 + Duration::minutes(30)).await;
        assert_eq!(stats, SweepStats::default());
    }

    #[tokio::test]
    async fn recovered_transport_delivers_from_queue() {
        let transport = Arc::new(FlakyTransport::failing(1));
        let mailer = Mailer::new(Arc::clone(&transport) as Arc<dyn MailTransport>, EmailQueue::new(), enabled_config());
        let t0 = Utc::now();
        mailer.send(email()).await.unwrap();

        mailer.sweep_once(t0 + Duration::minutes(6)).await;
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }
}
