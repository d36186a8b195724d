//! Out-of-band notification dispatch.
//!
//! Validation services never await delivery. They hand a [`Notification`] to a
//! [`DispatchHandle`], which queues it on a bounded channel. A dispatcher task
//! drains the queue and delivers through a [`Notifier`] on a bounded number of
//! concurrent workers, retrying failed sends with exponential backoff.

use crate::error::DeliveryError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Transport for a single outbound message.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `target` (phone number or email address).
    async fn send(&self, target: &str, message: &str) -> Result<(), DeliveryError>;
}

/// A message waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: String,
    pub message: String,
}

impl Notification {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Maximum queued notifications before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum concurrent deliveries
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Delivery attempts per notification
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on every further retry
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_workers() -> usize {
    8
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

/// Sending side of the dispatch queue. Cheap to clone.
#[derive(Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<Notification>,
}

impl DispatchHandle {
    /// Queue a notification without waiting.
    ///
    /// Returns false when the queue is full or the dispatcher has stopped; the
    /// notification is dropped in that case and the user has to ask for a resend.
    pub fn enqueue(&self, notification: Notification) -> bool {
        match self.sender.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(recipient = %n.target, "Notification queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(recipient = %n.target, "Notification dispatcher stopped, dropping message");
                false
            }
        }
    }
}

/// Background delivery of queued notifications.
pub struct Dispatcher;

impl Dispatcher {
    /// Spawn the dispatcher task for `notifier`.
    ///
    /// The task ends once every [`DispatchHandle`] has been dropped and the
    /// queue is drained.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        config: DispatchConfig,
    ) -> (DispatchHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let task = tokio::spawn(run(notifier, config, receiver));
        (DispatchHandle { sender }, task)
    }
}

async fn run(
    notifier: Arc<dyn Notifier>,
    config: DispatchConfig,
    mut receiver: mpsc::Receiver<Notification>,
) {
    let workers = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut in_flight = Vec::new();

    while let Some(notification) = receiver.recv().await {
        let permit = match workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let notifier = notifier.clone();
        let config = config.clone();
        in_flight.retain(|task: &JoinHandle<()>| !task.is_finished());
        in_flight.push(tokio::spawn(async move {
            deliver(notifier.as_ref(), &config, &notification).await;
            drop(permit);
        }));
    }

    for task in in_flight {
        let _ = task.await;
    }
    debug!("Notification dispatcher stopped");
}

/// Deliver one notification, retrying with exponential backoff.
async fn deliver(notifier: &dyn Notifier, config: &DispatchConfig, notification: &Notification) {
    let attempts = config.max_attempts.max(1);
    let mut backoff = config.initial_backoff;

    for attempt in 1..=attempts {
        match notifier
            .send(&notification.target, &notification.message)
            .await
        {
            Ok(()) => {
                debug!(recipient = %notification.target, attempt, "Notification delivered");
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, "Notification delivery failed, retrying: {}", e);
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => {
                error!(attempts, "Giving up on notification: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    /// Fails the first `failures` sends, then records messages.
    struct FlakyNotifier {
        failures: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<Notification>>,
    }

    impl FlakyNotifier {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, target: &str, message: &str) -> Result<(), DeliveryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(DeliveryError::new(target, "gateway unavailable"));
            }
            self.delivered
                .lock()
                .await
                .push(Notification::new(target, message));
            Ok(())
        }
    }

    fn fast_config(max_attempts: u32) -> DispatchConfig {
        DispatchConfig {
            queue_capacity: 16,
            workers: 2,
            max_attempts,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_delivers_queued_notifications() {
        let notifier = Arc::new(FlakyNotifier::new(0));
        let (handle, task) = Dispatcher::spawn(notifier.clone(), fast_config(3));

        assert!(handle.enqueue(Notification::new("+15550001111", "code 123456")));
        assert!(handle.enqueue(Notification::new("a@example.com", "link")));
        drop(handle);
        task.await.unwrap();

        let delivered = notifier.delivered.lock().await;
        assert_eq!(delivered.len(), 2);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let notifier = Arc::new(FlakyNotifier::new(2));
        let (handle, task) = Dispatcher::spawn(notifier.clone(), fast_config(3));

        handle.enqueue(Notification::new("+15550001111", "code"));
        drop(handle);
        task.await.unwrap();

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.delivered.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let notifier = Arc::new(FlakyNotifier::new(10));
        let (handle, task) = Dispatcher::spawn(notifier.clone(), fast_config(2));

        handle.enqueue(Notification::new("+15550001111", "code"));
        drop(handle);
        task.await.unwrap();

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        assert!(notifier.delivered.lock().await.is_empty());
    }

    #[test]
    fn test_full_queue_drops_notification() {
        let (sender, _receiver) = mpsc::channel(1);
        let handle = DispatchHandle { sender };

        assert!(handle.enqueue(Notification::new("a", "1")));
        assert!(!handle.enqueue(Notification::new("b", "2")));
    }

    #[test]
    fn test_config_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.max_attempts, 3);
    }
}
