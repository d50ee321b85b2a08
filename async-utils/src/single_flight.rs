use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::debug;
use tracing::error;

use crate::Clock;
use crate::TokioClock;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of an action run under a [`SingleFlight`] lock.
///
/// The action's error is logged and carried here instead of being
/// propagated, so a failing holder can never leave the lock taken.
#[derive(Debug)]
pub enum LockOutcome<T> {
    Completed(T),
    Failed { label: String, cause: anyhow::Error },
}

impl<T> LockOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }

    pub fn into_result(self) -> anyhow::Result<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed { cause, .. } => Err(cause),
        }
    }
}

/// Cooperative, non-reentrant mutual exclusion gate.
///
/// Waiters poll the flag at a fixed interval until it frees; there is no
/// queue, the first waiter to observe the lock free takes it. A task that
/// already holds the lock must not call [`SingleFlight::run`] again.
pub struct SingleFlight {
    held: AtomicBool,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(TokioClock), DEFAULT_POLL_INTERVAL)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, poll_interval: Duration) -> Self {
        Self {
            held: AtomicBool::new(false),
            poll_interval,
            clock,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait for the lock, run `action` while holding it, then release it.
    pub async fn run<T, F, Fut>(&self, label: &str, action: F) -> LockOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        debug!(label, held = self.is_held(), "lock requested");
        let _guard = self.acquire(label).await;
        match action().await {
            Ok(value) => LockOutcome::Completed(value),
            Err(cause) => {
                error!(label, "action failed while holding the execution lock: {cause:#}");
                LockOutcome::Failed {
                    label: label.to_string(),
                    cause,
                }
            }
        }
    }

    async fn acquire<'a>(&'a self, label: &'a str) -> HeldGuard<'a> {
        while self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.clock.sleep(self.poll_interval).await;
        }
        debug!(label, "lock acquired");
        HeldGuard {
            held: &self.held,
            label,
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SingleFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("held", &self.is_held())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Releases the flag when the holder finishes, fails, panics or is dropped.
struct HeldGuard<'a> {
    held: &'a AtomicBool,
    label: &'a str,
}

impl Drop for HeldGuard<'_> {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
        debug!(label = self.label, "lock released");
    }
}
