use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use runlab_async_utils::Clock;
use runlab_async_utils::LockOutcome;
use runlab_async_utils::SingleFlight;
use runlab_async_utils::TokioClock;
use tracing::error;

use crate::config::Settings;
use crate::error::CoreError;
use crate::interpreter::Interpreter;

static GLOBAL_LOCK: OnceLock<Arc<SingleFlight>> = OnceLock::new();

/// Serializes every action that drives the shared interpreter.
pub struct ExecutionCoordinator {
    lock: Arc<SingleFlight>,
    interpreter: Arc<dyn Interpreter>,
    clock: Arc<dyn Clock>,
    ready_attempts: u32,
    ready_step: Duration,
}

impl ExecutionCoordinator {
    /// The process-wide lock. The first caller's poll interval wins.
    pub fn global_lock(poll_interval: Duration) -> Arc<SingleFlight> {
        Arc::clone(GLOBAL_LOCK.get_or_init(|| {
            Arc::new(SingleFlight::with_clock(Arc::new(TokioClock), poll_interval))
        }))
    }

    pub fn new(interpreter: Arc<dyn Interpreter>, settings: &Settings) -> Self {
        let lock = Self::global_lock(settings.lock_poll_interval());
        Self::with_lock(lock, interpreter, settings)
    }

    /// Use a private lock instead of the process-wide one.
    pub fn with_lock(
        lock: Arc<SingleFlight>,
        interpreter: Arc<dyn Interpreter>,
        settings: &Settings,
    ) -> Self {
        Self {
            lock,
            interpreter,
            clock: Arc::new(TokioClock),
            ready_attempts: settings.ready_attempts,
            ready_step: settings.ready_step(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn lock(&self) -> &Arc<SingleFlight> {
        &self.lock
    }

    /// Wait for the interpreter, then run `action` under the lock. Failures
    /// are logged and returned, never propagated.
    pub async fn run_exclusive<T, F, Fut>(&self, label: &str, action: F) -> LockOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Err(err) = self.wait_until_ready().await {
            error!(label, "{err}");
            return LockOutcome::Failed {
                label: label.to_string(),
                cause: err.into(),
            };
        }
        self.lock.run(label, action).await
    }

    pub async fn wait_until_ready(&self) -> Result<(), CoreError> {
        let mut waited = 0;
        while !self.interpreter.is_ready() {
            self.clock.sleep(self.ready_step).await;
            waited += 1;
            if waited >= self.ready_attempts {
                return Err(CoreError::InterpreterNotReady {
                    waited: self.ready_step * self.ready_attempts,
                });
            }
        }
        Ok(())
    }
}
