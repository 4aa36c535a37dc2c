//! Cancellable delayed actions.
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::AbortHandle;

pub type TimerAction = Box<dyn FnOnce() + Send + 'static>;

/// Runs an action once after a delay.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, after: Duration, action: TimerAction) -> TimerHandle;
}

/// Handle to a scheduled action. Cancelling is always safe, including after
/// the action already ran or was already cancelled. Dropping the handle does
/// not cancel the action.
#[derive(Debug, Default)]
pub struct TimerHandle {
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    pub fn cancel(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_none()
    }
}

/// Schedules actions as sleeping tasks on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime the caller is running on.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, after: Duration, action: TimerAction) -> TimerHandle {
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            action();
        });
        TimerHandle::new(task.abort_handle())
    }
}
