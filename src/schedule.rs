//! Timer abstraction shared by the poller, the turn reminder and the pile toggle.
//!
//! The browser build backs this with `gloo` timers; tests drive a virtual clock.

/// Cancels the task it was returned for when cancelled or dropped.
#[must_use = "dropping a TaskHandle cancels its task"]
pub struct TaskHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TaskHandle {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

pub trait Scheduler {
    /// Runs `task` once after `delay_ms`.
    fn once(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskHandle;

    /// Runs `task` every `period_ms` until the handle is cancelled.
    fn every(&self, period_ms: u32, task: Box<dyn FnMut()>) -> TaskHandle;
}
