//! Progress reporting and cancellation
//!
//! Long-running algorithms report their work in steps and poll
//! [`Progress::is_active`] at loop boundaries. An inactive progress object
//! means the caller cancelled the task; the algorithm then stops with
//! [`Error::Cancelled`](crate::Error::Cancelled).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Step-based progress sink with cancellation polling.
pub trait Progress: Sync {
    /// Start a new stage made of `steps` pulses.
    fn set_total_steps(&self, steps: u64);

    /// Describe the current stage.
    fn set_message(&self, message: &str);

    /// Advance the current stage by one step.
    fn pulse(&self);

    /// `false` once the task has been cancelled.
    fn is_active(&self) -> bool;
}

/// In-memory progress tracker.
///
/// Stores the current stage and step counters and can be cancelled from any
/// thread holding a reference.
#[derive(Debug, Default)]
pub struct TaskProgress {
    total: AtomicU64,
    current: AtomicU64,
    pulses: AtomicU64,
    cancelled: AtomicBool,
    cancel_after: Option<u64>,
    message: Mutex<String>,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker that cancels itself once `pulses` pulses have been received
    /// over the whole task.
    pub fn cancel_after(pulses: u64) -> Self {
        Self {
            cancel_after: Some(pulses),
            ..Self::default()
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Steps of the current stage.
    pub fn total_steps(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Steps completed in the current stage.
    pub fn current_step(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Pulses received over all stages.
    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::SeqCst)
    }

    /// Message of the current stage.
    pub fn message(&self) -> String {
        match self.message.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Progress for TaskProgress {
    fn set_total_steps(&self, steps: u64) {
        self.total.store(steps, Ordering::SeqCst);
        self.current.store(0, Ordering::SeqCst);
    }

    fn set_message(&self, message: &str) {
        let mut guard = match self.message.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
        guard.push_str(message);
    }

    fn pulse(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
        let pulses = self.pulses.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.cancel_after {
            if pulses >= limit {
                self.cancel();
            }
        }
    }

    fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "indicatif")]
impl Progress for indicatif::ProgressBar {
    fn set_total_steps(&self, steps: u64) {
        self.set_length(steps);
        self.set_position(0);
    }

    fn set_message(&self, message: &str) {
        indicatif::ProgressBar::set_message(self, message.to_string());
    }

    fn pulse(&self) {
        self.inc(1);
    }

    fn is_active(&self) -> bool {
        !self.is_finished()
    }
}

/// Begin a progress stage if a sink was supplied.
pub fn start_stage(progress: Option<&dyn Progress>, message: &str, steps: u64) {
    if let Some(p) = progress {
        p.set_message(message);
        p.set_total_steps(steps);
    }
}

/// Pulse the sink (if any) and fail with `Cancelled` when it became inactive.
pub fn pulse_and_check(progress: Option<&dyn Progress>) -> crate::Result<()> {
    if let Some(p) = progress {
        p.pulse();
        if !p.is_active() {
            return Err(crate::Error::Cancelled);
        }
    }
    Ok(())
}
