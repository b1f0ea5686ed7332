// SPDX-License-Identifier: GPL-3.0-only
//! Stop conditions for the control loop
//!
//! The loop runs on the calling thread and ends when either its deadline
//! passes or a [`StopSignal`] is raised (Ctrl+C in the binary).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Action returned by a loop step to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Shared stop flag
///
/// Cheap to clone; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal raised by Ctrl+C
    ///
    /// The process-wide handler can only be installed once; a second call
    /// returns the error from `ctrlc`.
    pub fn install_ctrlc() -> Result<Self, ctrlc::Error> {
        let signal = Self::new();
        let handler_signal = signal.clone();
        ctrlc::set_handler(move || {
            debug!("Ctrl+C received");
            handler_signal.request_stop();
        })?;
        Ok(signal)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Optional wall-clock limit
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// Starts counting now; `None` never expires
    pub fn start(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Strictly past the limit
    pub fn expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.start.elapsed() > limit)
    }
}

/// Decide whether the loop keeps going
pub fn next_action(deadline: &Deadline, stop: &StopSignal) -> LoopAction {
    if stop.is_stopped() {
        debug!("Stop signal received");
        LoopAction::Stop
    } else if deadline.expired() {
        debug!(elapsed_ms = deadline.elapsed().as_millis() as u64, "Run duration reached");
        LoopAction::Stop
    } else {
        LoopAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_stop_signal_is_shared() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_stopped());

        clone.request_stop();
        assert!(signal.is_stopped());
        assert_eq!(next_action(&Deadline::start(None), &signal), LoopAction::Stop);
    }

    #[test]
    fn test_deadline() {
        let forever = Deadline::start(None);
        assert!(!forever.expired());

        let short = Deadline::start(Some(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(30));
        assert!(short.expired());
        assert_eq!(next_action(&short, &StopSignal::new()), LoopAction::Stop);
    }

    #[test]
    fn test_continue_while_within_limit() {
        let deadline = Deadline::start(Some(Duration::from_secs(60)));
        assert_eq!(next_action(&deadline, &StopSignal::new()), LoopAction::Continue);
    }
}
