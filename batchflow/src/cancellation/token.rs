//! Stop signal for cooperative, batch-granular cancellation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag requesting that a running pipeline stop.
///
/// Stopping is idempotent - only the first reason is kept.
#[derive(Default)]
pub struct StopSignal {
    /// Whether a stop has been requested.
    stopped: AtomicBool,
    /// The reason for stopping (first one wins).
    reason: RwLock<Option<String>>,
}

impl StopSignal {
    /// Creates a new signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop with a reason.
    ///
    /// The reason is stored before the flag is raised, so an observer of
    /// [`is_stopped`](Self::is_stopped) always sees it.
    pub fn stop(&self, reason: impl Into<String>) {
        let mut current = self.reason.write();
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *current = Some(reason.into());
        }
    }

    /// Returns whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Returns the stop reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("stopped", &self.is_stopped())
            .field("reason", &self.reason())
            .finish()
    }
}

/// A cloneable handle for stopping a pipeline from another thread or task.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
}

impl StopHandle {
    /// Creates a handle around a fresh signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop.
    pub fn stop(&self) {
        self.signal.stop("stop requested");
    }

    /// Requests a stop with a reason.
    pub fn stop_with_reason(&self, reason: impl Into<String>) {
        self.signal.stop(reason);
    }

    /// Returns whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.signal.is_stopped()
    }

    /// Returns the stop reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.signal.reason()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_default_not_stopped() {
        let signal = StopSignal::new();
        assert!(!signal.is_stopped());
        assert!(signal.reason().is_none());
    }

    #[test]
    fn test_stop_idempotent() {
        let signal = StopSignal::new();
        signal.stop("First reason");
        signal.stop("Second reason");

        assert!(signal.is_stopped());
        assert_eq!(signal.reason(), Some("First reason".to_string()));
    }

    #[test]
    fn test_handle_clones_share_signal() {
        let handle = StopHandle::new();
        let other = handle.clone();

        other.stop_with_reason("shutdown");

        assert!(handle.is_stopped());
        assert_eq!(handle.reason(), Some("shutdown".to_string()));
    }

    #[test]
    fn test_reason_set_whenever_stopped_is_observed() {
        for _ in 0..200 {
            let handle = StopHandle::new();
            let remote = handle.clone();
            let stopper = std::thread::spawn(move || remote.stop_with_reason("shutdown"));

            while !handle.is_stopped() {
                std::hint::spin_loop();
            }
            assert_eq!(handle.reason().as_deref(), Some("shutdown"));
            stopper.join().unwrap();
        }
    }

    #[test]
    fn test_stop_visible_across_threads() {
        let handle = StopHandle::new();
        let remote = handle.clone();

        std::thread::spawn(move || remote.stop())
            .join()
            .unwrap();

        assert!(handle.is_stopped());
        assert_eq!(handle.reason(), Some("stop requested".to_string()));
    }
}
