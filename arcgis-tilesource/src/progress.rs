//! Cooperative cancellation and byte-level progress for tile requests.
//!
//! Fetches poll [`Progress::is_cancelled`] between reads. A [`ProgressToken`]
//! can be cloned and handed to another thread to cancel in-flight work.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Progress observer passed to every fetch.
pub trait Progress: Send + Sync {
    /// Returns true once the request should be abandoned.
    fn is_cancelled(&self) -> bool;

    /// Called as response bytes arrive.
    ///
    /// # Arguments
    ///
    /// * `received` - Bytes received so far for the current request
    /// * `total` - Expected size, when the server announced one
    fn report(&self, _received: u64, _total: Option<u64>) {}
}

/// A progress observer that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shareable cancellation flag with a received-bytes counter.
///
/// Clones share state: cancelling one clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct ProgressToken {
    cancelled: Arc<AtomicBool>,
    bytes_received: Arc<AtomicU64>,
}

impl ProgressToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every fetch observing this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Bytes most recently reported by a fetch.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::SeqCst)
    }
}

impl Progress for ProgressToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn report(&self, received: u64, _total: Option<u64>) {
        self.bytes_received.store(received, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_progress_never_cancels() {
        assert!(!NoProgress.is_cancelled());
    }

    #[test]
    fn test_token_cancel_is_shared_between_clones() {
        let token = ProgressToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());

        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_token_reports_bytes() {
        let token = ProgressToken::new();
        token.report(1024, Some(4096));
        assert_eq!(token.bytes_received(), 1024);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let token = ProgressToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel())
            .join()
            .unwrap();
        assert!(token.is_cancelled());
    }
}
