//! The speech lock.
//!
//! At most one speech walk may be in flight. Acquisition never waits: a
//! caller that finds the lock held simply does not speak.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusive, non-queuing speech lock.
#[derive(Debug, Clone, Default)]
pub struct SpeechLock {
    held: Arc<AtomicBool>,
}

impl SpeechLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock if it is free.
    ///
    /// The lock is released when the returned guard is dropped, on every
    /// exit path of the holder.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SpeechLockGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SpeechLockGuard {
                held: Arc::clone(&self.held),
            })
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the [`SpeechLock`] on drop.
#[derive(Debug)]
pub struct SpeechLockGuard {
    held: Arc<AtomicBool>,
}

impl Drop for SpeechLockGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
