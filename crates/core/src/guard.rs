//! Single-entry reentrancy guard
//!
//! `enter` flips an atomic flag with compare-and-set and hands back a
//! [`GuardLock`]. The flag is cleared when the lock is dropped, so every exit
//! path of the guarded body (early return, `?`, panic unwind) releases it.
//!
//! A rejected `enter` is also remembered until the current holder releases
//! the lock. The holder checks [`GuardLock::reentry_attempted`] before it
//! commits, so a caller that swallows the nested `ReentrantCall` still cannot
//! get the outer operation through.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{LendingError, LendingResult};

#[derive(Debug, Default)]
struct GuardFlags {
    entered: AtomicBool,
    reentry_attempted: AtomicBool,
}

/// Mutual-exclusion flag shared by every guarded entry point of a runtime
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    flags: Arc<GuardFlags>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard, failing with `ReentrantCall` if it is already held
    pub fn enter(&self) -> LendingResult<GuardLock> {
        if self
            .flags
            .entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.flags.reentry_attempted.store(true, Ordering::Release);
            tracing::warn!("Reentrant call rejected");
            return Err(LendingError::ReentrantCall);
        }
        self.flags.reentry_attempted.store(false, Ordering::Release);

        Ok(GuardLock {
            flags: Arc::clone(&self.flags),
        })
    }

    /// True while a guarded operation is in flight
    pub fn is_entered(&self) -> bool {
        self.flags.entered.load(Ordering::Acquire)
    }
}

/// Proof that the guard is held; releases it on drop
#[derive(Debug)]
#[must_use = "the guard is released as soon as the lock is dropped"]
pub struct GuardLock {
    flags: Arc<GuardFlags>,
}

impl GuardLock {
    /// True if anything tried to enter the guard while this lock was held
    pub fn reentry_attempted(&self) -> bool {
        self.flags.reentry_attempted.load(Ordering::Acquire)
    }
}

impl Drop for GuardLock {
    fn drop(&mut self) {
        self.flags.reentry_attempted.store(false, Ordering::Release);
        self.flags.entered.store(false, Ordering::Release);
    }
}
