//! Admission control over payload bytes held in memory.
//!
//! Every live parse context keeps an owned copy of its payload until it is
//! dropped. The budget caps the total across all contexts so a peer cannot
//! pin unbounded memory by delivering payloads faster than they are consumed.
//! Denial is the only backpressure signal at this layer; callers retry later
//! instead of blocking.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::{PayloadError, Result, DEFAULT_BUDGET_CEILING};

/// Process-wide byte budget shared by all parse contexts.
///
/// Reservation is all or nothing: a request either fits under the ceiling in
/// full or is denied with [`PayloadError::Throttled`]. Admission uses a
/// compare-exchange loop so concurrent creators cannot slip past the ceiling
/// between the check and the add. Share it with `Arc` when contexts are
/// created from more than one thread.
#[derive(Debug)]
pub struct PayloadBudget {
    ceiling: usize,
    in_use: AtomicUsize,
}

impl PayloadBudget {
    /// Create a budget with the given ceiling in bytes.
    pub const fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            in_use: AtomicUsize::new(0),
        }
    }

    /// Maximum bytes admitted across all live contexts.
    #[inline]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Bytes currently reserved by live contexts.
    #[inline]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Bytes still available for reservation.
    #[inline]
    pub fn available(&self) -> usize {
        self.ceiling.saturating_sub(self.in_use())
    }

    /// Reserve `bytes` against the ceiling.
    ///
    /// Returns [`PayloadError::Throttled`] when the request does not fit in
    /// full; the error is retryable and no partial reservation is made.
    pub fn try_reserve(&self, bytes: usize) -> Result<()> {
        let mut current = self.in_use.load(Ordering::Acquire);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= self.ceiling => next,
                _ => {
                    let available = self.ceiling.saturating_sub(current);
                    warn!(
                        "payload budget exhausted: {} bytes requested, {} available",
                        bytes, available
                    );
                    return Err(PayloadError::Throttled {
                        requested: bytes,
                        available,
                    });
                }
            };
            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Return `bytes` to the budget.
    ///
    /// Must be paired with a successful `try_reserve` of the same size; the
    /// parse context does this from `Drop`.
    #[inline]
    pub fn release(&self, bytes: usize) {
        let prev = self.in_use.fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(prev >= bytes, "budget released more than was reserved");
    }
}

impl Default for PayloadBudget {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_CEILING)
    }
}
