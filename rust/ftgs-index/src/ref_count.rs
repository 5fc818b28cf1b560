use std::sync::atomic::{AtomicUsize, Ordering};

/// A thread-safe reference counter that never drops below zero.
///
/// `RefCount` tracks the number of live holders of a shared resource. Exactly one
/// call to [`release`](RefCount::release) observes the transition from one to zero,
/// which makes it the single point where the resource may be freed.
pub struct RefCount(AtomicUsize);

impl RefCount {
    /// Creates a counter with the given number of initial holders.
    pub fn new(count: usize) -> RefCount {
        RefCount(AtomicUsize::new(count))
    }

    /// Registers one more holder and returns the previous count.
    ///
    /// The caller must already be a holder, so the counter is known to be non-zero.
    pub fn acquire(&self) -> usize {
        let prev = self.0.fetch_add(1, Ordering::Relaxed);
        debug_assert_ne!(prev, 0);
        prev
    }

    /// Unregisters one holder.
    ///
    /// Returns `true` if this call dropped the count to zero. Returns `false`
    /// otherwise, including when the counter was already zero.
    ///
    /// This operation uses atomic compare-and-exchange operations so that
    /// concurrent releases never underflow the counter.
    pub fn release(&self) -> bool {
        let mut current = self.0.load(Ordering::Relaxed);
        while current != 0 {
            match self.0.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current == 1,
                Err(updated) => current = updated,
            }
        }
        false
    }

    /// Reads the current value of the counter.
    ///
    /// **Note**: this is primarily intended for diagnostics; the value may be
    /// outdated in a concurrent environment.
    pub fn read(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for RefCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RefCount").field(&self.read()).finish()
    }
}
