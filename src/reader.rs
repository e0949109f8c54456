use std::sync::Arc;

use crate::latch::Shared;

/// The consumer half of a latch.
///
/// Owned by exactly one thread at a time (`Send`, not `Clone`). The
/// reference `read` returns borrows the reader mutably, so holding a
/// snapshot across the next `read` call is a compile error - exactly the
/// window in which the protocol guarantees the slot untouched.
pub struct Reader<T> {
    shared: Arc<Shared<T>>,
    retries: u32,
}

impl<T> Reader<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Reader<T> {
        Reader {
            shared,
            retries: 0,
        }
    }

    /// Claim the latest published snapshot.
    ///
    /// Never blocks and never waits for freshness: if nothing was
    /// published since the last call, the same snapshot comes back.
    /// Every returned value corresponds to a completed publish - a slot
    /// mid-write is unreachable from here - and once a newer snapshot
    /// has been observed, no later call returns an older one.
    ///
    /// The common case (no publish racing a previous claim) is a single
    /// atomic load. The racing case retries a claim CAS; each retry is
    /// caused by one completed publish on the other thread.
    pub fn read(&mut self) -> &T {
        let (slot, retries) = self.shared.claim();
        self.retries = retries;
        // Safety: the claim marks this slot as held by the consumer; the
        // writer's slot selection never picks it until the next read.
        unsafe { &*self.shared.slot_ptr(slot) }
    }

    /// Number of claim retries the most recent `read` needed.
    /// Diagnostic only; says nothing about correctness.
    pub fn retry_count(&self) -> u32 {
        self.retries
    }
}
