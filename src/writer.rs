use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::latch::Shared;
use crate::state::{SlotId, State};

/// The producer half of a latch.
///
/// Owned by exactly one thread at a time (`Send`, not `Clone`); every
/// write goes through `acquire_write`, fills the guard, and publishes.
/// The borrow the guard holds is what makes an overlapping second
/// `acquire_write` a compile error rather than documented misuse.
pub struct Writer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Writer<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Writer<T> {
        Writer { shared }
    }

    /// Claim the slot that is safe to fill right now.
    ///
    /// One atomic load, no loop: the slot-selection table is total over
    /// the legal states, so this is wait-free. The chosen slot is
    /// guaranteed disjoint from the published slot and from anything the
    /// reader currently holds or can claim before the matching publish.
    ///
    /// The guard starts out holding the previously published (or
    /// abandoned) contents of that slot; overwrite it in full before
    /// publishing if stale fields matter.
    pub fn acquire_write(&mut self) -> WriteGuard<'_, T> {
        let (seen, slot) = self.shared.acquire();
        WriteGuard {
            shared: &*self.shared,
            seen,
            slot,
        }
    }

    /// Acquire, move `value` into the slot, publish. The common case
    /// when the payload is rebuilt from scratch each update.
    pub fn publish(&mut self, value: T) {
        let mut guard = self.acquire_write();
        *guard = value;
        guard.publish();
    }
}

/// Exclusive access to the slot claimed by [`Writer::acquire_write`].
///
/// Dereferences to the payload. `publish` makes the contents visible to
/// the reader; dropping the guard without publishing abandons the write,
/// and the next `acquire_write` hands the same slot back.
pub struct WriteGuard<'a, T> {
    shared: &'a Shared<T>,
    seen: State,
    slot: SlotId,
}

impl<T> WriteGuard<'_, T> {
    /// Publish the slot as the latest snapshot.
    ///
    /// At most two compare-and-swap attempts against the state word (the
    /// reader can interleave one claim, nothing more), so this is
    /// lock-free with a hard bound. Irreversible: there is no way to
    /// retract a published snapshot short of publishing a newer one.
    ///
    /// # Panics
    ///
    /// Panics if the state word moved in a way a single reader cannot
    /// produce. That only happens when the latch is driven by more than
    /// one producer or consumer, which voids every guarantee; treat it
    /// as fatal.
    pub fn publish(self) {
        self.shared.publish(self.seen, self.slot);
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the protocol reserves this slot for the producer until
        // publish, and the guard's borrow of Writer keeps this thread
        // from claiming a second slot meanwhile.
        unsafe { &*self.shared.slot_ptr(self.slot) }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: as above; exclusive access via &mut self.
        unsafe { &mut *self.shared.slot_ptr(self.slot) }
    }
}
