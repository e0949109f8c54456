// Slot pool and the protocol core both halves run against.

use std::cell::UnsafeCell;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::reader::Reader;
use crate::state::{AtomicState, SlotId, State};
use crate::writer::Writer;

/// The storage both halves point at.
///
/// Three payload cells plus one packed state word. Each cell is padded to
/// a cache line so the writer filling one slot does not invalidate the
/// line the reader is scanning; the state word gets its own line for the
/// same reason. Padding is a throughput property only, the protocol is
/// correct without it.
pub(crate) struct Shared<T> {
    /// Packed (readable, claimed) pair, see [`State`].
    state: CachePadded<AtomicState>,

    /// The three payload slots. A slot is written only by the producer,
    /// only between `acquire` and the matching `publish`; it is read only
    /// by the consumer, only while claimed. The state word never lets
    /// those two windows overlap on the same slot.
    slots: [CachePadded<UnsafeCell<T>>; 3],
}

// The latch hands &mut T to one thread and &T to the other, never for the
// same slot at the same time (protocol-enforced), so Shared is Sync as
// long as the payload can move between threads.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T: Clone> Shared<T> {
    /// Seed all three cells from the initial value and mark slot 1
    /// published. Rust cannot lend `&mut T` over uninitialized storage,
    /// so the unpublished slots start as clones rather than garbage.
    pub(crate) fn new(initial: T) -> Shared<T> {
        Shared {
            state: CachePadded::new(AtomicState::new(State::stable(SlotId::S1))),
            slots: [
                CachePadded::new(UnsafeCell::new(initial.clone())),
                CachePadded::new(UnsafeCell::new(initial.clone())),
                CachePadded::new(UnsafeCell::new(initial)),
            ],
        }
    }
}

impl<T> Shared<T> {
    #[inline]
    pub(crate) fn slot_ptr(&self, slot: SlotId) -> *mut T {
        self.slots[slot.index()].get()
    }

    /// Writer side: pick the slot that is disjoint from anything the
    /// reader can hold. One atomic load, no loop; the selection table is
    /// total over the 9 legal states, so this is wait-free.
    ///
    /// Returns the observed state alongside the slot; `publish` needs it
    /// to know which prior states to expect.
    #[inline]
    pub(crate) fn acquire(&self) -> (State, SlotId) {
        let seen = self.state.load(Acquire);
        (seen, seen.writable())
    }

    /// Writer side: install `written` as the new readable slot.
    ///
    /// Between `acquire` and now the reader may have claimed slot R,
    /// moving the word from `seen` to `seen.stabilized()` - and nothing
    /// else: the reader's fast path on a stable word is CAS-free, so a
    /// stabilized word only moves again when the writer moves it. Two
    /// strong CAS attempts therefore cover every reachable interleaving:
    ///
    /// 1. `seen -> seen.published(written)` - reader did not move;
    /// 2. `seen.stabilized() -> published` - reader claimed R once.
    ///
    /// Lock-free with a hard bound of two attempts. Both failing means a
    /// second producer or consumer is loose on this latch; that breaks
    /// the whole safety argument, so it is fatal rather than retried.
    pub(crate) fn publish(&self, seen: State, written: SlotId) {
        if self
            .state
            .compare_exchange(seen, seen.published(written), AcqRel, Relaxed)
            .is_ok()
        {
            return;
        }

        let stabilized = seen.stabilized();
        if self
            .state
            .compare_exchange(stabilized, stabilized.published(written), AcqRel, Relaxed)
            .is_err()
        {
            panic!("latch state moved unexpectedly during publish; more than one producer or consumer is using this latch");
        }
    }

    /// Reader side: claim the latest published slot.
    ///
    /// Fast path: a stable word (R = N) means slot R is already ours,
    /// return it with no CAS. Slow path: CAS the transitional word to
    /// `stable(R)`; a failure means the writer published concurrently,
    /// so reload and claim the fresher R. Every failed attempt is caused
    /// by a completed publish, so the loop only spins while the producer
    /// is actually making progress - it cannot livelock on a quiet latch.
    ///
    /// Returns the claimed slot and the number of failed attempts, the
    /// latter purely for diagnostics.
    pub(crate) fn claim(&self) -> (SlotId, u32) {
        let mut retries = 0u32;
        loop {
            let seen = self.state.load(Acquire);
            if seen.is_stable() {
                return (seen.readable, retries);
            }
            if self
                .state
                .compare_exchange(seen, seen.stabilized(), AcqRel, Relaxed)
                .is_ok()
            {
                return (seen.readable, retries);
            }
            retries += 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, state: State) {
        // Test hook: jump the word to an arbitrary legal state.
        self.state.store(state, Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn current_state(&self) -> State {
        self.state.load(Acquire)
    }
}

/// A constructed latch, not yet split into its two halves.
///
/// Mirrors the construct-then-split shape of the crate surface:
/// [`crate::latch`] is the one-liner, `Latch::new` + `split` the
/// spelled-out form.
pub struct Latch<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send> Latch<T> {
    /// Build a latch whose first `read` observes `initial`.
    pub fn new(initial: T) -> Latch<T> {
        Latch {
            shared: Arc::new(Shared::new(initial)),
        }
    }

    /// Split into the producer and consumer halves. Each half is `Send`
    /// and owned; the type system is what holds the single-producer
    /// single-consumer contract.
    pub fn split(self) -> (Writer<T>, Reader<T>) {
        let writer = Writer::new(Arc::clone(&self.shared));
        let reader = Reader::new(self.shared);
        (writer, reader)
    }
}
