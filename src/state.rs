// Packed (readable, claimed) state word shared by the writer and reader.

use std::sync::atomic::{AtomicU8, Ordering};

/// Index of one of the three payload slots.
///
/// Discriminants start at 1 so the packed encoding matches the on-word
/// nibble values; `index()` converts to a 0-based array position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum SlotId {
    S1 = 1,
    S2 = 2,
    S3 = 3,
}

impl SlotId {
    /// 0-based position of this slot in the pool array.
    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }

    fn from_nibble(raw: u8) -> Option<SlotId> {
        match raw {
            1 => Some(SlotId::S1),
            2 => Some(SlotId::S2),
            3 => Some(SlotId::S3),
            _ => None,
        }
    }
}

/// The (R, N) pair the latch coordinates on.
///
/// - `readable` (R): slot holding the most recently published payload.
/// - `claimed` (N): slot currently (or most recently) held by the reader,
///   equal to R when no read is in progress.
///
/// Both fields live in one atomic byte (`R << 4 | N`) so they are always
/// inspected and updated as a single indivisible unit; keeping them in two
/// separate atomics would reintroduce the race the packing exists to avoid.
/// Only 9 of the 256 byte values are legal and `decode` rejects the rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct State {
    pub(crate) readable: SlotId,
    pub(crate) claimed: SlotId,
}

impl State {
    #[inline]
    pub(crate) fn new(readable: SlotId, claimed: SlotId) -> State {
        State { readable, claimed }
    }

    /// R = N: no read in progress, slot R is immediately safe to return.
    #[inline]
    pub(crate) fn stable(slot: SlotId) -> State {
        State::new(slot, slot)
    }

    #[inline]
    pub(crate) fn is_stable(self) -> bool {
        self.readable == self.claimed
    }

    /// The state the reader leaves behind when it claims slot R.
    #[inline]
    pub(crate) fn stabilized(self) -> State {
        State::stable(self.readable)
    }

    /// The state the writer installs after filling slot `written`.
    /// N is preserved; the reader may own it.
    #[inline]
    pub(crate) fn published(self, written: SlotId) -> State {
        State::new(written, self.claimed)
    }

    /// The one slot the writer may fill given this state.
    ///
    /// Exhaustive over the 9 legal states. For transitional states the
    /// writable slot is the one absent from {R, N}; for stable states it
    /// is the next slot in the fixed rotation. Either way it is disjoint
    /// from both the published slot and anything the reader can hold.
    pub(crate) fn writable(self) -> SlotId {
        use SlotId::{S1, S2, S3};
        match (self.readable, self.claimed) {
            (S1, S2) | (S2, S1) => S3,
            (S1, S3) | (S3, S1) => S2,
            (S2, S3) | (S3, S2) => S1,
            (S1, S1) => S2,
            (S2, S2) => S3,
            (S3, S3) => S1,
        }
    }

    #[inline]
    pub(crate) fn encode(self) -> u8 {
        (self.readable as u8) << 4 | self.claimed as u8
    }

    /// Decode a raw word, rejecting the 247 illegal encodings.
    pub(crate) fn decode(raw: u8) -> Option<State> {
        let readable = SlotId::from_nibble(raw >> 4)?;
        let claimed = SlotId::from_nibble(raw & 0x0F)?;
        Some(State::new(readable, claimed))
    }
}

/// Atomic cell holding one packed `State`.
///
/// Every value stored here comes from `State::encode`, so a failed decode
/// means the word was corrupted from outside the protocol and the process
/// must not continue relying on it.
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: State) -> AtomicState {
        AtomicState(AtomicU8::new(state.encode()))
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> State {
        decode_or_die(self.0.load(order))
    }

    #[cfg(test)]
    pub(crate) fn store(&self, state: State, order: Ordering) {
        self.0.store(state.encode(), order)
    }

    /// Strong compare-and-swap; spurious failures would break the
    /// bounded-attempt reasoning of the publish path.
    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: State,
        new: State,
        success: Ordering,
        failure: Ordering,
    ) -> Result<State, State> {
        self.0
            .compare_exchange(current.encode(), new.encode(), success, failure)
            .map(decode_or_die)
            .map_err(decode_or_die)
    }
}

#[inline]
fn decode_or_die(raw: u8) -> State {
    match State::decode(raw) {
        Some(state) => state,
        None => panic!("latch state word holds illegal encoding {raw:#04x}"),
    }
}
