//! A lock-free single-producer single-consumer triple-buffer latch.
//!
//! One thread repeatedly publishes full snapshots of a fixed-size value;
//! another thread picks up the latest published snapshot whenever it
//! likes. Neither side ever blocks, no snapshot is ever observed torn,
//! and intermediate snapshots may be skipped - only the latest fully
//! published one is guaranteed visible. Typical payloads: control-loop
//! state, sensor frames, telemetry snapshots.
//!
//! Three padded slots and one packed atomic state word are the whole
//! mechanism: `acquire_write` is a single atomic load (wait-free),
//! publishing and claiming are bounded compare-and-swap sequences
//! (lock-free). The single-producer single-consumer contract is held by
//! the type system: the two halves are owned, non-`Clone`, and their
//! operations take `&mut self`.
//!
//! ```
//! let (mut writer, mut reader) = trilatch::latch([0u64; 4]);
//!
//! // Producer side: fill a slot in place, then publish it.
//! let mut frame = writer.acquire_write();
//! frame.copy_from_slice(&[1, 1, 1, 1]);
//! frame.publish();
//!
//! // Consumer side: always gets the latest published snapshot.
//! assert_eq!(*reader.read(), [1, 1, 1, 1]);
//! ```

mod latch;
mod reader;
mod state;
mod writer;

pub use latch::Latch;
pub use reader::Reader;
pub use writer::{WriteGuard, Writer};

/// Build a latch seeded with `initial` and split it into its two halves.
///
/// The first `read` observes `initial`. Shorthand for
/// [`Latch::new`] followed by [`Latch::split`].
pub fn latch<T: Clone + Send>(initial: T) -> (Writer<T>, Reader<T>) {
    Latch::new(initial).split()
}
