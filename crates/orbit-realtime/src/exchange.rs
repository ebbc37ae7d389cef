//! Lock-free latest-value exchange
//!
//! Triple buffering between exactly one writer and one reader. Each side
//! owns one slot outright; the third slot sits in the middle and is traded
//! with a single atomic swap. Neither side ever blocks, and the reader
//! always holds a complete value, possibly an old one.

use crossbeam_utils::CachePadded;
use portable_atomic::{AtomicU32, Ordering};
use std::cell::UnsafeCell;
use std::sync::Arc;

/// Low bits of the middle word: index of the middle slot
const INDEX_MASK: u32 = 0b11;
/// Set when the middle slot was published after the reader's last fetch
const FRESH: u32 = 0b100;

struct Shared<T> {
    slots: [UnsafeCell<T>; 3],
    middle: CachePadded<AtomicU32>,
}

// Safe because each slot is reachable from at most one side at a time: the
// writer's slot, the reader's slot and the middle slot are disjoint, and
// ownership only moves through the atomic swap.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

/// Create a connected writer/reader pair, all slots holding `initial`
pub fn exchange_slot<T: Clone>(initial: T) -> (ExchangeWriter<T>, ExchangeReader<T>) {
    let shared = Arc::new(Shared {
        slots: [
            UnsafeCell::new(initial.clone()),
            UnsafeCell::new(initial.clone()),
            UnsafeCell::new(initial),
        ],
        middle: CachePadded::new(AtomicU32::new(1)),
    });
    (
        ExchangeWriter {
            shared: Arc::clone(&shared),
            back: 0,
        },
        ExchangeReader { shared, front: 2 },
    )
}

/// Producer side
pub struct ExchangeWriter<T> {
    shared: Arc<Shared<T>>,
    back: usize,
}

impl<T> ExchangeWriter<T> {
    /// Slot owned by the writer, never visible to the reader.
    ///
    /// Its contents are whatever was published two rounds ago; overwrite
    /// what you need before publishing.
    pub fn acquire(&mut self) -> &mut T {
        // SAFETY: `back` is owned by this writer until the next publish.
        unsafe { &mut *self.shared.slots[self.back].get() }
    }

    /// Make the acquired slot the most recent value and take back the
    /// previously published one for reuse
    pub fn publish(&mut self) {
        let previous = self
            .shared
            .middle
            .swap(self.back as u32 | FRESH, Ordering::AcqRel);
        self.back = (previous & INDEX_MASK) as usize;
    }
}

/// Consumer side
pub struct ExchangeReader<T> {
    shared: Arc<Shared<T>>,
    front: usize,
}

impl<T> ExchangeReader<T> {
    /// Swap in the newest published value if there is one, then return the
    /// value the reader now holds
    pub fn fetch_latest(&mut self) -> &T {
        if self.has_update() {
            let previous = self
                .shared
                .middle
                .swap(self.front as u32, Ordering::AcqRel);
            self.front = (previous & INDEX_MASK) as usize;
        }
        self.current()
    }

    /// Value held since the last fetch, without looking for updates
    pub fn current(&self) -> &T {
        // SAFETY: `front` is owned by this reader until the next fetch.
        unsafe { &*self.shared.slots[self.front].get() }
    }

    /// Whether a publish happened since the last fetch
    pub fn has_update(&self) -> bool {
        self.shared.middle.load(Ordering::Acquire) & FRESH != 0
    }
}
