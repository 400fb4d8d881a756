//! Fixed-capacity segments and the grow-only segment vector.
//!
//! Segments give every reserved position a stable address for its whole
//! lifetime, which is what lets position assignment run concurrently with
//! allocation of the segment that will eventually hold the position. The
//! vector of segments is swapped atomically on growth; snapshots taken
//! before a growth stay valid because they are immutable prefixes of the
//! new vector.

use std::cell::UnsafeCell;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::table::Metric;

/// Number of record slots in one segment (2^16).
pub const SEGMENT_SLOTS: usize = 1 << 16;

/// A fixed container of [`SEGMENT_SLOTS`] record slots at stable addresses.
///
/// Once allocated, a segment is never moved, resized, or freed for the
/// lifetime of the table. Each slot is written at most once, by the producer
/// holding the reservation for its absolute position, and read only after
/// the publication watermark has crossed it.
pub(crate) struct Segment {
    slots: Box<[UnsafeCell<Metric>]>,
}

// Each slot has exactly one writer (the reserving producer), and readers are
// ordered behind that write by the release/acquire pair on the publication
// watermark.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    pub(crate) fn new() -> Self {
        let mut slots = Vec::with_capacity(SEGMENT_SLOTS);
        slots.resize_with(SEGMENT_SLOTS, || UnsafeCell::new(Metric::default()));
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    /// Copies `src` into consecutive slots starting at `slot`.
    ///
    /// # Safety
    ///
    /// The caller must hold the reservation covering all target slots, and
    /// `slot + src.len()` must not exceed [`SEGMENT_SLOTS`].
    pub(crate) unsafe fn write(&self, slot: usize, src: &[Metric]) {
        debug_assert!(slot + src.len() <= SEGMENT_SLOTS);
        // UnsafeCell<Metric> is repr(transparent), so the slot array is one
        // contiguous run of Metric values.
        let dst = self.slots.as_ptr().cast::<Metric>().cast_mut().add(slot);
        std::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
    }

    /// Reads the record at `slot`.
    ///
    /// # Safety
    ///
    /// The slot must be published: the caller must have observed, with
    /// acquire ordering, a watermark strictly past the slot's absolute
    /// position.
    pub(crate) unsafe fn read(&self, slot: usize) -> Metric {
        *self.slots[slot].get()
    }
}

/// The atomically swappable, grow-only vector of segments.
///
/// Readers take acquire snapshots; the single winning allocator for each new
/// index installs a lengthened copy with a release store. Existing snapshots
/// keep their segments alive through the shared `Arc`s.
pub(crate) struct SegmentList {
    inner: ArcSwap<Vec<Arc<Segment>>>,
}

impl SegmentList {
    /// Creates a list holding `initial` freshly allocated segments.
    pub(crate) fn new(initial: usize) -> Self {
        let segments: Vec<Arc<Segment>> =
            (0..initial).map(|_| Arc::new(Segment::new())).collect();
        Self {
            inner: ArcSwap::from_pointee(segments),
        }
    }

    /// Returns the current snapshot of the vector.
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<Segment>>> {
        self.inner.load_full()
    }

    /// Appends one segment and installs the lengthened vector, returning the
    /// new length.
    ///
    /// Callers must hold the claim for the next segment index and must have
    /// observed all earlier installs; the claim protocol on the table
    /// serializes them, so no concurrent `append` can run.
    pub(crate) fn append(&self) -> usize {
        let cur = self.inner.load();
        let mut next = Vec::with_capacity(cur.len() + 1);
        next.extend(cur.iter().cloned());
        next.push(Arc::new(Segment::new()));
        let len = next.len();
        self.inner.store(Arc::new(next));
        len
    }
}
