//! Lock-free append-only metric table.
//!
//! # Architecture
//!
//! Producers reserve a contiguous range of absolute positions with a single
//! atomic add, copy their records into the covered segments, and publish by
//! advancing the `offset_done` watermark in reservation order:
//!
//! ```text
//! add → reserve [first, first+len) → grow/await segments → copy → publish
//! ```
//!
//! Consumers bound their read against the watermark and walk an immutable
//! snapshot of the segment vector, so they never synchronize with in-flight
//! writers. Storage grows one fixed 2^16-slot segment at a time; exactly one
//! producer allocates each new segment while the others spin-yield until it
//! is installed.
//!
//! Batches from concurrent producers land in reservation order, which is not
//! submission order across calls; within one call the batch is contiguous
//! and in order. Once any position is readable, all earlier positions are.
//!
//! # Example
//!
//! ```rust,ignore
//! use seglog::{Metric, Table};
//!
//! let table = Table::new();
//! table.add(&[
//!     Metric::new(1, 1000, 0.5),
//!     Metric::new(2, 1001, 0.7),
//! ]);
//!
//! let mut out = Vec::new();
//! table.consume(0, table.published(), |m| out.push(m))?;
//! ```

pub mod metric;
pub mod segment;

pub use metric::Metric;
pub use segment::SEGMENT_SLOTS;

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{Result, TableError};
use crate::table::segment::SegmentList;

/// Default number of segments allocated at table creation.
pub const DEFAULT_INITIAL_SEGMENTS: usize = 1;

/// Spin iterations before each wait loop starts yielding to the scheduler.
const SPINS_BEFORE_YIELD: u32 = 32;

/// Configuration for a [`Table`].
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Number of segments to allocate up front.
    ///
    /// Hosts that know their ingest volume can pre-size the vector and skip
    /// the first growth rounds. Values below 1 are treated as 1.
    /// Default: 1.
    pub initial_segments: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_segments: DEFAULT_INITIAL_SEGMENTS,
        }
    }
}

impl TableConfig {
    /// Creates a configuration with a custom number of pre-allocated
    /// segments.
    pub fn with_initial_segments(mut self, initial_segments: usize) -> Self {
        self.initial_segments = initial_segments;
        self
    }
}

/// Point-in-time counters for a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Absolute positions reserved so far.
    pub reserved: u64,
    /// Published prefix: all positions below this are readable.
    pub published: u64,
    /// Number of installed segments.
    pub segments: u64,
}

/// Bounded spin before handing the core back to the scheduler.
struct Backoff {
    spins: u32,
}

impl Backoff {
    fn new() -> Self {
        Self { spins: 0 }
    }

    fn snooze(&mut self) {
        if self.spins < SPINS_BEFORE_YIELD {
            self.spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

/// A lock-free append-only segmented metric log.
///
/// Many producers deposit batches of [`Metric`] records through shared
/// references; consumers later read ranges of absolute positions that the
/// publication watermark has crossed. The table never evicts, never
/// reorders installed storage, and does not bound its memory.
///
/// All coordination runs over four atomic counters:
///
/// - `offset_next`: next unreserved position; reservation is one
///   `fetch_add`.
/// - `offset_done`: the readable prefix bound, advanced in reservation
///   order by a CAS chain.
/// - `cur_segment`: highest segment index whose allocation is claimed.
/// - `num_segments`: installed segment count; readers and copiers may
///   index the vector below it.
///
/// Individual producers may spin while a neighbor finishes, but some
/// producer always makes progress; there are no locks anywhere on the
/// write or read path.
pub struct Table {
    /// Next absolute position not yet reserved.
    offset_next: AtomicU64,
    /// All positions below this are fully written and readable.
    offset_done: AtomicU64,
    /// Highest segment index whose allocation has been claimed.
    cur_segment: AtomicU64,
    /// Installed segment count.
    num_segments: AtomicU64,
    segments: SegmentList,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Creates a table with one pre-allocated segment.
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    /// Creates a table with the given configuration.
    pub fn with_config(config: TableConfig) -> Self {
        let initial = config.initial_segments.max(1);
        Self {
            offset_next: AtomicU64::new(0),
            offset_done: AtomicU64::new(0),
            cur_segment: AtomicU64::new(initial as u64 - 1),
            num_segments: AtomicU64::new(initial as u64),
            segments: SegmentList::new(initial),
        }
    }

    /// Appends a batch of records and returns once the batch is readable.
    ///
    /// The batch occupies a contiguous range of absolute positions in
    /// submission order. Relative order against batches from concurrent
    /// callers is unspecified. An empty batch is a no-op.
    ///
    /// Thread-safe; callable from any number of producers concurrently.
    pub fn add(&self, batch: &[Metric]) {
        if batch.is_empty() {
            return;
        }
        let size = batch.len() as u64;
        let first = self.offset_next.fetch_add(size, Ordering::Relaxed);
        let last = first + size - 1;
        let last_segment = last / SEGMENT_SLOTS as u64;

        self.grow_to(last_segment);
        self.wait_installed(last_segment + 1);

        let segments = self.segments.snapshot();
        let mut pos = first;
        let mut copied = 0;
        while copied < batch.len() {
            let index = (pos / SEGMENT_SLOTS as u64) as usize;
            let slot = (pos % SEGMENT_SLOTS as u64) as usize;
            let run = (SEGMENT_SLOTS - slot).min(batch.len() - copied);
            // The reservation of [first, last] is exclusive, so these slots
            // have no other writer.
            unsafe { segments[index].write(slot, &batch[copied..copied + run]) };
            copied += run;
            pos += run as u64;
        }

        // Publish in reservation order: the CAS only succeeds once every
        // earlier batch has advanced the watermark to `first`. The release
        // ordering is what makes the copied slots visible to readers.
        let mut backoff = Backoff::new();
        while self
            .offset_done
            .compare_exchange_weak(first, first + size, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
    }

    /// Invokes `callback` once per record at positions `[start, end)`, in
    /// ascending position order.
    ///
    /// `end` must not exceed [`published`](Table::published) at call time.
    /// An empty range (`start >= end`) performs no callbacks and succeeds.
    /// Repeating the same call yields identical output; concurrent readers
    /// are independent.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::OutOfPublishedRange`] if `end` lies past the
    /// published prefix. No callbacks are made in that case, and the table
    /// does not wait for the range to fill.
    pub fn consume<F>(&self, start: u64, end: u64, mut callback: F) -> Result<()>
    where
        F: FnMut(Metric),
    {
        let published = self.offset_done.load(Ordering::Acquire);
        if end > published {
            return Err(TableError::OutOfPublishedRange {
                requested: end,
                published,
            });
        }
        if start >= end {
            return Ok(());
        }

        // The snapshot covers every segment below `published`: segments are
        // installed before the watermark can cross into them.
        let segments = self.segments.snapshot();
        let mut pos = start;
        while pos < end {
            let segment = &segments[(pos / SEGMENT_SLOTS as u64) as usize];
            let slot = (pos % SEGMENT_SLOTS as u64) as usize;
            let run = (SEGMENT_SLOTS - slot).min((end - pos) as usize);
            for i in 0..run {
                // Published slots are immutable; the acquire load of the
                // watermark ordered us behind their writes.
                callback(unsafe { segment.read(slot + i) });
            }
            pos += run as u64;
        }
        Ok(())
    }

    /// Returns the published watermark.
    ///
    /// Every position below the returned value may be read with
    /// [`consume`](Table::consume). New data is announced out of band; this
    /// accessor is how a consumer learns the current readable prefix.
    pub fn published(&self) -> u64 {
        self.offset_done.load(Ordering::Acquire)
    }

    /// Returns a point-in-time snapshot of the table counters.
    pub fn stats(&self) -> TableStats {
        TableStats {
            reserved: self.offset_next.load(Ordering::Relaxed),
            published: self.offset_done.load(Ordering::Acquire),
            segments: self.num_segments.load(Ordering::Acquire),
        }
    }

    /// Ensures every segment index up to and including `last` has been
    /// claimed, claiming and installing any index this producer wins.
    fn grow_to(&self, last: u64) {
        let installed = self.num_segments.load(Ordering::Acquire);
        if last < installed {
            return;
        }
        for index in installed..=last {
            if self
                .cur_segment
                .compare_exchange(index - 1, index, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                // We hold the claim for `index`. Earlier allocators must
                // install first so the vector stays dense and in order.
                let mut backoff = Backoff::new();
                while self.num_segments.load(Ordering::Acquire) != index {
                    backoff.snooze();
                }
                let len = self.segments.append();
                debug_assert_eq!(len as u64, index + 1);
                self.num_segments.store(index + 1, Ordering::Release);
                debug!(segment = index, "installed segment");
            } else {
                // Another producer holds the claim for `index`; wait until
                // its install lands before considering the next one.
                let mut backoff = Backoff::new();
                while self.num_segments.load(Ordering::Acquire) <= index {
                    backoff.snooze();
                }
            }
        }
    }

    /// Spins until at least `needed` segments are installed.
    fn wait_installed(&self, needed: u64) {
        let mut backoff = Backoff::new();
        while self.num_segments.load(Ordering::Acquire) < needed {
            backoff.snooze();
        }
    }
}
