//! Seglog - lock-free append-only segmented metric log.
//!
//! This crate provides the core ingest structure for high-volume metric
//! pipelines: many producers deposit fixed-shape records in batches without
//! taking locks, and consumers read ranges of the published prefix by
//! absolute position.
//!
//! # Components
//!
//! - [`Table`]: the segmented log with its reserve-then-publish protocol
//! - [`Metric`]: the 16-byte record stored at each slot
//! - [`TableConfig`]: construction-time tuning (pre-allocated segments)
//! - [`TableStats`]: point-in-time counter snapshot
//!
//! # Example
//!
//! ```rust,ignore
//! use seglog::{Metric, Table};
//!
//! let table = Table::new();
//!
//! // Producers append batches; each batch stays contiguous and in order.
//! table.add(&[
//!     Metric::new(1, 1_700_000_000, 0.75),
//!     Metric::new(2, 1_700_000_000, 0.25),
//! ]);
//!
//! // Consumers read any range below the published watermark.
//! let mut out = Vec::new();
//! table.consume(0, table.published(), |m| out.push(m))?;
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod table;

pub use error::{Result, TableError};
pub use table::{Metric, Table, TableConfig, TableStats, SEGMENT_SLOTS};
