//! Error and Result types for table operations.

use thiserror::Error;

/// A convenience `Result` type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// The error type for table operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// Requested read range extends past the published prefix.
    #[error("requested end {requested} exceeds published offset {published}")]
    OutOfPublishedRange {
        /// Exclusive end position of the rejected request.
        requested: u64,
        /// Published watermark at the time of the call.
        published: u64,
    },
}
