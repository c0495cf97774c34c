//! Commit log.
//!
//! Every mutation of the ordered keyspace is appended here as one framed
//! [`LogBatch`] before it is applied in memory. Opening a database replays
//! the log from the start.
//!
//! ## Frame format
//!
//! ```text
//! | magic (4) | format (2) | kind (1) | length (4) | payload (length) | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The CRC covers every byte before it. The
//! payload is the CBOR encoding of the batch operations.

mod record;
mod writer;

pub use record::{compute_crc32, FrameKind, LogBatch, LogOp, LOG_FORMAT, LOG_MAGIC};
pub use writer::{CommitLog, ReplayOutcome};
