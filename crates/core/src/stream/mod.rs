//! Incremental extraction of records from a chunked JSON Lines stream.

pub mod classify;
pub mod reassembler;

pub use classify::classify;
pub use reassembler::{Reassembler, ScanMode};
