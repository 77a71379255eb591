//! Citation canonicalization and ranking.

pub mod normalize;
pub mod rank;

pub use normalize::normalize_url;
pub use rank::{merge_and_rank, rank_sources, MAX_SOURCES};
