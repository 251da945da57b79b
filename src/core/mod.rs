//! Pure computation: coordinate normalization, query construction, statistics

pub mod coords;
pub mod query;
pub mod stats;

// Re-export main types
pub use coords::normalize_ring;
pub use query::{QueryBuilder, QueryPair};
pub use stats::BandStats;
