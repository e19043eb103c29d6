//! Filtering and aggregation of survey responses.

pub mod aggregator;
pub mod filter;

pub use aggregator::*;
pub use filter::*;
