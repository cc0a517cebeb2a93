//! Table statistics for plan selection.
//!
//! A higher-layer optimizer asks [`TableStats`] how expensive a scan is and
//! what fraction of a table a predicate keeps; the answers come from
//! equi-width histograms built by two passes over the table.

pub mod histogram;
pub mod stats;

pub use histogram::{IntHistogram, StringHistogram};
pub use stats::TableStats;
