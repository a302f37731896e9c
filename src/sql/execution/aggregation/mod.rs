//! Aggregate function processing.
//!
//! - [`AggregateAccumulator`] - running state of one aggregate call-site
//! - [`AccumulatorManager`] - the accumulators of a whole-table aggregate query
//! - [`AggregateValues`] - finished results looked up by call-site

pub mod accumulator;

pub use accumulator::{AccumulatorManager, AggregateAccumulator, AggregateValues};
