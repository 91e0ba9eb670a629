//! Post-build aggregation of the event stream into a queryable result.

mod aggregator;
mod fileset;
mod result;

pub use aggregator::*;
pub use fileset::*;
pub use result::*;
