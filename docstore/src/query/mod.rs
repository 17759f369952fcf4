//! Query building, planning and result iteration.
//!
//! A [Query] is planned against the collection's [crate::driver::TableSchema]
//! by picking the cheapest relation able to answer it: the base table, a
//! local index or a global index, with a full scan as the last resort. The
//! resulting [QueryPlan] is handed to the driver and its pages are consumed
//! through a [DocumentIterator].

mod filter;
mod iterator;
mod plan;
mod planner;
mod query;

pub use filter::*;
pub use iterator::*;
pub use plan::*;
pub use query::*;

pub(crate) use filter::{compare, lookup};
