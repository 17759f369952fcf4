//! Batched document actions.
//!
//! An [ActionList] collects creates, replaces, puts, updates, deletes and
//! gets against one collection. Running it validates every action, splits
//! the list into phases around its writes, batches the gets by projection,
//! and dispatches writes on a bounded worker pool. Writes inside an atomic
//! group share one driver transaction.

mod action;
mod action_list;
mod executor;
mod grouping;

pub use action::*;
pub use action_list::*;
