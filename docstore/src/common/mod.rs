//! Shared types: the value tree, conversions, field paths and task helpers.

mod convertible;
mod field_path;
mod sort_order;
mod task_util;
mod value;

pub use convertible::*;
pub use field_path::*;
pub use sort_order::*;
pub use task_util::*;
pub use value::*;
