//! A driver keeping one table in process memory.

mod config;
mod rows;
mod runner;
mod store;
mod transaction;

pub use config::InMemoryDriverBuilder;
pub use store::*;
