//! # docstore - a provider-agnostic document database driver core
//!
//! docstore sits between application code and a document store. It owns
//! everything that does not depend on the store itself: the document model
//! and its codec, batching and grouping of document actions, optimistic
//! concurrency through revisions, and query planning over tables with local
//! and global secondary indexes. A store plugs in by implementing the
//! [driver::Driver] contract.
//!
//! ## Key Features
//!
//! - **Documents**: untyped maps and typed records behind one [document::Document]
//! - **Derived records**: `#[derive(DocumentObject)]` from the `docstore_derive` crate
//! - **Action lists**: mixed reads and writes in one call, with atomic write groups
//! - **Revisions**: automatic optimistic-concurrency tokens on every write
//! - **Query planning**: table, local index, global index or scan, chosen per query
//! - **Reference driver**: [driver::memory::InMemoryDriver] for tests and embedding
//!
//! ## Quick Start
//!
//! ```rust
//! use docstore::collection::Collection;
//! use docstore::document::Document;
//! use docstore::driver::memory::InMemoryDriver;
//! use docstore::driver::{IndexSchema, Projection, TableSchema};
//! use docstore::value_map;
//!
//! let schema = TableSchema::new("books", "title")
//!     .with_global_index(IndexSchema::new("by_author", "author").with_projection(Projection::All));
//! let books = Collection::new(InMemoryDriver::new(schema));
//!
//! let mut dune = Document::from_value(value_map! { "title": "Dune", "author": "Herbert" }).unwrap();
//! let mut emma = Document::from_value(value_map! { "title": "Emma", "author": "Austen" }).unwrap();
//! books.actions().put(&mut dune).put(&mut emma).run().unwrap();
//!
//! let mut found = books.query().filter("author", "=", "Austen").get().unwrap();
//! let mut doc = Document::new();
//! found.next(&mut doc).unwrap();
//! assert_eq!(doc.get_field("title").unwrap().unwrap().as_str(), Some("Emma"));
//! ```
//!
//! ## Design Pattern
//!
//! Long-lived handles ([collection::Collection], [collection::CollectionConfig],
//! [driver::memory::InMemoryDriver]) follow the PIMPL pattern: the public
//! struct wraps an `Arc` to its implementation, so clones are cheap and
//! share state across threads.
//!
//! ## Module Organization
//!
//! - [`action`] - Action lists, grouping and execution
//! - [`codec`] - Encoder/decoder protocol and the field cache
//! - [`collection`] - Collection handle and configuration
//! - [`common`] - Values, conversions, field paths and worker utilities
//! - [`document`] - The document abstraction
//! - [`driver`] - Driver contracts, table metadata and the in-memory driver
//! - [`errors`] - Error types and result definitions
//! - [`query`] - Queries, planning and result iteration

extern crate self as docstore;

pub mod action;
pub mod codec;
pub mod collection;
pub mod common;
pub mod document;
pub mod driver;
pub mod errors;
pub mod query;
