//! Collections: the entry point for actions and queries.
//!
//! A [Collection] binds a [Driver] to a [CollectionConfig]. Documents are
//! written and read through [ActionList]s, either built explicitly with
//! [Collection::actions] or through the one-shot helpers, and queried with
//! [Collection::query].
//!
//! ```rust
//! use docstore::collection::Collection;
//! use docstore::document::Document;
//! use docstore::driver::memory::InMemoryDriver;
//! use docstore::driver::TableSchema;
//! use docstore::value_map;
//!
//! let books = Collection::new(InMemoryDriver::new(TableSchema::new("books", "title")));
//! let mut dune = Document::from_value(value_map! { "title": "Dune", "pages": 412 }).unwrap();
//! books.create(&mut dune).unwrap();
//! assert!(books.create(&mut Document::from_value(value_map! { "title": "Dune" }).unwrap()).is_err());
//! ```

mod config;

pub use config::*;

use crate::action::{ActionList, Modification};
use crate::codec::FieldCache;
use crate::document::Document;
use crate::driver::Driver;
use crate::errors::{ActionListError, DocResult};
use crate::query::Query;
use std::sync::Arc;

/// A handle on one table of a backing store.
///
/// Cheap to clone; clones share the driver, the configuration and the
/// field cache. Safe to use from several threads at once.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

struct CollectionInner {
    driver: Box<dyn Driver>,
    config: CollectionConfig,
}

impl Collection {
    /// A collection over `driver` with default settings.
    pub fn new<D: Driver + 'static>(driver: D) -> Self {
        Collection::with_config(Box::new(driver), CollectionConfig::default())
    }

    pub fn builder<D: Driver + 'static>(driver: D) -> CollectionBuilder {
        CollectionBuilder::new(Box::new(driver))
    }

    pub(crate) fn with_config(driver: Box<dyn Driver>, config: CollectionConfig) -> Self {
        log::debug!("Opening collection on {}", driver.table_schema());
        Collection {
            inner: Arc::new(CollectionInner { driver, config }),
        }
    }

    /// Starts an empty action list.
    pub fn actions<'a>(&self) -> ActionList<'a> {
        ActionList::new(self.clone())
    }

    /// Starts a query.
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    pub fn driver(&self) -> &dyn Driver {
        self.inner.driver.as_ref()
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.inner.config
    }

    pub fn field_cache(&self) -> &FieldCache {
        self.inner.config.field_cache()
    }

    /// The field carrying revisions, or `None` when revisions are off.
    pub fn revision_field(&self) -> Option<&str> {
        match self.inner.config.revision_field() {
            Some(field) => field,
            None => self.inner.driver.revision_field(),
        }
    }

    /// Inserts `document`; fails with `AlreadyExists` if its key is taken.
    pub fn create(&self, document: &mut Document) -> DocResult<()> {
        self.actions().create(document).run().map_err(ActionListError::into_first)
    }

    /// Overwrites the stored document; fails with `NotFound` if absent.
    pub fn replace(&self, document: &mut Document) -> DocResult<()> {
        self.actions().replace(document).run().map_err(ActionListError::into_first)
    }

    pub fn put(&self, document: &mut Document) -> DocResult<()> {
        self.actions().put(document).run().map_err(ActionListError::into_first)
    }

    /// Reads the stored document with `document`'s key into `document`.
    pub fn get(&self, document: &mut Document, field_paths: &[&str]) -> DocResult<()> {
        self.actions()
            .get(document, field_paths)
            .run()
            .map_err(ActionListError::into_first)
    }

    pub fn delete(&self, document: &mut Document) -> DocResult<()> {
        self.actions().delete(document).run().map_err(ActionListError::into_first)
    }

    pub fn update<'m, I>(&self, document: &mut Document, mods: I) -> DocResult<()>
    where
        I: IntoIterator<Item = (&'m str, Modification)>,
    {
        self.actions()
            .update(document, mods)
            .run()
            .map_err(ActionListError::into_first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::document::tests::Sample;
    use crate::driver::memory::InMemoryDriver;
    use crate::driver::TableSchema;
    use crate::errors::ErrorKind;
    use crate::value_map;

    fn books() -> Collection {
        Collection::new(InMemoryDriver::new(TableSchema::new("books", "title")))
    }

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn test_one_shot_round_trip() {
        let books = books();
        let mut dune = doc(value_map! { "title": "Dune", "pages": 412 });
        books.create(&mut dune).unwrap();
        assert!(dune.get_field("DocstoreRevision").unwrap().is_some());

        books
            .update(&mut dune, [("pages", Modification::Increment(Value::Int(1)))])
            .unwrap();

        let mut copy = doc(value_map! { "title": "Dune" });
        books.get(&mut copy, &[]).unwrap();
        assert_eq!(copy.get_field("pages").unwrap(), Some(Value::Int(413)));
        assert_eq!(copy.get_field("DocstoreRevision").unwrap(), dune.get_field("DocstoreRevision").unwrap());

        books.delete(&mut copy).unwrap();
        let err = books.get(&mut doc(value_map! { "title": "Dune" }), &[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn test_one_shot_error_kinds() {
        let books = books();
        let mut emma = doc(value_map! { "title": "Emma" });
        let err = books.replace(&mut emma).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);

        books.put(&mut emma).unwrap();
        let err = books.create(&mut doc(value_map! { "title": "Emma" })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::AlreadyExists);

        let mut stale = doc(value_map! { "title": "Emma", "DocstoreRevision": "stale" });
        let err = books.put(&mut stale).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FailedPrecondition);
    }

    #[test]
    fn test_typed_document_without_revision_field() {
        let collection = Collection::new(InMemoryDriver::new(TableSchema::new("samples", "name")));
        let mut sample = Document::from_object(Sample {
            name: "a".into(),
            count: 2,
            tags: vec!["x".into()],
        });
        collection.put(&mut sample).unwrap();

        let mut read = Document::from_object(Sample {
            name: "a".into(),
            ..Default::default()
        });
        collection.get(&mut read, &[]).unwrap();
        assert_eq!(read.as_object::<Sample>().unwrap().count, 2);
        assert_eq!(read.as_object::<Sample>().unwrap().tags, vec!["x".to_string()]);
    }
}
