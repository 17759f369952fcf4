use crate::collection::Collection;
use crate::common::{FieldPath, SortOrder, Value};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use crate::query::iterator::ResumePoint;
use crate::query::planner::{PlanRequest, QueryPlanner};
use crate::query::{DocumentIterator, Filter, FilterOp, QueryPlan};

type BeforeQuery = Box<dyn FnOnce(&QueryPlan) -> DocResult<()> + Send>;

/// A query against one collection.
///
/// # Purpose
/// Collects filters, ordering, projection and paging, then plans and runs
/// them through the collection's driver. Builder methods never fail; the
/// first invalid input is kept and reported by [Query::get] or
/// [Query::plan].
///
/// # Usage
/// ```rust
/// use docstore::collection::Collection;
/// use docstore::driver::memory::InMemoryDriver;
/// use docstore::driver::{IndexSchema, Projection, TableSchema};
///
/// let schema = TableSchema::new("books", "title")
///     .with_global_index(IndexSchema::new("by_author", "author").with_projection(Projection::All));
/// let collection = Collection::new(InMemoryDriver::new(schema));
///
/// let query = collection.query().filter("author", "=", "Austen");
/// assert_eq!(query.plan().unwrap(), "Index: \"by_author\"");
/// ```
pub struct Query {
    collection: Collection,
    filters: Vec<Filter>,
    order_by: Option<(FieldPath, SortOrder)>,
    fields: Vec<FieldPath>,
    limit: Option<usize>,
    offset: Option<usize>,
    pagination_token: Option<String>,
    before_query: Option<BeforeQuery>,
    error: Option<DocStoreError>,
}

impl Query {
    pub(crate) fn new(collection: Collection) -> Self {
        Query {
            collection,
            filters: Vec::new(),
            order_by: None,
            fields: Vec::new(),
            limit: None,
            offset: None,
            pagination_token: None,
            before_query: None,
            error: None,
        }
    }

    fn latch(&mut self, error: DocStoreError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Adds a filter; `op` is one of `=`, `<`, `<=`, `>`, `>=`, `in` and
    /// `not-in`.
    pub fn filter(mut self, field_path: &str, op: &str, value: impl Into<Value>) -> Self {
        match op.parse::<FilterOp>() {
            Ok(op) => self.filter_with(field_path, op, value),
            Err(e) => {
                self.latch(e);
                self
            }
        }
    }

    pub fn filter_with(mut self, field_path: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        let filter = field_path
            .parse::<FieldPath>()
            .and_then(|path| Filter::new(path, op, value.into()));
        match filter {
            Ok(filter) => self.filters.push(filter),
            Err(e) => self.latch(e),
        }
        self
    }

    /// Orders the results by one field. May be given once.
    pub fn order_by(mut self, field_path: &str, order: SortOrder) -> Self {
        if let Some((existing, _)) = &self.order_by {
            log::error!("Query is already ordered by {}", existing);
            let message = format!("query is already ordered by {}", existing);
            self.latch(DocStoreError::new(&message, ErrorKind::InvalidArgument));
            return self;
        }
        match field_path.parse::<FieldPath>() {
            Ok(path) => self.order_by = Some((path, order)),
            Err(e) => self.latch(e),
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        if limit == 0 {
            log::error!("Query limit must be positive");
            self.latch(DocStoreError::new("query limit must be positive", ErrorKind::InvalidArgument));
        } else {
            self.limit = Some(limit);
        }
        self
    }

    /// Skips the first `offset` results. Cannot be combined with a
    /// pagination token.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Resumes a previous query from [DocumentIterator::pagination_token].
    pub fn pagination_token(mut self, token: &str) -> Self {
        self.pagination_token = Some(token.to_string());
        self
    }

    /// Projects the results to `field_paths`; all fields when empty.
    pub fn fields(mut self, field_paths: &[&str]) -> Self {
        for path in field_paths {
            match path.parse::<FieldPath>() {
                Ok(path) => self.fields.push(path),
                Err(e) => {
                    self.latch(e);
                    break;
                }
            }
        }
        self
    }

    /// Registers a hook called with the chosen plan just before the query
    /// runs. An error from the hook aborts the query.
    pub fn before_query<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&QueryPlan) -> DocResult<()> + Send + 'static,
    {
        self.before_query = Some(Box::new(hook));
        self
    }

    /// Explains the plan the query would run with, without running it.
    pub fn plan(&self) -> DocResult<String> {
        Ok(self.build_plan()?.explain())
    }

    /// Plans and starts the query.
    pub fn get(self) -> DocResult<DocumentIterator> {
        let plan = self.build_plan()?;
        if let Some(hook) = self.before_query {
            hook(&plan)?;
        }

        let resume = match &self.pagination_token {
            Some(token) => ResumePoint::parse(token)?,
            None => ResumePoint::default(),
        };

        log::debug!("Running {}", plan.statement());
        let runner = self.collection.driver().query_runner(&plan)?;
        Ok(DocumentIterator::new(
            runner,
            resume,
            self.limit,
            self.offset,
            self.collection.field_cache().clone(),
            self.collection.revision_field().map(str::to_string),
        ))
    }

    fn build_plan(&self) -> DocResult<QueryPlan> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if self.offset.is_some() && self.pagination_token.is_some() {
            log::error!("Query has both an offset and a pagination token");
            return Err(DocStoreError::new(
                "offset cannot be combined with a pagination token",
                ErrorKind::InvalidArgument,
            ));
        }

        let request = PlanRequest {
            filters: &self.filters,
            order_by: self.order_by.as_ref(),
            fields: &self.fields,
            limit: self.limit,
            offset: self.offset,
            allow_scans: self.collection.config().allow_scans(),
        };
        QueryPlanner::new(self.collection.driver().table_schema()).plan(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::InMemoryDriver;
    use crate::driver::TableSchema;
    use std::sync::{Arc, Mutex};

    fn collection() -> Collection {
        Collection::new(InMemoryDriver::new(TableSchema::new("books", "title").with_sort_key("publisher")))
    }

    #[test]
    fn test_first_error_is_latched() {
        let err = collection()
            .query()
            .filter("title", "~", "X")
            .filter("a..b", "=", 1)
            .get()
            .err()
            .unwrap();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        assert!(err.message().contains("~"));
    }

    #[test]
    fn test_invalid_builder_inputs() {
        let coll = collection();
        assert!(coll.query().limit(0).plan().is_err());
        assert!(coll.query().filter("title", "in", "X").plan().is_err());
        assert!(coll.query().filter("title", "=", Value::Null).plan().is_err());
        assert!(coll
            .query()
            .filter("title", "=", "X")
            .order_by("publisher", SortOrder::Ascending)
            .order_by("publisher", SortOrder::Descending)
            .plan()
            .is_err());
        assert!(coll.query().offset(1).pagination_token("2").plan().is_err());
    }

    #[test]
    fn test_plan_explanations() {
        let coll = collection();
        assert_eq!(coll.query().filter("title", "=", "X").plan().unwrap(), "Table");
        assert_eq!(coll.query().filter("pages", ">", 10).plan().unwrap(), "Scan");
        let err = coll
            .query()
            .order_by("publisher", SortOrder::Ascending)
            .plan()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_before_query_sees_plan() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let iter = collection()
            .query()
            .filter("title", "=", "X")
            .limit(5)
            .before_query(move |plan| {
                *sink.lock().unwrap() = plan.statement().to_string();
                Ok(())
            })
            .get();
        assert!(iter.is_ok());
        assert_eq!(
            seen.lock().unwrap().as_str(),
            "SELECT * FROM books WHERE title = 'X' LIMIT 5;"
        );
    }

    #[test]
    fn test_before_query_error_aborts() {
        let result = collection()
            .query()
            .before_query(|_| Err(DocStoreError::new("stop", ErrorKind::Unauthorized)))
            .get();
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::Unauthorized);
    }
}
