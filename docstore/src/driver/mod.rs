//! Collaborator contracts between the core and a backing store.
//!
//! A driver supplies the key function, executes single writes and
//! transactions, answers batch reads, and runs planned queries page by page.
//! The core never talks to a store any other way. [memory::InMemoryDriver]
//! is the reference implementation.

pub mod memory;
mod schema;

pub use schema::*;

use crate::action::{ActionKind, Modification};
use crate::common::{FieldPath, Value};
use crate::document::Document;
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use crate::query::QueryPlan;

/// The revision field drivers use unless configured otherwise.
pub const DEFAULT_REVISION_FIELD: &str = "DocstoreRevision";

/// The condition a write must satisfy against the stored row.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// Unconditional.
    None,
    /// No row with the key exists.
    Absent,
    /// A row with the key exists.
    Present,
    /// A row with the key exists and its revision field holds this value.
    Revision(Value),
}

/// One fully-encoded write.
///
/// For Create, Replace and Put, `document` holds the complete encoded
/// document, already carrying `new_revision` when a revision field is
/// configured. For Update, `mods` holds the modifications, including the
/// revision bump.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub kind: ActionKind,
    pub key: Value,
    pub document: Option<Value>,
    pub mods: Vec<(FieldPath, Modification)>,
    pub precondition: Precondition,
    /// The field a [Precondition::Revision] is checked against.
    pub revision_field: Option<String>,
    pub new_revision: Option<Value>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    /// Encoded rows, each a [Value::Map].
    pub rows: Vec<Value>,
    /// Where the next page resumes; `None` once the results are exhausted.
    pub next_token: Option<String>,
}

/// Executes one planned query, one page per call.
pub trait QueryRunner: Send {
    /// Fetches the page that starts at `token`, or the first page.
    fn run_page(&mut self, token: Option<&str>) -> DocResult<QueryPage>;

    /// Whether the runner already skipped the plan's offset, in which case
    /// the iterator must not skip it again.
    fn applies_offset(&self) -> bool {
        false
    }
}

/// Why a transaction did not commit.
#[derive(Debug, Clone)]
pub struct CommitError {
    /// Staging position of the write that failed, when one write is to
    /// blame. The core needs it to map a precondition failure onto the
    /// kind that fits that write's action.
    pub write: Option<usize>,
    pub error: DocStoreError,
}

impl CommitError {
    pub fn at(write: usize, error: DocStoreError) -> Self {
        CommitError {
            write: Some(write),
            error,
        }
    }
}

impl From<DocStoreError> for CommitError {
    fn from(error: DocStoreError) -> Self {
        CommitError { write: None, error }
    }
}

/// A multi-write atomic unit.
pub trait Transaction {
    /// Stages a write. Precondition failures may surface here or at commit.
    fn write(&mut self, request: &WriteRequest) -> DocResult<()>;

    /// Applies every staged write, or none of them.
    fn commit(self: Box<Self>) -> Result<(), CommitError>;
}

/// The backing-store adapter.
///
/// Precondition violations must be reported with
/// [ErrorKind::FailedPrecondition]; the core maps them onto the domain kind
/// that fits the action. Any other non-domain error is wrapped as `Unknown`.
pub trait Driver: Send + Sync {
    fn table_schema(&self) -> &TableSchema;

    /// The field holding the optimistic-concurrency token, if any.
    fn revision_field(&self) -> Option<&str>;

    /// Computes the primary key of a document, or `None` when a key field
    /// is absent or null.
    ///
    /// The key is the partition key value, or a two-element list of the
    /// partition and sort key values when the table has a sort key.
    fn key(&self, document: &Document) -> DocResult<Option<Value>> {
        let schema = self.table_schema();
        let partition = match document.get_field(schema.partition_key())? {
            Some(value) if !value.is_null() => value,
            _ => return Ok(None),
        };
        match schema.sort_key() {
            None => Ok(Some(partition)),
            Some(sort_key) => match document.get_field(sort_key)? {
                Some(value) if !value.is_null() => Ok(Some(Value::List(vec![partition, value]))),
                _ => Ok(None),
            },
        }
    }

    fn write(&self, request: &WriteRequest) -> DocResult<()>;

    /// Starts a transaction. Drivers without transactions report
    /// `Unimplemented`.
    fn begin_transaction(&self) -> DocResult<Box<dyn Transaction + '_>> {
        log::error!("Driver for {} does not support transactions", self.table_schema().name());
        Err(DocStoreError::new(
            "driver does not support transactions",
            ErrorKind::Unimplemented,
        ))
    }

    /// Most keys a single `batch_get` call may carry.
    fn max_batch_get_size(&self) -> usize {
        100
    }

    /// Reads the rows for `keys`, projected to `field_paths` (everything
    /// when empty). Rows always include the key fields. Keys with no row
    /// are simply left out.
    fn batch_get(&self, keys: &[Value], field_paths: &[FieldPath]) -> DocResult<Vec<Value>>;

    fn query_runner(&self, plan: &QueryPlan) -> DocResult<Box<dyn QueryRunner>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::InMemoryDriver;
    use crate::value_map;

    #[test]
    fn test_default_key_function() {
        let driver = InMemoryDriver::new(TableSchema::new("t", "id").with_sort_key("rev"));
        let doc = Document::from_value(value_map! { "id": "a", "rev": 2 }).unwrap();
        assert_eq!(
            driver.key(&doc).unwrap(),
            Some(Value::List(vec![Value::from("a"), Value::Int(2)]))
        );

        let partial = Document::from_value(value_map! { "id": "a" }).unwrap();
        assert!(driver.key(&partial).unwrap().is_none());

        let simple = InMemoryDriver::new(TableSchema::new("t", "id"));
        assert_eq!(simple.key(&partial).unwrap(), Some(Value::from("a")));
        let null_key = Document::from_value(value_map! { "id": Value::Null }).unwrap();
        assert!(simple.key(&null_key).unwrap().is_none());
    }
}
