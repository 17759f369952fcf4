use crate::common::{FieldPath, Value};
use crate::driver::memory::config::InMemoryDriverConfig;
use crate::driver::memory::rows::{apply_write, project};
use crate::driver::memory::runner::InMemoryQueryRunner;
use crate::driver::memory::transaction::InMemoryTransaction;
use crate::driver::memory::InMemoryDriverBuilder;
use crate::driver::{Driver, QueryRunner, TableSchema, Transaction, WriteRequest};
use crate::errors::DocResult;
use crate::query::QueryPlan;
use crossbeam_skiplist::SkipMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A [Driver] keeping one table in memory.
///
/// # Purpose
/// The reference adapter for the driver contracts. Rows live in a
/// concurrent skip list keyed by primary key; conditional writes and
/// transaction commits are serialized by a single write lock, while reads
/// never block.
///
/// # Characteristics
/// - **Conditional writes**: preconditions are checked against the stored
///   row and reported as `FailedPrecondition`
/// - **Transactions**: every staged precondition is checked before any
///   row changes
/// - **Queries**: plans are evaluated over a snapshot taken when the runner
///   is created, then served in pages with numeric continuation tokens
///
/// # Usage
/// ```rust
/// use docstore::driver::memory::InMemoryDriver;
/// use docstore::driver::TableSchema;
///
/// let driver = InMemoryDriver::builder(TableSchema::new("books", "title"))
///     .page_size(10)
///     .revision_field(None)
///     .build()
///     .unwrap();
/// assert!(driver.is_empty());
/// ```
#[derive(Clone)]
pub struct InMemoryDriver {
    inner: Arc<InMemoryDriverInner>,
}

impl InMemoryDriver {
    /// A driver for `schema` with default settings.
    pub fn new(schema: TableSchema) -> Self {
        InMemoryDriver::with_config(InMemoryDriverConfig::new(schema))
    }

    pub fn builder(schema: TableSchema) -> InMemoryDriverBuilder {
        InMemoryDriverBuilder::new(schema)
    }

    pub(crate) fn with_config(config: InMemoryDriverConfig) -> Self {
        InMemoryDriver {
            inner: Arc::new(InMemoryDriverInner {
                config,
                rows: SkipMap::new(),
                write_lock: Mutex::new(()),
                batch_get_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.inner.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rows.is_empty()
    }

    /// The stored row for a primary key.
    pub fn row(&self, key: &Value) -> Option<Value> {
        self.inner.rows.get(key).map(|entry| entry.value().clone())
    }

    /// How many `batch_get` calls this driver has served.
    pub fn batch_get_calls(&self) -> usize {
        self.inner.batch_get_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn inner(&self) -> &InMemoryDriverInner {
        &self.inner
    }
}

pub(crate) struct InMemoryDriverInner {
    config: InMemoryDriverConfig,
    rows: SkipMap<Value, Value>,
    write_lock: Mutex<()>,
    batch_get_calls: AtomicUsize,
}

impl InMemoryDriverInner {
    pub(crate) fn current(&self, key: &Value) -> Option<Value> {
        self.rows.get(key).map(|entry| entry.value().clone())
    }

    /// Runs `f` while holding the write lock.
    pub(crate) fn locked<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.write_lock.lock();
        f(self)
    }

    pub(crate) fn store(&self, key: Value, row: Option<Value>) {
        match row {
            Some(row) => {
                self.rows.insert(key, row);
            }
            None => {
                self.rows.remove(&key);
            }
        }
    }

    fn snapshot(&self) -> Vec<Value> {
        self.rows.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl Driver for InMemoryDriver {
    fn table_schema(&self) -> &TableSchema {
        self.inner.config.schema()
    }

    fn revision_field(&self) -> Option<&str> {
        self.inner.config.revision_field()
    }

    fn write(&self, request: &WriteRequest) -> DocResult<()> {
        log::trace!("Writing {} on {}", request.kind, request.key);
        self.inner.locked(|inner| {
            let row = apply_write(request, inner.current(&request.key).as_ref())?;
            inner.store(request.key.clone(), row);
            Ok(())
        })
    }

    fn begin_transaction(&self) -> DocResult<Box<dyn Transaction + '_>> {
        Ok(Box::new(InMemoryTransaction::new(self.inner())))
    }

    fn max_batch_get_size(&self) -> usize {
        self.inner.config.max_batch_get_size()
    }

    fn batch_get(&self, keys: &[Value], field_paths: &[FieldPath]) -> DocResult<Vec<Value>> {
        self.inner.batch_get_calls.fetch_add(1, Ordering::Relaxed);
        log::trace!("Batch get of {} key(s) from {}", keys.len(), self.table_schema().name());

        let mut always = self.table_schema().key_fields();
        if let Some(revision_field) = self.revision_field() {
            always.push(revision_field);
        }
        Ok(keys
            .iter()
            .filter_map(|key| self.inner.current(key))
            .map(|row| {
                if field_paths.is_empty() {
                    row
                } else {
                    project(&row, field_paths, &always)
                }
            })
            .collect())
    }

    fn query_runner(&self, plan: &QueryPlan) -> DocResult<Box<dyn QueryRunner>> {
        let runner = InMemoryQueryRunner::new(
            self.table_schema(),
            plan,
            self.inner.snapshot(),
            self.inner.config.page_size(),
        )?;
        Ok(Box::new(runner))
    }
}
