use crate::codec::FieldCache;
use crate::collection::Collection;
use crate::driver::Driver;
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::sync::Arc;

const DEFAULT_MAX_OUTSTANDING_ACTION_CALLS: usize = 10;

/// Settings of a [Collection].
///
/// Cheap to clone; every clone shares the same settings.
#[derive(Clone)]
pub struct CollectionConfig {
    /// The pointer to implementation.
    inner: Arc<CollectionConfigInner>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            inner: Arc::new(CollectionConfigInner::default()),
        }
    }
}

impl CollectionConfig {
    /// Upper bound on concurrent driver calls while running an action list.
    pub fn max_outstanding_action_calls(&self) -> usize {
        self.inner.max_outstanding_action_calls
    }

    /// Whether queries may fall back to a full scan.
    pub fn allow_scans(&self) -> bool {
        self.inner.allow_scans
    }

    /// The configured revision field: `None` to use the driver's,
    /// `Some(None)` when revisions are disabled.
    pub fn revision_field(&self) -> Option<Option<&str>> {
        self.inner.revision_field.as_ref().map(|field| field.as_deref())
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.inner.field_cache
    }
}

struct CollectionConfigInner {
    max_outstanding_action_calls: usize,
    allow_scans: bool,
    revision_field: Option<Option<String>>,
    field_cache: FieldCache,
}

impl Default for CollectionConfigInner {
    fn default() -> Self {
        CollectionConfigInner {
            max_outstanding_action_calls: DEFAULT_MAX_OUTSTANDING_ACTION_CALLS,
            allow_scans: true,
            revision_field: None,
            field_cache: FieldCache::new(),
        }
    }
}

/// Builder for a [Collection].
///
/// Captures the first invalid setting and reports it from
/// [CollectionBuilder::build].
///
/// # Usage
/// ```rust
/// use docstore::collection::Collection;
/// use docstore::driver::memory::InMemoryDriver;
/// use docstore::driver::TableSchema;
///
/// let collection = Collection::builder(InMemoryDriver::new(TableSchema::new("books", "title")))
///     .max_outstanding_action_calls(4)
///     .allow_scans(false)
///     .revision_field(Some("version"))
///     .build()
///     .unwrap();
/// assert_eq!(collection.revision_field(), Some("version"));
/// ```
pub struct CollectionBuilder {
    driver: Box<dyn Driver>,
    config: CollectionConfigInner,
    error: Option<DocStoreError>,
}

impl CollectionBuilder {
    pub(crate) fn new(driver: Box<dyn Driver>) -> Self {
        CollectionBuilder {
            driver,
            config: CollectionConfigInner::default(),
            error: None,
        }
    }

    fn capture(&mut self, message: &str) {
        if self.error.is_none() {
            log::error!("Invalid collection setting: {}", message);
            self.error = Some(DocStoreError::new(message, ErrorKind::InvalidArgument));
        }
    }

    /// Sets the worker pool size for writes and batch reads. Must be
    /// positive.
    pub fn max_outstanding_action_calls(mut self, calls: usize) -> Self {
        if calls == 0 {
            self.capture("max outstanding action calls must be positive");
        } else {
            self.config.max_outstanding_action_calls = calls;
        }
        self
    }

    /// When disabled, a query that can only be answered by a full scan
    /// fails instead.
    pub fn allow_scans(mut self, allow: bool) -> Self {
        self.config.allow_scans = allow;
        self
    }

    /// Overrides the driver's revision field; `None` disables revisions.
    pub fn revision_field(mut self, field: Option<&str>) -> Self {
        if field == Some("") {
            self.capture("revision field name cannot be empty");
        } else {
            self.config.revision_field = Some(field.map(str::to_string));
        }
        self
    }

    /// Shares a field cache between collections.
    pub fn field_cache(mut self, cache: FieldCache) -> Self {
        self.config.field_cache = cache;
        self
    }

    pub fn build(self) -> DocResult<Collection> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if let Some(Some(field)) = &self.config.revision_field {
            if self.driver.table_schema().key_fields().iter().any(|key| *key == field.as_str()) {
                log::error!("Revision field {} is a key field", field);
                return Err(DocStoreError::new(
                    &format!("revision field {} is a key field", field),
                    ErrorKind::InvalidArgument,
                ));
            }
        }

        let config = CollectionConfig {
            inner: Arc::new(self.config),
        };
        Ok(Collection::with_config(self.driver, config))
    }
}
