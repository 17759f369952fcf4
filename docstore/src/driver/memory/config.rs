use crate::driver::memory::InMemoryDriver;
use crate::driver::{TableSchema, DEFAULT_REVISION_FIELD};
use crate::errors::{DocResult, DocStoreError, ErrorKind};

const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_MAX_BATCH_GET_SIZE: usize = 100;

/// Settings of an [InMemoryDriver].
pub(crate) struct InMemoryDriverConfig {
    schema: TableSchema,
    revision_field: Option<String>,
    page_size: usize,
    max_batch_get_size: usize,
}

impl InMemoryDriverConfig {
    pub(crate) fn new(schema: TableSchema) -> Self {
        InMemoryDriverConfig {
            schema,
            revision_field: Some(DEFAULT_REVISION_FIELD.to_string()),
            page_size: DEFAULT_PAGE_SIZE,
            max_batch_get_size: DEFAULT_MAX_BATCH_GET_SIZE,
        }
    }

    pub(crate) fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub(crate) fn revision_field(&self) -> Option<&str> {
        self.revision_field.as_deref()
    }

    pub(crate) fn page_size(&self) -> usize {
        self.page_size
    }

    pub(crate) fn max_batch_get_size(&self) -> usize {
        self.max_batch_get_size
    }
}

/// Builder for an [InMemoryDriver].
///
/// Invalid settings are captured and reported by [InMemoryDriverBuilder::build];
/// the first one wins.
pub struct InMemoryDriverBuilder {
    config: InMemoryDriverConfig,
    error: Option<DocStoreError>,
}

impl InMemoryDriverBuilder {
    pub(crate) fn new(schema: TableSchema) -> Self {
        InMemoryDriverBuilder {
            config: InMemoryDriverConfig::new(schema),
            error: None,
        }
    }

    fn invalid(&mut self, message: &str) {
        if self.error.is_none() {
            log::error!("Invalid in-memory driver setting: {}", message);
            self.error = Some(DocStoreError::new(message, ErrorKind::InvalidArgument));
        }
    }

    /// Names the revision field, or disables revisions with `None`.
    /// Defaults to [DEFAULT_REVISION_FIELD].
    pub fn revision_field(mut self, field: Option<&str>) -> Self {
        match field {
            Some("") => self.invalid("revision field name cannot be empty"),
            Some(field) if self.config.schema.key_fields().iter().any(|key| *key == field) => {
                self.invalid(&format!("revision field {} is a key field", field))
            }
            _ => self.config.revision_field = field.map(str::to_string),
        }
        self
    }

    /// Rows per query page.
    pub fn page_size(mut self, page_size: usize) -> Self {
        if page_size == 0 {
            self.invalid("page size must be positive");
        } else {
            self.config.page_size = page_size;
        }
        self
    }

    /// Most keys served by one batch get.
    pub fn max_batch_get_size(mut self, size: usize) -> Self {
        if size == 0 {
            self.invalid("max batch get size must be positive");
        } else {
            self.config.max_batch_get_size = size;
        }
        self
    }

    pub fn build(self) -> DocResult<InMemoryDriver> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(InMemoryDriver::with_config(self.config))
    }
}
