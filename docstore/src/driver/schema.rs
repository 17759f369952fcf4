use std::fmt::{Display, Formatter};

/// Which non-key attributes an index carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every attribute of the table.
    All,
    /// Only the table's and the index's key attributes.
    KeysOnly,
    /// The key attributes plus the named ones.
    Include(Vec<String>),
}

/// Key layout and projection of a secondary index.
///
/// A local index shares the table's partition key and brings its own sort
/// key. A global index has a partition key of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    name: String,
    partition_key: String,
    sort_key: Option<String>,
    projection: Projection,
}

impl IndexSchema {
    pub fn new(name: &str, partition_key: &str) -> Self {
        IndexSchema {
            name: name.to_string(),
            partition_key: partition_key.to_string(),
            sort_key: None,
            projection: Projection::All,
        }
    }

    pub fn with_sort_key(mut self, sort_key: &str) -> Self {
        self.sort_key = Some(sort_key.to_string());
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

/// Key layout of a table and its secondary indexes.
///
/// # Usage
/// ```rust
/// use docstore::driver::{IndexSchema, Projection, TableSchema};
///
/// let schema = TableSchema::new("books", "title")
///     .with_sort_key("publisher")
///     .with_local_index(IndexSchema::new("local_index_1", "title").with_sort_key("price"))
///     .with_global_index(
///         IndexSchema::new("global_index_3", "author")
///             .with_projection(Projection::Include(vec!["price".into()])),
///     );
/// assert_eq!(schema.key_fields(), vec!["title", "publisher"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    partition_key: String,
    sort_key: Option<String>,
    local_indexes: Vec<IndexSchema>,
    global_indexes: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn new(name: &str, partition_key: &str) -> Self {
        TableSchema {
            name: name.to_string(),
            partition_key: partition_key.to_string(),
            sort_key: None,
            local_indexes: Vec::new(),
            global_indexes: Vec::new(),
        }
    }

    pub fn with_sort_key(mut self, sort_key: &str) -> Self {
        self.sort_key = Some(sort_key.to_string());
        self
    }

    /// Adds a local index. Its partition key is forced to the table's.
    pub fn with_local_index(mut self, mut index: IndexSchema) -> Self {
        index.partition_key = self.partition_key.clone();
        self.local_indexes.push(index);
        self
    }

    pub fn with_global_index(mut self, index: IndexSchema) -> Self {
        self.global_indexes.push(index);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    pub fn local_indexes(&self) -> &[IndexSchema] {
        &self.local_indexes
    }

    pub fn global_indexes(&self) -> &[IndexSchema] {
        &self.global_indexes
    }

    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.local_indexes
            .iter()
            .chain(self.global_indexes.iter())
            .find(|index| index.name == name)
    }

    /// The primary key attributes: partition key, then sort key.
    pub fn key_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.partition_key.as_str()];
        if let Some(sort_key) = &self.sort_key {
            fields.push(sort_key);
        }
        fields
    }

    /// Whether `index` carries every one of `fields`.
    ///
    /// An empty field list means the whole document is wanted, which only
    /// an `All` projection satisfies.
    pub fn index_covers(&self, index: &IndexSchema, fields: &[String]) -> bool {
        match &index.projection {
            Projection::All => true,
            _ if fields.is_empty() => false,
            Projection::KeysOnly => fields.iter().all(|f| self.is_index_key(index, f)),
            Projection::Include(included) => fields
                .iter()
                .all(|f| self.is_index_key(index, f) || included.iter().any(|i| i == f)),
        }
    }

    fn is_index_key(&self, index: &IndexSchema, field: &str) -> bool {
        field == self.partition_key
            || self.sort_key.as_deref() == Some(field)
            || field == index.partition_key
            || index.sort_key.as_deref() == Some(field)
    }
}

impl Display for TableSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}", self.name, self.partition_key)?;
        if let Some(sort_key) = &self.sort_key {
            write!(f, ", {}", sort_key)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books() -> TableSchema {
        TableSchema::new("books", "title")
            .with_sort_key("publisher")
            .with_local_index(IndexSchema::new("local_index_1", "ignored").with_sort_key("price"))
            .with_global_index(
                IndexSchema::new("global_index_2", "author")
                    .with_sort_key("price")
                    .with_projection(Projection::KeysOnly),
            )
            .with_global_index(
                IndexSchema::new("global_index_3", "author")
                    .with_projection(Projection::Include(vec!["price".into()])),
            )
    }

    #[test]
    fn test_local_index_shares_partition_key() {
        let schema = books();
        assert_eq!(schema.local_indexes()[0].partition_key(), "title");
        assert_eq!(schema.to_string(), "books(title, publisher)");
    }

    #[test]
    fn test_index_covers() {
        let schema = books();
        let keys_only = schema.index("global_index_2").unwrap();
        let include = schema.index("global_index_3").unwrap();
        let local = schema.index("local_index_1").unwrap();

        assert!(schema.index_covers(keys_only, &["price".into(), "title".into()]));
        assert!(!schema.index_covers(keys_only, &["pages".into()]));
        assert!(schema.index_covers(include, &["price".into()]));
        assert!(!schema.index_covers(include, &[]));
        assert!(schema.index_covers(local, &[]));
    }
}
