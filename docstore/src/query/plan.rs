use crate::common::{FieldPath, SortOrder};
use crate::query::Filter;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// The access path a plan reads through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPath {
    /// A key query against the base table.
    Table,
    /// A key query against a local or global index.
    Index(String),
    /// A full scan of the base table.
    Scan,
}

/// An executable query plan.
///
/// Produced by the planner; carries everything a driver needs to run the
/// query, plus the rendered statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub(crate) access: AccessPath,
    pub(crate) relation: String,
    pub(crate) partition_key: Option<String>,
    pub(crate) sort_key: Option<String>,
    pub(crate) filters: Vec<Filter>,
    pub(crate) order_by: Option<(FieldPath, SortOrder)>,
    pub(crate) fields: Vec<FieldPath>,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: Option<usize>,
    pub(crate) statement: String,
}

impl QueryPlan {
    pub fn access(&self) -> &AccessPath {
        &self.access
    }

    pub fn is_scan(&self) -> bool {
        self.access == AccessPath::Scan
    }

    /// The table or index name the statement reads from.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// The partition key of the relation, unless scanning.
    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }

    /// The sort key of the relation; rows of a key query come back in this
    /// order.
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order_by(&self) -> Option<&(FieldPath, SortOrder)> {
        self.order_by.as_ref()
    }

    pub fn fields(&self) -> &[FieldPath] {
        &self.fields
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Human-readable access path: `Scan`, `Table` or `Index: "name"`.
    pub fn explain(&self) -> String {
        match &self.access {
            AccessPath::Scan => "Scan".to_string(),
            AccessPath::Table => "Table".to_string(),
            AccessPath::Index(name) => format!("Index: {:?}", name),
        }
    }
}

impl Display for QueryPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.explain())
    }
}

/// Renders `SELECT <fields|*> FROM <relation> [WHERE ..] [ORDER BY ..]
/// [LIMIT n] [OFFSET n];`.
pub(crate) fn render_statement(
    relation: &str,
    fields: &[FieldPath],
    filters: &[Filter],
    order_by: Option<&(FieldPath, SortOrder)>,
    limit: Option<usize>,
    offset: Option<usize>,
) -> String {
    let projection = if fields.is_empty() {
        "*".to_string()
    } else {
        fields.iter().join(", ")
    };

    let mut statement = format!("SELECT {} FROM {}", projection, relation);
    if !filters.is_empty() {
        statement.push_str(" WHERE ");
        statement.push_str(&filters.iter().map(Filter::to_predicate).join(" AND "));
    }
    if let Some((field, order)) = order_by {
        statement.push_str(&format!(" ORDER BY {}", field));
        if *order == SortOrder::Descending {
            statement.push_str(" DESC");
        }
    }
    if let Some(limit) = limit {
        statement.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = offset {
        statement.push_str(&format!(" OFFSET {}", offset));
    }
    statement.push(';');
    statement
}
