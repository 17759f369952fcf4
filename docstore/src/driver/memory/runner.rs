use crate::common::{FieldPath, SortOrder, Value};
use crate::driver::memory::rows::project;
use crate::driver::{IndexSchema, Projection, QueryPage, QueryRunner, TableSchema};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use crate::query::{lookup, AccessPath, QueryPlan};
use std::cmp::Ordering;

/// Serves the rows matching a plan, one page at a time.
///
/// The matching rows are computed once, when the runner is created; a
/// continuation token is the position of the next row.
pub(crate) struct InMemoryQueryRunner {
    rows: Vec<Value>,
    page_size: usize,
}

impl InMemoryQueryRunner {
    pub(crate) fn new(schema: &TableSchema, plan: &QueryPlan, snapshot: Vec<Value>, page_size: usize) -> DocResult<Self> {
        let mut rows = match plan.access() {
            AccessPath::Index(name) => {
                let index = match schema.index(name) {
                    Some(index) => index,
                    None => {
                        log::error!("Table {} has no index {}", schema, name);
                        return Err(DocStoreError::new(
                            &format!("table {} has no index {}", schema.name(), name),
                            ErrorKind::InvalidArgument,
                        ));
                    }
                };
                snapshot
                    .into_iter()
                    .filter(|row| in_index(index, row))
                    .map(|row| index_row(schema, index, row))
                    .collect()
            }
            AccessPath::Table | AccessPath::Scan => snapshot,
        };

        rows.retain(|row| plan.filters().iter().all(|filter| filter.matches(row)));

        match plan.order_by() {
            Some((field, order)) => sort_rows(&mut rows, field, *order),
            None => {
                if let Some(sort_key) = plan.sort_key() {
                    sort_rows(&mut rows, &FieldPath::new(&[sort_key])?, SortOrder::Ascending);
                }
            }
        }

        if !plan.fields().is_empty() {
            let keys = schema.key_fields();
            rows = rows.iter().map(|row| project(row, plan.fields(), &keys)).collect();
        }

        log::debug!("{} matched {} row(s)", plan.statement(), rows.len());
        Ok(InMemoryQueryRunner {
            rows,
            page_size: page_size.max(1),
        })
    }
}

impl QueryRunner for InMemoryQueryRunner {
    fn run_page(&mut self, token: Option<&str>) -> DocResult<QueryPage> {
        let start = match token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                log::error!("Invalid pagination token {}", token);
                DocStoreError::new(
                    &format!("invalid pagination token {}", token),
                    ErrorKind::InvalidArgument,
                )
            })?,
        };

        let start = start.min(self.rows.len());
        let end = (start + self.page_size).min(self.rows.len());
        Ok(QueryPage {
            rows: self.rows[start..end].to_vec(),
            next_token: if end < self.rows.len() { Some(end.to_string()) } else { None },
        })
    }
}

/// Indexes are sparse: a row missing an index key attribute is not in it.
fn in_index(index: &IndexSchema, row: &Value) -> bool {
    let has = |field: &str| {
        row.as_map()
            .and_then(|map| map.get(field))
            .is_some_and(|value| !value.is_null())
    };
    has(index.partition_key()) && index.sort_key().map_or(true, has)
}

/// The row as the index stores it.
fn index_row(schema: &TableSchema, index: &IndexSchema, row: Value) -> Value {
    let mut keys = schema.key_fields();
    keys.push(index.partition_key());
    if let Some(sort_key) = index.sort_key() {
        keys.push(sort_key);
    }
    match index.projection() {
        Projection::All => row,
        Projection::KeysOnly => project(&row, &[], &keys),
        Projection::Include(fields) => {
            keys.extend(fields.iter().map(String::as_str));
            project(&row, &[], &keys)
        }
    }
}

fn sort_rows(rows: &mut [Value], field: &FieldPath, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ordering = match (lookup(a, field), lookup(b, field)) {
            (Some(a), Some(b)) => a.cmp(b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if order.is_ascending() {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use crate::value_map;

    fn schema() -> TableSchema {
        TableSchema::new("books", "title").with_global_index(
            IndexSchema::new("by_author", "author")
                .with_sort_key("price")
                .with_projection(Projection::Include(vec!["pages".into()])),
        )
    }

    fn snapshot() -> Vec<Value> {
        vec![
            value_map! { "title": "A", "author": "X", "price": 3, "pages": 10, "tag": "t" },
            value_map! { "title": "B", "author": "X", "price": 1, "pages": 20, "tag": "t" },
            value_map! { "title": "C", "author": "Y", "price": 2, "pages": 30, "tag": "t" },
            value_map! { "title": "D", "author": "X", "pages": 40 },
        ]
    }

    fn plan(access: AccessPath, filters: Vec<Filter>, sort_key: Option<&str>) -> QueryPlan {
        QueryPlan {
            relation: match &access {
                AccessPath::Index(name) => name.clone(),
                _ => "books".to_string(),
            },
            access,
            partition_key: None,
            sort_key: sort_key.map(str::to_string),
            filters,
            order_by: None,
            fields: vec![],
            limit: None,
            offset: None,
            statement: String::new(),
        }
    }

    fn titles(runner: &mut InMemoryQueryRunner) -> Vec<String> {
        let mut titles = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = runner.run_page(token.as_deref()).unwrap();
            titles.extend(page.rows.iter().map(|r| r.as_map().unwrap()["title"].as_str().unwrap().to_string()));
            match page.next_token {
                Some(next) => token = Some(next),
                None => return titles,
            }
        }
    }

    #[test]
    fn test_index_is_sparse_projected_and_sorted() {
        let author = Filter::new("author".parse().unwrap(), "=".parse().unwrap(), Value::from("X")).unwrap();
        let plan = plan(AccessPath::Index("by_author".into()), vec![author], Some("price"));
        let mut runner = InMemoryQueryRunner::new(&schema(), &plan, snapshot(), 1).unwrap();
        assert_eq!(titles(&mut runner), vec!["B", "A"]);

        let first = runner.run_page(None).unwrap();
        assert_eq!(
            first.rows[0],
            value_map! { "title": "B", "author": "X", "price": 1, "pages": 20 }
        );
        assert_eq!(first.next_token.as_deref(), Some("1"));
    }

    #[test]
    fn test_scan_with_order_and_projection() {
        let mut plan = plan(AccessPath::Scan, vec![], None);
        plan.order_by = Some(("pages".parse().unwrap(), SortOrder::Descending));
        plan.fields = vec!["pages".parse().unwrap()];
        let mut runner = InMemoryQueryRunner::new(&schema(), &plan, snapshot(), 3).unwrap();
        let page = runner.run_page(None).unwrap();
        assert_eq!(page.rows[0], value_map! { "title": "D", "pages": 40 });
        assert_eq!(titles(&mut runner), vec!["D", "C", "B", "A"]);
    }

    #[test]
    fn test_bad_token_and_unknown_index() {
        let mut runner = InMemoryQueryRunner::new(&schema(), &plan(AccessPath::Scan, vec![], None), snapshot(), 2).unwrap();
        assert_eq!(runner.run_page(Some("x")).unwrap_err().kind(), &ErrorKind::InvalidArgument);

        let missing = plan(AccessPath::Index("nope".into()), vec![], None);
        assert!(InMemoryQueryRunner::new(&schema(), &missing, snapshot(), 2).is_err());
    }
}
