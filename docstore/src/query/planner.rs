use crate::common::{FieldPath, SortOrder};
use crate::driver::{IndexSchema, TableSchema};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use crate::query::plan::render_statement;
use crate::query::{AccessPath, Filter, QueryPlan};

/// The constraints a plan is chosen for.
pub(crate) struct PlanRequest<'q> {
    pub filters: &'q [Filter],
    pub order_by: Option<&'q (FieldPath, SortOrder)>,
    pub fields: &'q [FieldPath],
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub allow_scans: bool,
}

/// A candidate relation: `None` index means the base table.
struct Candidate<'s> {
    index: Option<&'s IndexSchema>,
    partition_key: &'s str,
    sort_key: Option<&'s str>,
}

/// Picks the cheapest access path for a query.
///
/// Candidates are tried in a fixed order, first match wins:
/// 1. partition-key equality on the table, with the table's sort key or a
///    covering local index's sort key filtered and consistent with the
///    ordering;
/// 2. a covering global index with a sort key, with equality on its
///    partition key, its sort key filtered, ordering consistent;
/// 3. the table on partition-key equality alone, ordering consistent;
/// 4. a covering global index on partition-key equality alone, ordering
///    consistent.
///
/// Otherwise the query scans, which cannot honor an ordering.
pub(crate) struct QueryPlanner<'s> {
    schema: &'s TableSchema,
}

impl<'s> QueryPlanner<'s> {
    pub fn new(schema: &'s TableSchema) -> Self {
        QueryPlanner { schema }
    }

    pub fn plan(&self, request: &PlanRequest<'_>) -> DocResult<QueryPlan> {
        let plan = match self.best_queryable(request) {
            Some(candidate) => {
                let (access, relation) = match candidate.index {
                    Some(index) => (AccessPath::Index(index.name().to_string()), index.name().to_string()),
                    None => (AccessPath::Table, self.schema.name().to_string()),
                };
                self.build(
                    request,
                    access,
                    relation,
                    Some(candidate.partition_key.to_string()),
                    candidate.sort_key.map(str::to_string),
                )
            }
            None => {
                if let Some((field, _)) = request.order_by {
                    log::error!("Query ordered by {} can only be answered by a scan", field);
                    return Err(DocStoreError::new(
                        &format!(
                            "query ordered by {} needs an equality filter on the partition key of a table or index whose sort key is {}",
                            field, field
                        ),
                        ErrorKind::InvalidArgument,
                    ));
                }
                if !request.allow_scans {
                    log::error!("Query on {} needs a scan and scans are disabled", self.schema.name());
                    return Err(DocStoreError::new(
                        "query needs a full scan and scans are disabled",
                        ErrorKind::InvalidArgument,
                    ));
                }
                self.build(request, AccessPath::Scan, self.schema.name().to_string(), None, None)
            }
        };

        log::debug!("Planned {} as {}", plan.statement(), plan.explain());
        Ok(plan)
    }

    fn build(
        &self,
        request: &PlanRequest<'_>,
        access: AccessPath,
        relation: String,
        partition_key: Option<String>,
        sort_key: Option<String>,
    ) -> QueryPlan {
        let statement = render_statement(
            &relation,
            request.fields,
            request.filters,
            request.order_by,
            request.limit,
            request.offset,
        );
        QueryPlan {
            access,
            relation,
            partition_key,
            sort_key,
            filters: request.filters.to_vec(),
            order_by: request.order_by.cloned(),
            fields: request.fields.to_vec(),
            limit: request.limit,
            offset: request.offset,
            statement,
        }
    }

    fn best_queryable(&self, request: &PlanRequest<'_>) -> Option<Candidate<'s>> {
        let schema = self.schema;

        if has_equality_filter(request, schema.partition_key()) {
            if has_filter(request, schema.sort_key()) && ordering_consistent(request, schema.sort_key()) {
                return Some(Candidate {
                    index: None,
                    partition_key: schema.partition_key(),
                    sort_key: schema.sort_key(),
                });
            }
            for index in schema.local_indexes() {
                if has_filter(request, index.sort_key())
                    && self.fields_included(request, index)
                    && ordering_consistent(request, index.sort_key())
                {
                    return Some(Candidate {
                        index: Some(index),
                        partition_key: schema.partition_key(),
                        sort_key: index.sort_key(),
                    });
                }
            }
        }

        for index in schema.global_indexes() {
            if index.sort_key().is_none() {
                continue;
            }
            if has_equality_filter(request, index.partition_key())
                && has_filter(request, index.sort_key())
                && self.fields_included(request, index)
                && ordering_consistent(request, index.sort_key())
            {
                return Some(Candidate {
                    index: Some(index),
                    partition_key: index.partition_key(),
                    sort_key: index.sort_key(),
                });
            }
        }

        if has_equality_filter(request, schema.partition_key()) && ordering_consistent(request, schema.sort_key()) {
            return Some(Candidate {
                index: None,
                partition_key: schema.partition_key(),
                sort_key: schema.sort_key(),
            });
        }

        // local indexes share the table's partition key, nothing to gain
        for index in schema.global_indexes() {
            if has_equality_filter(request, index.partition_key())
                && self.fields_included(request, index)
                && ordering_consistent(request, index.sort_key())
            {
                return Some(Candidate {
                    index: Some(index),
                    partition_key: index.partition_key(),
                    sort_key: index.sort_key(),
                });
            }
        }

        None
    }

    /// Whether `index` carries every projected and filtered field. A query
    /// without a projection wants whole documents.
    fn fields_included(&self, request: &PlanRequest<'_>, index: &IndexSchema) -> bool {
        if request.fields.is_empty() {
            return self.schema.index_covers(index, &[]);
        }
        let wanted: Vec<String> = request
            .fields
            .iter()
            .chain(request.filters.iter().map(Filter::field_path))
            .map(|path| path.head().to_string())
            .collect();
        self.schema.index_covers(index, &wanted)
    }
}

fn has_equality_filter(request: &PlanRequest<'_>, field: &str) -> bool {
    request.filters.iter().any(|f| f.is_equality_on(field))
}

fn has_filter(request: &PlanRequest<'_>, field: Option<&str>) -> bool {
    match field {
        Some(field) => request.filters.iter().any(|f| f.targets(field)),
        None => false,
    }
}

fn ordering_consistent(request: &PlanRequest<'_>, sort_key: Option<&str>) -> bool {
    match request.order_by {
        None => true,
        Some((field, _)) => field.len() == 1 && Some(field.head()) == sort_key,
    }
}
