use crate::common::{FieldPath, Value};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Comparison operator of a [Filter].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
}

impl FilterOp {
    /// The statement form of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Equal => "=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
            FilterOp::In => "IN",
            FilterOp::NotIn => "NOT IN",
        }
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NotIn)
    }
}

impl Display for FilterOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

impl FromStr for FilterOp {
    type Err = DocStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" => Ok(FilterOp::Equal),
            "<" => Ok(FilterOp::LessThan),
            "<=" => Ok(FilterOp::LessThanOrEqual),
            ">" => Ok(FilterOp::GreaterThan),
            ">=" => Ok(FilterOp::GreaterThanOrEqual),
            "in" => Ok(FilterOp::In),
            "not-in" => Ok(FilterOp::NotIn),
            _ => {
                log::error!("Unknown filter operator {}", s);
                Err(DocStoreError::new(
                    &format!("unknown filter operator {}", s),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }
}

/// A `(field path, operator, value)` constraint of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field_path: FieldPath,
    op: FilterOp,
    value: Value,
}

impl Filter {
    /// Builds a filter, rejecting values the operator cannot compare with.
    pub fn new(field_path: FieldPath, op: FilterOp, value: Value) -> DocResult<Self> {
        if value.is_null() {
            return Err(bad_value(&field_path, "null is not a comparable value"));
        }
        match (op.is_membership(), &value) {
            (true, Value::List(items)) => {
                if items.iter().any(|item| !item.is_comparable_scalar()) {
                    return Err(bad_value(&field_path, "list values must be scalars"));
                }
            }
            (true, _) => return Err(bad_value(&field_path, "IN and NOT IN need a list value")),
            (false, v) if !v.is_comparable_scalar() => {
                return Err(bad_value(&field_path, "value must be a scalar"))
            }
            _ => {}
        }

        Ok(Filter { field_path, op, value })
    }

    pub fn field_path(&self) -> &FieldPath {
        &self.field_path
    }

    pub fn op(&self) -> FilterOp {
        self.op
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether this is an equality filter on the top-level field `name`.
    pub fn is_equality_on(&self, name: &str) -> bool {
        self.op == FilterOp::Equal && self.targets(name)
    }

    pub fn targets(&self, name: &str) -> bool {
        self.field_path.len() == 1 && self.field_path.head() == name
    }

    /// Renders the predicate, e.g. `title = 'X'`.
    pub fn to_predicate(&self) -> String {
        format!("{} {} {}", self.field_path, self.op, self.value.to_literal())
    }

    /// Evaluates the filter against an encoded row. A missing field, or a
    /// field of a kind that does not compare with the filter value, never
    /// matches.
    pub fn matches(&self, row: &Value) -> bool {
        let field = match lookup(row, &self.field_path) {
            Some(field) => field,
            None => return false,
        };

        match self.op {
            FilterOp::In => self.list_contains(field),
            FilterOp::NotIn => !self.list_contains(field),
            _ => match compare(field, &self.value) {
                Some(ordering) => match self.op {
                    FilterOp::Equal => ordering == Ordering::Equal,
                    FilterOp::LessThan => ordering == Ordering::Less,
                    FilterOp::LessThanOrEqual => ordering != Ordering::Greater,
                    FilterOp::GreaterThan => ordering == Ordering::Greater,
                    FilterOp::GreaterThanOrEqual => ordering != Ordering::Less,
                    FilterOp::In | FilterOp::NotIn => false,
                },
                None => false,
            },
        }
    }

    fn list_contains(&self, field: &Value) -> bool {
        match &self.value {
            Value::List(items) => items
                .iter()
                .any(|item| compare(field, item) == Some(Ordering::Equal)),
            _ => false,
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_predicate())
    }
}

fn bad_value(field_path: &FieldPath, message: &str) -> DocStoreError {
    log::error!("Invalid filter on {}: {}", field_path, message);
    DocStoreError::new(
        &format!("invalid filter on {}: {}", field_path, message),
        ErrorKind::InvalidArgument,
    )
}

/// Reads the value at `path` inside an encoded row.
pub(crate) fn lookup<'v>(row: &'v Value, path: &FieldPath) -> Option<&'v Value> {
    let mut current = row;
    for segment in path.segments() {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}

/// Orders two values of comparable kinds; numbers compare across widths.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (x, y) if x.is_number() && y.is_number() => Some(x.cmp(y)),
        (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Bytes(_), Value::Bytes(_)) => Some(a.cmp(b)),
        _ => None,
    }
}
