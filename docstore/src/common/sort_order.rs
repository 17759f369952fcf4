use crate::errors::{DocStoreError, ErrorKind};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Specifies the direction of a query's `order_by` field.
///
/// Parsed from `"asc"`/`"desc"` in any case; the statement renderer emits
/// `DESC` for descending and nothing for ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Smallest to largest.
    #[default]
    Ascending,
    /// Largest to smallest.
    Descending,
}

impl SortOrder {
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::Ascending)
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "asc"),
            SortOrder::Descending => write!(f, "desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = DocStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            _ => {
                log::error!("Unknown sort order {}", s);
                Err(DocStoreError::new(
                    &format!("unknown sort order {}, want asc or desc", s),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }
}
