use crate::errors::{DocResult, DocStoreError, ErrorKind};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A path to a possibly nested field, one segment per level.
///
/// Displayed and parsed in dotted form: `author.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: SmallVec<[String; 4]>,
}

impl FieldPath {
    pub fn new<S: AsRef<str>>(segments: &[S]) -> DocResult<Self> {
        validate_path(segments)?;
        Ok(FieldPath {
            segments: segments.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The first segment, which names a top-level field.
    pub fn head(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = DocStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: SmallVec<[&str; 4]> = s.split('.').collect();
        FieldPath::new(&segments)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = DocStoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Checks that a path has at least one segment and no empty segment.
pub fn validate_path<S: AsRef<str>>(path: &[S]) -> DocResult<()> {
    if path.is_empty() {
        log::error!("Field path is empty");
        return Err(DocStoreError::new("field path is empty", ErrorKind::InvalidArgument));
    }
    if path.iter().any(|segment| segment.as_ref().is_empty()) {
        let dotted: Vec<&str> = path.iter().map(|s| s.as_ref()).collect();
        log::error!("Field path {} has an empty segment", dotted.join("."));
        return Err(DocStoreError::new(
            &format!("field path {} has an empty segment", dotted.join(".")),
            ErrorKind::InvalidArgument,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        let path: FieldPath = "author.name".parse().unwrap();
        assert_eq!(path.segments(), &["author".to_string(), "name".to_string()]);
        assert_eq!(path.head(), "author");
        assert_eq!(path.to_string(), "author.name");
    }

    #[test]
    fn test_rejects_empty_segments() {
        assert!("".parse::<FieldPath>().is_err());
        assert!("a..b".parse::<FieldPath>().is_err());
        assert!(FieldPath::try_from("a.").is_err());
        let empty: [&str; 0] = [];
        assert_eq!(validate_path(&empty).unwrap_err().kind(), &ErrorKind::InvalidArgument);
    }
}
