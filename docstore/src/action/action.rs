use crate::common::{FieldPath, Value};
use crate::document::Document;
use crate::errors::DocStoreError;
use std::fmt::{Display, Formatter};

/// The operation an [Action] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Insert a new document; fails if the key exists.
    Create,
    /// Overwrite an existing document; fails if the key is absent.
    Replace,
    /// Insert or overwrite.
    Put,
    /// Read a document, optionally projected.
    Get,
    /// Remove a document.
    Delete,
    /// Apply modifications to an existing document.
    Update,
}

impl ActionKind {
    pub fn is_write(&self) -> bool {
        !matches!(self, ActionKind::Get)
    }

    /// Whether the write stores a complete document.
    pub fn writes_document(&self) -> bool {
        matches!(self, ActionKind::Create | ActionKind::Replace | ActionKind::Put)
    }

    /// Whether the write produces a new revision.
    pub fn bumps_revision(&self) -> bool {
        matches!(
            self,
            ActionKind::Create | ActionKind::Replace | ActionKind::Put | ActionKind::Update
        )
    }
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::Create => "create",
            ActionKind::Replace => "replace",
            ActionKind::Put => "put",
            ActionKind::Get => "get",
            ActionKind::Delete => "delete",
            ActionKind::Update => "update",
        };
        write!(f, "{}", name)
    }
}

/// A change to one field path of a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    /// Set the field, creating intermediate documents.
    Set(Value),
    /// Remove the field if present.
    Delete,
    /// Add a number to the field; an absent field counts as zero.
    Increment(Value),
}

impl Display for Modification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Modification::Set(value) => write!(f, "= {}", value),
            Modification::Delete => write!(f, "delete"),
            Modification::Increment(value) => write!(f, "+= {}", value),
        }
    }
}

/// One requested operation against one document.
///
/// The document is borrowed exclusively for the lifetime of the owning
/// [crate::action::ActionList]; the engine writes fetched fields and new
/// revisions back into it.
pub struct Action<'a> {
    pub(crate) kind: ActionKind,
    pub(crate) document: &'a mut Document,
    pub(crate) field_paths: Vec<FieldPath>,
    pub(crate) mods: Vec<(FieldPath, Modification)>,
    pub(crate) atomic: bool,
    pub(crate) key: Option<Value>,
    pub(crate) index: usize,
    // a malformed path seen while building, reported by validation
    pub(crate) build_error: Option<DocStoreError>,
}

impl<'a> Action<'a> {
    pub(crate) fn new(kind: ActionKind, document: &'a mut Document, index: usize, atomic: bool) -> Self {
        Action {
            kind,
            document,
            field_paths: Vec::new(),
            mods: Vec::new(),
            atomic,
            key: None,
            index,
            build_error: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Position in the original submission order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    /// The resolved key; set once the list has been validated.
    pub fn key(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    pub fn field_paths(&self) -> &[FieldPath] {
        &self.field_paths
    }

    pub fn mods(&self) -> &[(FieldPath, Modification)] {
        &self.mods
    }

    pub fn document(&self) -> &Document {
        self.document
    }
}

impl Display for Action<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}({})", self.kind, key),
            None => write!(f, "{}(?)", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(!ActionKind::Get.is_write());
        assert!(ActionKind::Delete.is_write());
        assert!(!ActionKind::Delete.bumps_revision());
        assert!(ActionKind::Update.bumps_revision());
        assert!(!ActionKind::Update.writes_document());
        assert_eq!(ActionKind::Replace.to_string(), "replace");
    }

    #[test]
    fn test_action_display() {
        let mut doc = Document::new();
        let mut action = Action::new(ActionKind::Put, &mut doc, 0, false);
        assert_eq!(action.to_string(), "put(?)");
        action.key = Some(Value::from("k"));
        assert_eq!(action.to_string(), "put(\"k\")");
        assert_eq!(Modification::Increment(Value::Int(2)).to_string(), "+= 2");
    }
}
