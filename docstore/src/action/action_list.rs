use crate::action::executor::Executor;
use crate::action::{Action, ActionKind, Modification};
use crate::collection::Collection;
use crate::common::FieldPath;
use crate::document::Document;
use crate::errors::{ActionListError, DocResult};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// A batch of actions against one collection, executed together by
/// [ActionList::run].
///
/// # Purpose
/// Lets callers submit mixed reads and writes in one call. The engine
/// groups them into phases, batches the gets, runs writes concurrently and
/// commits atomic groups in one transaction.
///
/// # Atomic groups
/// Writes added after [ActionList::enable_atomic_writes] and before
/// [ActionList::disable_atomic_writes] commit together or not at all.
///
/// # Usage
/// ```rust
/// use docstore::collection::Collection;
/// use docstore::document::Document;
/// use docstore::driver::memory::InMemoryDriver;
/// use docstore::driver::TableSchema;
/// use docstore::value_map;
///
/// let collection = Collection::new(InMemoryDriver::new(TableSchema::new("books", "title")));
/// let mut dune = Document::from_value(value_map! { "title": "Dune", "pages": 412 }).unwrap();
/// let mut copy = Document::from_value(value_map! { "title": "Dune" }).unwrap();
///
/// collection.actions().put(&mut dune).run().unwrap();
/// collection.actions().get(&mut copy, &[]).run().unwrap();
/// assert_eq!(copy.get_field("pages").unwrap().unwrap().as_int(), Some(412));
/// ```
pub struct ActionList<'a> {
    collection: Collection,
    actions: Vec<Action<'a>>,
    atomic: bool,
}

impl<'a> ActionList<'a> {
    pub(crate) fn new(collection: Collection) -> Self {
        ActionList {
            collection,
            actions: Vec::new(),
            atomic: false,
        }
    }

    fn add(mut self, kind: ActionKind, document: &'a mut Document) -> Self {
        document.attach_cache(self.collection.field_cache());
        let atomic = self.atomic && kind.is_write();
        let action = Action::new(kind, document, self.actions.len(), atomic);
        self.actions.push(action);
        self
    }

    fn last_mut(&mut self) -> Option<&mut Action<'a>> {
        self.actions.last_mut()
    }

    /// Adds an action that inserts `document`; fails if its key exists.
    pub fn create(self, document: &'a mut Document) -> Self {
        self.add(ActionKind::Create, document)
    }

    /// Adds an action that overwrites an existing document.
    pub fn replace(self, document: &'a mut Document) -> Self {
        self.add(ActionKind::Replace, document)
    }

    /// Adds an action that inserts or overwrites `document`.
    pub fn put(self, document: &'a mut Document) -> Self {
        self.add(ActionKind::Put, document)
    }

    /// Adds an action that removes the document with `document`'s key.
    pub fn delete(self, document: &'a mut Document) -> Self {
        self.add(ActionKind::Delete, document)
    }

    /// Adds an action that reads the document with `document`'s key into
    /// `document`. With `field_paths` given, only those fields (and the
    /// key) are read.
    pub fn get(self, document: &'a mut Document, field_paths: &[&str]) -> Self {
        let mut list = self.add(ActionKind::Get, document);
        let parsed: DocResult<Vec<FieldPath>> = field_paths.iter().map(|p| p.parse::<FieldPath>()).collect();
        if let Some(action) = list.last_mut() {
            match parsed {
                Ok(paths) => action.field_paths = paths,
                Err(e) => action.build_error = Some(e),
            }
        }
        list
    }

    /// Adds an action that applies `mods` to the stored document with
    /// `document`'s key.
    pub fn update<'m, I>(self, document: &'a mut Document, mods: I) -> Self
    where
        I: IntoIterator<Item = (&'m str, Modification)>,
    {
        let mut list = self.add(ActionKind::Update, document);
        let parsed: DocResult<Vec<(FieldPath, Modification)>> = mods
            .into_iter()
            .map(|(path, modification)| -> DocResult<(FieldPath, Modification)> {
                Ok((path.parse::<FieldPath>()?, modification))
            })
            .collect();
        if let Some(action) = list.last_mut() {
            match parsed {
                Ok(mods) => action.mods = mods,
                Err(e) => action.build_error = Some(e),
            }
        }
        list
    }

    /// Starts an atomic group: subsequent writes commit together.
    pub fn enable_atomic_writes(mut self) -> Self {
        self.atomic = true;
        self
    }

    /// Ends the atomic group.
    pub fn disable_atomic_writes(mut self) -> Self {
        self.atomic = false;
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Executes every action.
    ///
    /// The error lists each failed action by its position in this list.
    /// A failing plain write does not stop its siblings; a failing atomic
    /// group fails every action in it. If any action is malformed, nothing
    /// is executed.
    pub fn run(self) -> Result<(), ActionListError> {
        if self.actions.is_empty() {
            return Ok(());
        }
        let collection = self.collection;
        let executor = Executor::new(
            collection.driver(),
            collection.revision_field(),
            collection.config().max_outstanding_action_calls(),
        );
        executor.run(self.actions)
    }
}

impl Display for ActionList<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let driver = self.collection.driver();
        let rendered = self
            .actions
            .iter()
            .map(|action| match driver.key(action.document()) {
                Ok(Some(key)) => format!("{}({})", action.kind(), key),
                _ => format!("{}(?)", action.kind()),
            })
            .join(", ");
        write!(f, "[{}]", rendered)
    }
}
