use crate::action::grouping::{group_actions, group_by_field_paths};
use crate::action::{Action, ActionKind, Modification};
use crate::common::{run_bounded, FieldPath, Permits, Value};
use crate::document::Document;
use crate::driver::{CommitError, Driver, Precondition, WriteRequest};
use crate::errors::{ActionFailure, ActionListError, DocResult, DocStoreError, ErrorKind};
use std::collections::{HashMap, HashSet};
use std::thread;
use uuid::Uuid;

/// Runs validated action lists against a driver.
///
/// Every driver call of a run, from either stream, holds one of
/// `max_outstanding` permits while it is in flight.
pub(crate) struct Executor<'d> {
    driver: &'d dyn Driver,
    revision_field: Option<&'d str>,
    max_outstanding: usize,
    permits: Permits,
}

/// A write that went through, waiting for its revision to be stamped.
struct Completed<'a> {
    action: Action<'a>,
    new_revision: Option<Value>,
}

type Outcome<'a> = Result<Completed<'a>, ActionFailure>;

fn failure(index: usize, error: DocStoreError) -> ActionFailure {
    ActionFailure { index, error }
}

fn invalid(index: usize, message: &str) -> ActionFailure {
    log::error!("Action {} is invalid: {}", index, message);
    failure(index, DocStoreError::new(message, ErrorKind::InvalidArgument))
}

impl<'d> Executor<'d> {
    pub fn new(driver: &'d dyn Driver, revision_field: Option<&'d str>, max_outstanding: usize) -> Self {
        let max_outstanding = max_outstanding.max(1);
        Executor {
            driver,
            revision_field,
            max_outstanding,
            permits: Permits::new(max_outstanding),
        }
    }

    /// Validates, groups and executes `actions`.
    ///
    /// Pre-gets run first. Reads and writes then run as two concurrent
    /// streams: a read is not guaranteed to observe a write of the same
    /// list. Post-gets run once both streams are done.
    pub fn run(&self, mut actions: Vec<Action<'_>>) -> Result<(), ActionListError> {
        let failures = self.validate(&mut actions);
        if !failures.is_empty() {
            return Err(ActionListError::new(failures));
        }

        let groups = group_actions(actions);
        log::debug!(
            "Running {} action(s): {} pre-get(s), {} read(s), {} write(s), {} atomic write(s), {} post-get(s)",
            groups.len(),
            groups.pre_gets.len(),
            groups.reads.len(),
            groups.writes.len(),
            groups.atomic_writes.len(),
            groups.post_gets.len()
        );

        let mut failures = self.run_gets(groups.pre_gets);

        let reads = groups.reads;
        let writes = groups.writes;
        let atomic_writes = groups.atomic_writes;
        let read_indices: Vec<usize> = reads.iter().map(|a| a.index).collect();
        let write_indices: Vec<usize> = writes.iter().chain(atomic_writes.iter()).map(|a| a.index).collect();
        let (read_failures, outcomes) = thread::scope(|scope| {
            let read_stream = scope.spawn(move || self.run_gets(reads));
            let write_stream = scope.spawn(move || {
                let mut outcomes = self.run_writes(writes);
                outcomes.extend(self.run_atomic_writes(atomic_writes));
                outcomes
            });

            let read_failures = read_stream.join().unwrap_or_else(|_| {
                log::error!("Read stream panicked");
                read_indices
                    .iter()
                    .map(|i| failure(*i, DocStoreError::new("read stream panicked", ErrorKind::Internal)))
                    .collect()
            });
            let outcomes = write_stream.join().unwrap_or_else(|_| {
                log::error!("Write stream panicked");
                write_indices
                    .iter()
                    .map(|i| Err(failure(*i, DocStoreError::new("write stream panicked", ErrorKind::Internal))))
                    .collect()
            });
            (read_failures, outcomes)
        });
        failures.extend(read_failures);

        for outcome in outcomes {
            match outcome {
                Ok(completed) => {
                    if let Err(e) = self.stamp_revision(completed) {
                        failures.push(e);
                    }
                }
                Err(e) => failures.push(e),
            }
        }

        log::debug!("Write phases done, running {} post-get(s)", groups.post_gets.len());
        failures.extend(self.run_gets(groups.post_gets));

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ActionListError::new(failures))
        }
    }

    fn validate(&self, actions: &mut [Action<'_>]) -> Vec<ActionFailure> {
        let mut failures = Vec::new();
        let mut write_keys = HashSet::new();
        let key_fields: Vec<String> = self
            .driver
            .table_schema()
            .key_fields()
            .into_iter()
            .map(str::to_string)
            .collect();

        for action in actions.iter_mut() {
            if let Some(err) = action.build_error.take() {
                failures.push(failure(action.index, err));
                continue;
            }

            let key = match self.driver.key(action.document) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    failures.push(invalid(action.index, &format!("{} action is missing a key", action.kind)));
                    continue;
                }
                Err(e) => {
                    failures.push(failure(action.index, e));
                    continue;
                }
            };

            if action.kind == ActionKind::Create {
                match self.current_revision(action.document) {
                    Ok(Some(_)) => {
                        failures.push(invalid(action.index, "create action has a revision"));
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        failures.push(failure(action.index, e));
                        continue;
                    }
                }
            }

            if action.kind == ActionKind::Update {
                if action.mods.is_empty() {
                    failures.push(invalid(action.index, "update action has no modifications"));
                    continue;
                }
                if let Some(message) = self.check_mods(&action.mods, &key_fields) {
                    failures.push(invalid(action.index, &message));
                    continue;
                }
            }

            if action.kind.is_write() && !write_keys.insert(key.clone()) {
                failures.push(invalid(action.index, &format!("duplicate write of key {}", key)));
                continue;
            }

            action.key = Some(key);
        }
        failures
    }

    fn check_mods(&self, mods: &[(FieldPath, Modification)], key_fields: &[String]) -> Option<String> {
        let mut seen: HashSet<&FieldPath> = HashSet::new();
        for (path, modification) in mods {
            if key_fields.iter().any(|k| k == path.head()) {
                return Some(format!("update modifies key field {}", path));
            }
            if self.revision_field == Some(path.head()) {
                return Some(format!("update modifies revision field {}", path));
            }
            if let Modification::Increment(amount) = modification {
                if !amount.is_number() {
                    return Some(format!("increment of {} by a non-number", path));
                }
            }
            if !seen.insert(path) {
                return Some(format!("field {} modified twice", path));
            }
        }

        // a path may not be a prefix of another
        for (a, _) in mods {
            for (b, _) in mods {
                if a.len() < b.len() && b.segments().starts_with(a.segments()) {
                    return Some(format!("modifications of {} and {} overlap", a, b));
                }
            }
        }
        None
    }

    fn current_revision(&self, document: &Document) -> DocResult<Option<Value>> {
        match self.revision_field {
            None => Ok(None),
            Some(field) => Ok(document.get_field(field)?.filter(|v| !v.is_empty_token())),
        }
    }

    fn run_gets(&self, gets: Vec<Action<'_>>) -> Vec<ActionFailure> {
        if gets.is_empty() {
            return Vec::new();
        }

        let batch_size = self.driver.max_batch_get_size().max(1);
        let mut batches = Vec::new();
        for (field_paths, group) in group_by_field_paths(gets) {
            let mut group = group.into_iter().peekable();
            while group.peek().is_some() {
                let batch: Vec<Action<'_>> = group.by_ref().take(batch_size).collect();
                batches.push((field_paths.clone(), batch));
            }
        }

        log::trace!("Dispatching {} batch get(s)", batches.len());
        run_bounded(batches, self.max_outstanding, |(field_paths, batch)| {
            self.batch_get(&field_paths, batch)
        })
        .into_iter()
        .flatten()
        .collect()
    }

    /// Reads one batch and matches rows back to actions by key.
    fn batch_get(&self, field_paths: &[FieldPath], batch: Vec<Action<'_>>) -> Vec<ActionFailure> {
        let mut pending: HashMap<Value, Vec<Action<'_>>> = HashMap::new();
        let mut keys = Vec::new();
        for action in batch {
            if let Some(key) = action.key.clone() {
                let entry = pending.entry(key.clone()).or_default();
                if entry.is_empty() {
                    keys.push(key);
                }
                entry.push(action);
            }
        }

        let fetched = {
            let _permit = self.permits.acquire();
            self.driver.batch_get(&keys, field_paths)
        };
        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                let e = DocStoreError::wrap(e);
                return pending
                    .into_values()
                    .flatten()
                    .map(|action| failure(action.index, e.clone()))
                    .collect();
            }
        };

        let mut failures = Vec::new();
        for row in rows {
            let key = match Document::from_value(row.clone()).and_then(|doc| self.driver.key(&doc)) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    log::warn!("Batch get returned a row without a key");
                    continue;
                }
                Err(e) => {
                    log::warn!("Batch get returned an unreadable row: {}", e);
                    continue;
                }
            };

            match pending.remove(&key) {
                Some(actions) => {
                    for action in actions {
                        if let Err(e) = action.document.decode_stored(&row, self.revision_field) {
                            failures.push(failure(action.index, e));
                        }
                    }
                }
                None => log::warn!("Batch get returned a row for unrequested key {}", key),
            }
        }

        for (key, actions) in pending {
            for action in actions {
                log::error!("No document with key {}", key);
                failures.push(failure(
                    action.index,
                    DocStoreError::new(&format!("no document with key {}", key), ErrorKind::NotFound),
                ));
            }
        }
        failures
    }

    fn run_writes<'a>(&self, writes: Vec<Action<'a>>) -> Vec<Outcome<'a>> {
        if writes.is_empty() {
            return Vec::new();
        }
        log::trace!("Dispatching {} write(s)", writes.len());
        run_bounded(writes, self.max_outstanding, |action| {
            let (request, had_revision) = match self.write_request(&action) {
                Ok(built) => built,
                Err(e) => return Err(failure(action.index, e)),
            };
            log::trace!("Writing {}", action);
            let written = {
                let _permit = self.permits.acquire();
                self.driver.write(&request)
            };
            match written {
                Ok(()) => Ok(Completed {
                    action,
                    new_revision: request.new_revision,
                }),
                Err(e) => Err(failure(action.index, map_write_error(action.kind, had_revision, e))),
            }
        })
    }

    fn run_atomic_writes<'a>(&self, writes: Vec<Action<'a>>) -> Vec<Outcome<'a>> {
        if writes.is_empty() {
            return Vec::new();
        }
        log::trace!("Dispatching {} atomic write(s) in one transaction", writes.len());

        match self.transact(&writes) {
            Ok(revisions) => writes
                .into_iter()
                .zip(revisions)
                .map(|(action, new_revision)| Ok(Completed { action, new_revision }))
                .collect(),
            Err(e) => {
                log::error!("Atomic write group failed: {}", e);
                writes
                    .into_iter()
                    .map(|action| Err(failure(action.index, e.clone())))
                    .collect()
            }
        }
    }

    fn transact(&self, writes: &[Action<'_>]) -> DocResult<Vec<Option<Value>>> {
        let _permit = self.permits.acquire();
        let mut transaction = self.driver.begin_transaction()?;
        let mut revisions = Vec::with_capacity(writes.len());
        let mut staged = Vec::with_capacity(writes.len());
        for action in writes {
            let (request, had_revision) = self.write_request(action)?;
            transaction
                .write(&request)
                .map_err(|e| map_write_error(action.kind, had_revision, e))?;
            revisions.push(request.new_revision);
            staged.push((action.kind, had_revision));
        }

        if let Err(CommitError { write, error }) = transaction.commit() {
            return Err(match write.and_then(|position| staged.get(position)) {
                Some((kind, had_revision)) => map_write_error(*kind, *had_revision, error),
                None => DocStoreError::wrap(error),
            });
        }
        Ok(revisions)
    }

    /// Encodes an action. Also reports whether it carried a revision.
    fn write_request(&self, action: &Action<'_>) -> DocResult<(WriteRequest, bool)> {
        let key = match &action.key {
            Some(key) => key.clone(),
            None => return Err(DocStoreError::new("write without a key", ErrorKind::Internal)),
        };
        let revision = self.current_revision(action.document)?;
        let had_revision = revision.is_some();
        let new_revision = match self.revision_field {
            Some(_) if action.kind.bumps_revision() => Some(Value::String(Uuid::new_v4().to_string())),
            _ => None,
        };

        let precondition = match (action.kind, revision) {
            (ActionKind::Create, _) => Precondition::Absent,
            (_, Some(revision)) => Precondition::Revision(revision),
            (ActionKind::Replace | ActionKind::Update, None) => Precondition::Present,
            _ => Precondition::None,
        };

        let document = if action.kind.writes_document() {
            let mut encoded = action.document.to_value()?;
            if let (Some(field), Some(revision), Some(map)) =
                (self.revision_field, &new_revision, encoded.as_map_mut())
            {
                map.insert(field.to_string(), revision.clone());
            }
            Some(encoded)
        } else {
            None
        };

        let mut mods = action.mods.clone();
        if action.kind == ActionKind::Update {
            if let (Some(field), Some(revision)) = (self.revision_field, &new_revision) {
                mods.push((FieldPath::new(&[field])?, Modification::Set(revision.clone())));
            }
        }

        Ok((
            WriteRequest {
                kind: action.kind,
                key,
                document,
                mods,
                precondition,
                revision_field: self.revision_field.map(str::to_string),
                new_revision,
            },
            had_revision,
        ))
    }

    fn stamp_revision(&self, completed: Completed<'_>) -> Result<(), ActionFailure> {
        let Completed { action, new_revision } = completed;
        match (self.revision_field, new_revision) {
            (Some(field), Some(revision)) if action.document.accepts_field(field) => action
                .document
                .set_field(field, revision)
                .map_err(|e| failure(action.index, e)),
            _ => Ok(()),
        }
    }
}

/// Maps a driver's precondition failure onto the kind that fits the action.
fn map_write_error(kind: ActionKind, had_revision: bool, err: DocStoreError) -> DocStoreError {
    if err.kind() != &ErrorKind::FailedPrecondition {
        return DocStoreError::wrap(err);
    }

    let (error_kind, message) = match (kind, had_revision) {
        (_, true) => (ErrorKind::FailedPrecondition, "revision does not match"),
        (ActionKind::Create, false) => (ErrorKind::AlreadyExists, "document already exists"),
        (ActionKind::Replace | ActionKind::Update, false) => (ErrorKind::NotFound, "document not found"),
        _ => (ErrorKind::FailedPrecondition, "precondition failed"),
    };
    log::error!("{} failed: {}", kind, message);
    DocStoreError::new_with_cause(&format!("{}: {}", kind, message), error_kind, err)
}
