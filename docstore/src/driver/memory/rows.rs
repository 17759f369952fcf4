use crate::action::{ActionKind, Modification};
use crate::common::{FieldPath, Value};
use crate::driver::{Precondition, WriteRequest};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use crate::query::lookup;
use std::collections::BTreeMap;

/// Computes the row a write leaves behind, `None` for a deleted row, after
/// checking the write's precondition against `current`.
pub(crate) fn apply_write(request: &WriteRequest, current: Option<&Value>) -> DocResult<Option<Value>> {
    check_precondition(request, current)?;

    match request.kind {
        ActionKind::Create | ActionKind::Replace | ActionKind::Put => match &request.document {
            Some(document) => Ok(Some(document.clone())),
            None => Err(internal(&format!("{} request without a document", request.kind))),
        },
        ActionKind::Delete => Ok(None),
        ActionKind::Update => {
            let mut row = match current {
                Some(row) => row.clone(),
                None => return Err(precondition_failed(request, "no stored row to update")),
            };
            for (path, modification) in &request.mods {
                apply_modification(&mut row, path, modification)?;
            }
            Ok(Some(row))
        }
        ActionKind::Get => Err(internal("get is not a write")),
    }
}

fn check_precondition(request: &WriteRequest, current: Option<&Value>) -> DocResult<()> {
    match (&request.precondition, current) {
        (Precondition::None, _) => Ok(()),
        (Precondition::Absent, None) => Ok(()),
        (Precondition::Absent, Some(_)) => Err(precondition_failed(request, "row exists")),
        (Precondition::Present, Some(_)) => Ok(()),
        (Precondition::Present, None) => Err(precondition_failed(request, "row does not exist")),
        (Precondition::Revision(_), None) => Err(precondition_failed(request, "row does not exist")),
        (Precondition::Revision(expected), Some(row)) => {
            let stored = request
                .revision_field
                .as_deref()
                .and_then(|field| row.as_map().and_then(|map| map.get(field)));
            if stored == Some(expected) {
                Ok(())
            } else {
                Err(precondition_failed(request, "revision does not match"))
            }
        }
    }
}

fn precondition_failed(request: &WriteRequest, reason: &str) -> DocStoreError {
    log::error!("Precondition of {} on {} failed: {}", request.kind, request.key, reason);
    DocStoreError::new(
        &format!("precondition of {} on {} failed: {}", request.kind, request.key, reason),
        ErrorKind::FailedPrecondition,
    )
}

fn internal(message: &str) -> DocStoreError {
    log::error!("{}", message);
    DocStoreError::new(message, ErrorKind::Internal)
}

/// Applies one update modification to a stored row.
pub(crate) fn apply_modification(row: &mut Value, path: &FieldPath, modification: &Modification) -> DocResult<()> {
    let (parents, last) = path.segments().split_at(path.len() - 1);
    let create = !matches!(modification, Modification::Delete);
    let parent = match descend(row, parents, create)? {
        Some(parent) => parent,
        None => return Ok(()),
    };
    let field = &last[0];

    match modification {
        Modification::Set(value) => {
            parent.insert(field.clone(), value.clone());
        }
        Modification::Delete => {
            parent.remove(field);
        }
        Modification::Increment(amount) => {
            let current = parent.get(field).cloned().unwrap_or(Value::Int(0));
            parent.insert(field.clone(), add(&current, amount, path)?);
        }
    }
    Ok(())
}

fn descend<'v>(
    row: &'v mut Value,
    segments: &[String],
    create: bool,
) -> DocResult<Option<&'v mut BTreeMap<String, Value>>> {
    let mut current = row;
    for segment in segments {
        let map = match current {
            Value::Map(map) => map,
            other => return Err(not_a_map(segment, other)),
        };
        if !map.contains_key(segment) {
            if !create {
                return Ok(None);
            }
            map.insert(segment.clone(), Value::Map(BTreeMap::new()));
        }
        current = match map.get_mut(segment) {
            Some(next) => next,
            None => return Ok(None),
        };
        if create && current.is_null() {
            *current = Value::Map(BTreeMap::new());
        }
    }
    match current {
        Value::Map(map) => Ok(Some(map)),
        other => Err(not_a_map("field", other)),
    }
}

fn not_a_map(segment: &str, value: &Value) -> DocStoreError {
    log::error!("Cannot descend into {} holding a {}", segment, value.kind_name());
    DocStoreError::new(
        &format!("cannot descend into {} holding a {}", segment, value.kind_name()),
        ErrorKind::InvalidArgument,
    )
}

fn add(current: &Value, amount: &Value, path: &FieldPath) -> DocResult<Value> {
    match (current, amount) {
        (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(|| {
            log::error!("Increment of {} overflows", path);
            DocStoreError::new(&format!("increment of {} overflows", path), ErrorKind::InvalidArgument)
        }),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => {
                log::error!("Cannot increment {} holding a {}", path, current.kind_name());
                Err(DocStoreError::new(
                    &format!("cannot increment {} holding a {}", path, current.kind_name()),
                    ErrorKind::InvalidArgument,
                ))
            }
        },
    }
}

/// Copies `fields` of `row` into a new row, keeping the nesting of each
/// path. Missing fields are left out.
pub(crate) fn project<S: AsRef<str>>(row: &Value, fields: &[FieldPath], always: &[S]) -> Value {
    let mut projected = Value::Map(BTreeMap::new());
    for path in fields {
        if let Some(value) = lookup(row, path) {
            // a projected row only holds maps along the copied paths
            let _ = apply_modification(&mut projected, path, &Modification::Set(value.clone()));
        }
    }
    if let (Some(source), Some(target)) = (row.as_map(), projected.as_map_mut()) {
        for field in always {
            if let Some(value) = source.get(field.as_ref()) {
                target.insert(field.as_ref().to_string(), value.clone());
            }
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_map;

    fn path(p: &str) -> FieldPath {
        p.parse().unwrap()
    }

    fn request(kind: ActionKind, precondition: Precondition, document: Option<Value>) -> WriteRequest {
        WriteRequest {
            kind,
            key: Value::from("a"),
            document,
            mods: vec![],
            precondition,
            revision_field: Some("rev".into()),
            new_revision: None,
        }
    }

    #[test]
    fn test_preconditions() {
        let stored = value_map! { "id": "a", "rev": "r1" };
        let doc = Some(value_map! { "id": "a" });

        assert!(apply_write(&request(ActionKind::Create, Precondition::Absent, doc.clone()), None).is_ok());
        let err = apply_write(&request(ActionKind::Create, Precondition::Absent, doc.clone()), Some(&stored));
        assert_eq!(err.unwrap_err().kind(), &ErrorKind::FailedPrecondition);

        let matching = Precondition::Revision(Value::from("r1"));
        assert!(apply_write(&request(ActionKind::Put, matching, doc.clone()), Some(&stored)).is_ok());
        let stale = Precondition::Revision(Value::from("r0"));
        let err = apply_write(&request(ActionKind::Put, stale, doc.clone()), Some(&stored));
        assert_eq!(err.unwrap_err().kind(), &ErrorKind::FailedPrecondition);

        let err = apply_write(&request(ActionKind::Replace, Precondition::Present, doc), None);
        assert_eq!(err.unwrap_err().kind(), &ErrorKind::FailedPrecondition);

        let deleted = apply_write(&request(ActionKind::Delete, Precondition::None, None), None).unwrap();
        assert!(deleted.is_none());
    }

    #[test]
    fn test_modifications() {
        let mut row = value_map! { "id": "a", "n": 1, "meta": value_map! { "x": 1.5 } };
        apply_modification(&mut row, &path("n"), &Modification::Increment(Value::Int(2))).unwrap();
        apply_modification(&mut row, &path("meta.x"), &Modification::Increment(Value::Int(1))).unwrap();
        apply_modification(&mut row, &path("meta.y"), &Modification::Increment(Value::Int(1))).unwrap();
        apply_modification(&mut row, &path("a.b"), &Modification::Set(Value::from("c"))).unwrap();
        apply_modification(&mut row, &path("id"), &Modification::Delete).unwrap();
        apply_modification(&mut row, &path("gone.deep"), &Modification::Delete).unwrap();
        assert_eq!(
            row,
            value_map! {
                "n": 3,
                "meta": value_map! { "x": 2.5, "y": 1 },
                "a": value_map! { "b": "c" }
            }
        );

        let err = apply_modification(&mut row, &path("n.z"), &Modification::Set(Value::Int(1)));
        assert_eq!(err.unwrap_err().kind(), &ErrorKind::InvalidArgument);
        let err = apply_modification(&mut row, &path("a.b"), &Modification::Increment(Value::Int(1)));
        assert_eq!(err.unwrap_err().kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_project_keeps_nesting_and_keys() {
        let row = value_map! { "id": "a", "x": 1, "meta": value_map! { "p": 2, "q": 3 } };
        let projected = project(&row, &[path("meta.p"), path("missing")], &["id"]);
        assert_eq!(projected, value_map! { "id": "a", "meta": value_map! { "p": 2 } });
    }
}
