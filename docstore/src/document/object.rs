use crate::codec::{FieldCache, FieldInfo};
use crate::common::{Convertible, Value};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};

/// A typed record that can back a [crate::document::Document].
///
/// Implementations are generated by `#[derive(DocumentObject)]`: the derive
/// emits the field descriptor table and index-dispatched accessors, so no
/// runtime reflection is involved. Field indices are positions in the
/// `describe()` list.
pub trait DocumentObject: Any + Send {
    /// The Rust type name, used in error messages.
    fn type_name(&self) -> &'static str;

    /// Field descriptors in declaration order, skipped fields excluded.
    fn describe(&self) -> Vec<FieldInfo>;

    fn field_value(&self, index: usize) -> DocResult<Value>;

    /// Converts `value` into the field's declared type and stores it.
    fn set_field_value(&mut self, index: usize, value: &Value) -> DocResult<()>;

    /// Resets the field to its type's default.
    fn reset_field(&mut self, index: usize) -> DocResult<()>;

    /// A mutable view of the field, when the field holds a nested document.
    fn field_node_mut(&mut self, index: usize) -> DocResult<Option<NodeMut<'_>>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// An object-safe view of a string-keyed map whose values are
/// [Convertible].
pub trait MapNode {
    fn entry_value(&self, key: &str) -> DocResult<Option<Value>>;

    fn set_entry(&mut self, key: &str, value: &Value) -> DocResult<()>;

    /// Returns the nested document stored at `key`. A missing or null entry
    /// is replaced by an empty document when `create` is set.
    fn entry_node_mut(&mut self, key: &str, create: bool) -> DocResult<Option<NodeMut<'_>>>;

    fn entry_keys(&self) -> Vec<String>;
}

/// A mutable handle to a nested document during path traversal.
pub enum NodeMut<'a> {
    Object(&'a mut dyn DocumentObject),
    Map(&'a mut dyn MapNode),
}

fn not_a_document(key: &str) -> DocStoreError {
    log::error!("Value at {} is not a document", key);
    DocStoreError::new(
        &format!("value at {} is not a document", key),
        ErrorKind::InvalidArgument,
    )
}

fn unknown_field(type_name: &str, key: &str) -> DocStoreError {
    log::error!("Type {} has no field {}", type_name, key);
    DocStoreError::new(
        &format!("type {} has no field {}", type_name, key),
        ErrorKind::InvalidArgument,
    )
}

impl<'a> NodeMut<'a> {
    pub(crate) fn get_entry(&self, key: &str, cache: &FieldCache) -> DocResult<Option<Value>> {
        match self {
            NodeMut::Object(object) => {
                let fields = cache.fields_of(&**object);
                match fields.match_name(key) {
                    Some(info) => object.field_value(info.index()).map(Some),
                    None => Ok(None),
                }
            }
            NodeMut::Map(map) => map.entry_value(key),
        }
    }

    pub(crate) fn set_entry(self, key: &str, value: &Value, cache: &FieldCache) -> DocResult<()> {
        match self {
            NodeMut::Object(object) => {
                let fields = cache.fields_of(&*object);
                let info = fields
                    .match_name(key)
                    .ok_or_else(|| unknown_field(fields.type_name(), key))?;
                if value.is_null() {
                    object.reset_field(info.index())
                } else {
                    object.set_field_value(info.index(), value)
                }
            }
            NodeMut::Map(map) => map.set_entry(key, value),
        }
    }

    /// Steps into the nested document at `key`.
    ///
    /// Returns `Ok(None)` when the key is absent and `create` is not set.
    /// Unknown fields of a typed object are always an error.
    pub(crate) fn child(self, key: &str, create: bool, cache: &FieldCache) -> DocResult<Option<NodeMut<'a>>> {
        match self {
            NodeMut::Object(object) => {
                let fields = cache.fields_of(&*object);
                let info = fields
                    .match_name(key)
                    .ok_or_else(|| unknown_field(fields.type_name(), key))?;
                let index = info.index();
                if object.field_value(index)?.is_null() {
                    if !create {
                        return Ok(None);
                    }
                    object.set_field_value(index, &Value::Map(BTreeMap::new()))?;
                }
                match object.field_node_mut(index)? {
                    Some(node) => Ok(Some(node)),
                    None => Err(not_a_document(key)),
                }
            }
            NodeMut::Map(map) => map.entry_node_mut(key, create),
        }
    }

    pub(crate) fn keys(&self, cache: &FieldCache) -> Vec<String> {
        match self {
            NodeMut::Object(object) => cache.fields_of(&**object).names(),
            NodeMut::Map(map) => map.entry_keys(),
        }
    }
}

macro_rules! map_node {
    ($map:ident) => {
        impl<T: Convertible> MapNode for $map<String, T> {
            fn entry_value(&self, key: &str) -> DocResult<Option<Value>> {
                self.get(key).map(|v| v.to_value()).transpose()
            }

            fn set_entry(&mut self, key: &str, value: &Value) -> DocResult<()> {
                let converted = T::from_value(value)?;
                self.insert(key.to_string(), converted);
                Ok(())
            }

            fn entry_node_mut(&mut self, key: &str, create: bool) -> DocResult<Option<NodeMut<'_>>> {
                let vacant = match self.get(key) {
                    None => true,
                    Some(existing) => existing.to_value()?.is_null(),
                };
                if vacant {
                    if !create {
                        return Ok(None);
                    }
                    let fresh = T::from_value(&Value::Map(BTreeMap::new()))?;
                    self.insert(key.to_string(), fresh);
                }

                match self.get_mut(key) {
                    Some(existing) => existing
                        .node_mut()
                        .map(Some)
                        .ok_or_else(|| not_a_document(key)),
                    None => Ok(None),
                }
            }

            fn entry_keys(&self) -> Vec<String> {
                self.keys().cloned().collect()
            }
        }
    };
}

map_node!(BTreeMap);
map_node!(HashMap);
