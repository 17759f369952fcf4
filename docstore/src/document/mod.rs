//! The document abstraction: a string-keyed map or a typed object.

mod object;

pub use object::*;

use crate::codec::{
    decode_object, decode_value, encode_object, encode_value, Decoder, Encoder, FieldCache, ValueDecoder,
    ValueEncoder,
};
use crate::common::{validate_path, Value};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

enum DocumentBacking {
    Map(BTreeMap<String, Value>),
    Object(Box<dyn DocumentObject>),
}

/// A document as seen by the driver core.
///
/// # Purpose
/// Gives actions and queries one uniform view over two representations:
/// an untyped map of [Value]s, and a typed record implementing
/// [DocumentObject]. Field access and encoding behave the same for both,
/// except that a typed document has a fixed set of fields: setting an
/// unknown field fails, while reading one yields `None`.
///
/// # Field lookup
/// Top-level and nested field names of typed documents match exactly
/// first, then ASCII case-insensitively.
///
/// # Usage
/// ```rust
/// use docstore::document::Document;
///
/// let mut doc = Document::new();
/// doc.set(&["author", "name"], "Frank").unwrap();
/// assert_eq!(doc.get(&["author", "name"]).unwrap().unwrap().as_str(), Some("Frank"));
/// assert!(doc.get(&["publisher"]).unwrap().is_none());
/// ```
pub struct Document {
    backing: DocumentBacking,
    cache: FieldCache,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    /// An empty map-backed document.
    pub fn new() -> Self {
        Document::from_map(BTreeMap::new())
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Document {
            backing: DocumentBacking::Map(map),
            cache: FieldCache::new(),
        }
    }

    /// Wraps a [Value::Map]; any other kind of value is rejected.
    pub fn from_value(value: Value) -> DocResult<Self> {
        match value {
            Value::Map(map) => Ok(Document::from_map(map)),
            other => {
                log::error!("Cannot build a document from a {} value", other.kind_name());
                Err(DocStoreError::new(
                    &format!("cannot build a document from a {} value", other.kind_name()),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }

    pub fn from_object<T: DocumentObject>(object: T) -> Self {
        Document::from_object_with_cache(object, &FieldCache::new())
    }

    pub fn from_object_with_cache<T: DocumentObject>(object: T, cache: &FieldCache) -> Self {
        Document {
            backing: DocumentBacking::Object(Box::new(object)),
            cache: cache.clone(),
        }
    }

    /// Switches field lookups over to a collection's shared cache.
    pub(crate) fn attach_cache(&mut self, cache: &FieldCache) {
        self.cache = cache.clone();
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.cache
    }

    pub fn is_typed(&self) -> bool {
        matches!(self.backing, DocumentBacking::Object(_))
    }

    /// The Rust type name of a typed document.
    pub fn type_name(&self) -> Option<&'static str> {
        match &self.backing {
            DocumentBacking::Object(object) => Some(object.type_name()),
            DocumentBacking::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match &self.backing {
            DocumentBacking::Map(map) => Some(map),
            DocumentBacking::Object(_) => None,
        }
    }

    pub fn as_object<T: DocumentObject>(&self) -> Option<&T> {
        match &self.backing {
            DocumentBacking::Object(object) => object.as_any().downcast_ref::<T>(),
            DocumentBacking::Map(_) => None,
        }
    }

    pub fn as_object_mut<T: DocumentObject>(&mut self) -> Option<&mut T> {
        match &mut self.backing {
            DocumentBacking::Object(object) => object.as_any_mut().downcast_mut::<T>(),
            DocumentBacking::Map(_) => None,
        }
    }

    pub fn into_object<T: DocumentObject>(self) -> DocResult<T> {
        let type_name = self.type_name().unwrap_or("map");
        match self.backing {
            DocumentBacking::Object(object) => match object.into_any().downcast::<T>() {
                Ok(typed) => Ok(*typed),
                Err(_) => Err(wrong_type(type_name)),
            },
            DocumentBacking::Map(_) => Err(wrong_type(type_name)),
        }
    }

    /// Consumes the document into its map form, encoding typed documents.
    pub fn into_map(self) -> DocResult<BTreeMap<String, Value>> {
        if self.is_typed() {
            return match self.to_value()? {
                Value::Map(map) => Ok(map),
                _ => Ok(BTreeMap::new()),
            };
        }
        match self.backing {
            DocumentBacking::Map(map) => Ok(map),
            DocumentBacking::Object(_) => Ok(BTreeMap::new()),
        }
    }

    /// Reads a top-level field. Unknown fields read as `None`.
    pub fn get_field(&self, name: &str) -> DocResult<Option<Value>> {
        match &self.backing {
            DocumentBacking::Map(map) => Ok(map.get(name).cloned()),
            DocumentBacking::Object(object) => {
                let fields = self.cache.fields_of(object.as_ref());
                match fields.match_name(name) {
                    Some(info) => object.field_value(info.index()).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    /// Whether a top-level field `name` can be set: any name for a map,
    /// only declared fields for a typed document.
    pub fn accepts_field(&self, name: &str) -> bool {
        match &self.backing {
            DocumentBacking::Map(_) => true,
            DocumentBacking::Object(object) => self.cache.fields_of(object.as_ref()).match_name(name).is_some(),
        }
    }

    /// Writes a top-level field. Typed documents reject unknown names.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> DocResult<()> {
        let value = value.into();
        let Document { backing, cache } = self;
        root_node(backing).set_entry(name, &value, cache)
    }

    /// Reads the value at a field path.
    ///
    /// A missing key anywhere along the path yields `None`; stepping into a
    /// value that is not a document is an error.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> DocResult<Option<Value>> {
        validate_path(path)?;
        let mut current = match self.get_field(path[0].as_ref())? {
            Some(value) => value,
            None => return Ok(None),
        };

        for segment in &path[1..] {
            let segment = segment.as_ref();
            current = match current {
                Value::Map(mut map) => match map.remove(segment) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                Value::Null => return Ok(None),
                other => {
                    log::error!("Cannot read {} inside a {} value", segment, other.kind_name());
                    return Err(DocStoreError::new(
                        &format!("cannot read {} inside a {} value", segment, other.kind_name()),
                        ErrorKind::InvalidArgument,
                    ));
                }
            };
        }
        Ok(Some(current))
    }

    /// Writes the value at a field path, creating intermediate maps.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: impl Into<Value>) -> DocResult<()> {
        validate_path(path)?;
        let value = value.into();
        let (last, parents) = match path.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };

        let Document { backing, cache } = self;
        let mut node = root_node(backing);
        for segment in parents {
            node = match node.child(segment.as_ref(), true, cache)? {
                Some(child) => child,
                None => return Err(not_found(segment.as_ref())),
            };
        }
        node.set_entry(last.as_ref(), &value, cache)
    }

    /// Returns the nested document at `path` for mutation.
    ///
    /// With `create` set, only the last segment may be created, and only in
    /// a map. Any other missing segment is a `NotFound` error. Use
    /// [Document::set] to build intermediate levels.
    pub fn document_at<S: AsRef<str>>(&mut self, path: &[S], create: bool) -> DocResult<NodeMut<'_>> {
        let Document { backing, cache } = self;
        let mut node = root_node(backing);
        let last = path.len().saturating_sub(1);
        for (position, segment) in path.iter().enumerate() {
            if segment.as_ref().is_empty() {
                return Err(DocStoreError::new("empty path segment", ErrorKind::InvalidArgument));
            }
            node = match node.child(segment.as_ref(), create && position == last, cache)? {
                Some(child) => child,
                None => return Err(not_found(segment.as_ref())),
            };
        }
        Ok(node)
    }

    /// Top-level field names; declared fields for typed documents.
    pub fn field_names(&self) -> Vec<String> {
        match &self.backing {
            DocumentBacking::Map(map) => map.keys().cloned().collect(),
            DocumentBacking::Object(object) => self.cache.fields_of(object.as_ref()).names(),
        }
    }

    pub fn encode(&self, encoder: &mut dyn Encoder) -> DocResult<()> {
        match &self.backing {
            DocumentBacking::Map(map) => {
                encoder.begin_map(map.len())?;
                for (key, value) in map {
                    encode_value(value, encoder)?;
                    encoder.map_key(key)?;
                }
                encoder.end_map()
            }
            DocumentBacking::Object(object) => encode_object(object.as_ref(), &self.cache, encoder),
        }
    }

    /// Decodes a map into this document.
    ///
    /// Map-backed documents merge the incoming keys; typed documents decode
    /// strictly into their declared fields.
    pub fn decode(&mut self, decoder: &dyn Decoder) -> DocResult<()> {
        match &mut self.backing {
            DocumentBacking::Map(map) => decoder.decode_map(&mut |key, sub| {
                map.insert(key.to_string(), decode_value(sub)?);
                Ok(())
            }),
            DocumentBacking::Object(object) => decode_object(object.as_mut(), &self.cache, decoder),
        }
    }

    /// Encodes the document into a [Value::Map].
    pub fn to_value(&self) -> DocResult<Value> {
        let mut encoder = ValueEncoder::new();
        self.encode(&mut encoder)?;
        encoder.finish()
    }

    /// Decodes a [Value::Map] into this document.
    pub fn decode_value(&mut self, value: &Value) -> DocResult<()> {
        self.decode(&ValueDecoder::new(value))
    }

    /// Decodes a stored row. A revision the document has no field for is
    /// dropped instead of failing the decode.
    pub(crate) fn decode_stored(&mut self, row: &Value, revision_field: Option<&str>) -> DocResult<()> {
        match revision_field {
            Some(field) if !self.accepts_field(field) => {
                let mut row = row.clone();
                if let Some(map) = row.as_map_mut() {
                    map.remove(field);
                }
                self.decode_value(&row)
            }
            _ => self.decode_value(row),
        }
    }

    /// Empties a map document, or resets every field of a typed one to its
    /// default.
    pub fn clear(&mut self) -> DocResult<()> {
        match &mut self.backing {
            DocumentBacking::Map(map) => {
                map.clear();
                Ok(())
            }
            DocumentBacking::Object(object) => {
                let fields = self.cache.fields_of(object.as_ref());
                for field in fields.fields() {
                    object.reset_field(field.index())?;
                }
                Ok(())
            }
        }
    }
}

fn root_node(backing: &mut DocumentBacking) -> NodeMut<'_> {
    match backing {
        DocumentBacking::Map(map) => NodeMut::Map(map),
        DocumentBacking::Object(object) => NodeMut::Object(object.as_mut()),
    }
}

fn wrong_type(actual: &str) -> DocStoreError {
    log::error!("Document holds a {} and cannot be taken as the requested type", actual);
    DocStoreError::new(
        &format!("document holds a {}", actual),
        ErrorKind::InvalidArgument,
    )
}

fn not_found(segment: &str) -> DocStoreError {
    log::error!("No document at path segment {}", segment);
    DocStoreError::new(
        &format!("no document at path segment {}", segment),
        ErrorKind::NotFound,
    )
}

/// Error for an out-of-range field index in generated accessors.
#[doc(hidden)]
pub fn field_index_error(type_name: &str, index: usize) -> DocStoreError {
    log::error!("Type {} has no field at index {}", type_name, index);
    DocStoreError::new(
        &format!("type {} has no field at index {}", type_name, index),
        ErrorKind::Internal,
    )
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .to_value()
            .map(|v| v.to_json())
            .unwrap_or_else(|e| format!("<{}>", e));
        match self.type_name() {
            Some(name) => write!(f, "{} {}", name, rendered),
            None => write!(f, "{}", rendered),
        }
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Document::from_map(map)
    }
}
