use crate::document::DocumentObject;
use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Width of a declared integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    ISize,
    U8,
    U16,
    U32,
    U64,
    USize,
}

/// Width of a declared float field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

/// The declared type of a field, as far as decoding needs to know it.
///
/// The decoder picks the sub-decoder accessor from this shape; the final
/// narrowing into the Rust type happens in [crate::common::Convertible].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int(IntWidth),
    Float(FloatWidth),
    String,
    Bytes,
    /// Lists, vectors and sets.
    List(Box<FieldType>),
    /// String-keyed maps.
    Map(Box<FieldType>),
    /// A nested [DocumentObject], by type name.
    Object(&'static str),
    Optional(Box<FieldType>),
    /// An untyped [crate::common::Value].
    Any,
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Bool => write!(f, "bool"),
            FieldType::Int(w) => write!(f, "{:?}", w),
            FieldType::Float(w) => write!(f, "{:?}", w),
            FieldType::String => write!(f, "string"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::List(t) => write!(f, "list<{}>", t),
            FieldType::Map(t) => write!(f, "map<string, {}>", t),
            FieldType::Object(name) => write!(f, "{}", name),
            FieldType::Optional(t) => write!(f, "option<{}>", t),
            FieldType::Any => write!(f, "any"),
        }
    }
}

/// Descriptor of one field of a [DocumentObject].
///
/// `index` is the accessor handle: the object's `field_value`/`set_field_value`
/// methods dispatch on it. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    name: &'static str,
    renamed: bool,
    index: usize,
    field_type: FieldType,
}

impl FieldInfo {
    pub fn new(name: &'static str, renamed: bool, index: usize, field_type: FieldType) -> Self {
        FieldInfo {
            name,
            renamed,
            index,
            field_type,
        }
    }

    /// The wire name of the field.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the wire name came from a `rename` annotation.
    pub fn renamed(&self) -> bool {
        self.renamed
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }
}

/// The memoized field list of one type, in declaration order.
#[derive(Debug)]
pub struct FieldList {
    type_name: &'static str,
    fields: Vec<FieldInfo>,
    by_name: HashMap<&'static str, usize>,
    by_folded_name: HashMap<String, usize>,
}

impl FieldList {
    pub(crate) fn new(type_name: &'static str, fields: Vec<FieldInfo>) -> Self {
        let mut by_name = HashMap::with_capacity(fields.len());
        let mut by_folded_name = HashMap::with_capacity(fields.len());
        for (position, info) in fields.iter().enumerate() {
            if by_name.insert(info.name, position).is_some() {
                log::warn!("Type {} declares field name {} more than once", type_name, info.name);
            }
            by_folded_name
                .entry(info.name.to_ascii_lowercase())
                .or_insert(position);
        }

        FieldList {
            type_name,
            fields,
            by_name,
            by_folded_name,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.to_string()).collect()
    }

    /// Finds a field by exact wire name, then by ASCII case-insensitive name.
    pub fn match_name(&self, name: &str) -> Option<&FieldInfo> {
        if let Some(position) = self.by_name.get(name) {
            return self.fields.get(*position);
        }
        self.by_folded_name
            .get(&name.to_ascii_lowercase())
            .and_then(|position| self.fields.get(*position))
    }
}

/// Memoized field descriptors per [DocumentObject] type.
///
/// The cache is a lookup into the descriptor tables that
/// `#[derive(DocumentObject)]` generates; it is populated lazily and never
/// evicted. Concurrent population is safe: when two threads describe the
/// same type at once, the first insert wins and the other result is dropped.
///
/// Clones share the same table. A collection owns one cache; tests can use
/// isolated instances.
#[derive(Clone, Default)]
pub struct FieldCache {
    inner: Arc<DashMap<TypeId, Arc<FieldList>>>,
}

impl FieldCache {
    pub fn new() -> Self {
        FieldCache {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Returns the field list of the concrete type behind `object`.
    pub fn fields_of(&self, object: &dyn DocumentObject) -> Arc<FieldList> {
        let type_id = object.as_any().type_id();
        if let Some(list) = self.inner.get(&type_id) {
            return list.clone();
        }

        let list = Arc::new(FieldList::new(object.type_name(), object.describe()));
        log::trace!("Caching {} field(s) of {}", list.len(), list.type_name());
        self.inner.entry(type_id).or_insert(list).clone()
    }

    /// Number of types described so far.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Builds a field list without memoizing it, for conversions that run
/// outside any collection (nested values inside lists and maps).
pub(crate) fn describe_uncached(object: &dyn DocumentObject) -> Arc<FieldList> {
    Arc::new(FieldList::new(object.type_name(), object.describe()))
}
