use crate::codec::{FieldType, FloatWidth, IntWidth};
use crate::common::Value;
use crate::document::{MapNode, NodeMut};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

/// Conversion between a Rust field type and the [Value] tree.
///
/// Implemented for the scalar types, [Bytes], [Value] itself, options,
/// vectors, sets, string-keyed maps and every `#[derive(DocumentObject)]`
/// type. `from_value` narrows with range checks: a value that does not fit
/// the target type is an `InvalidArgument` error, never a silent truncation.
pub trait Convertible: Sized {
    /// The declared shape of this type, used to pick decoder accessors.
    fn field_type() -> FieldType;

    fn to_value(&self) -> DocResult<Value>;

    fn from_value(value: &Value) -> DocResult<Self>;

    /// A mutable view for path traversal, if this value is a nested
    /// document (an object or a string-keyed map).
    fn node_mut(&mut self) -> Option<NodeMut<'_>> {
        None
    }
}

fn mismatch(value: &Value, target: &str) -> DocStoreError {
    log::error!("Cannot convert {} value {} to {}", value.kind_name(), value, target);
    DocStoreError::new(
        &format!("cannot convert {} value to {}", value.kind_name(), target),
        ErrorKind::InvalidArgument,
    )
}

fn overflow(value: &Value, target: &str) -> DocStoreError {
    log::error!("Value {} is out of range for {}", value, target);
    DocStoreError::new(
        &format!("value {} is out of range for {}", value, target),
        ErrorKind::InvalidArgument,
    )
}

/// An integral float is accepted where an integer is declared.
fn integral(value: &Value, target: &str) -> DocResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Ok(*f as i64)
        }
        Value::Float(_) => Err(overflow(value, target)),
        _ => Err(mismatch(value, target)),
    }
}

macro_rules! convertible_int {
    ($($t:ty => $width:ident),* $(,)?) => {
        $(
            impl Convertible for $t {
                fn field_type() -> FieldType {
                    FieldType::Int(IntWidth::$width)
                }

                fn to_value(&self) -> DocResult<Value> {
                    match i64::try_from(*self) {
                        Ok(i) => Ok(Value::Int(i)),
                        Err(_) => {
                            log::error!("Integer {} does not fit a document integer", self);
                            Err(DocStoreError::new(
                                &format!("integer {} does not fit a document integer", self),
                                ErrorKind::InvalidArgument,
                            ))
                        }
                    }
                }

                fn from_value(value: &Value) -> DocResult<Self> {
                    let i = integral(value, stringify!($t))?;
                    <$t>::try_from(i).map_err(|_| overflow(value, stringify!($t)))
                }
            }
        )*
    };
}

convertible_int! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => ISize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => USize,
}

impl Convertible for f64 {
    fn field_type() -> FieldType {
        FieldType::Float(FloatWidth::F64)
    }

    fn to_value(&self) -> DocResult<Value> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        value.as_float().ok_or_else(|| mismatch(value, "f64"))
    }
}

impl Convertible for f32 {
    fn field_type() -> FieldType {
        FieldType::Float(FloatWidth::F32)
    }

    fn to_value(&self) -> DocResult<Value> {
        Ok(Value::Float(*self as f64))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        // IEEE rounding; out-of-range magnitudes become infinities
        value
            .as_float()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch(value, "f32"))
    }
}

impl Convertible for bool {
    fn field_type() -> FieldType {
        FieldType::Bool
    }

    fn to_value(&self) -> DocResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        value.as_bool().ok_or_else(|| mismatch(value, "bool"))
    }
}

impl Convertible for String {
    fn field_type() -> FieldType {
        FieldType::String
    }

    fn to_value(&self) -> DocResult<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(value, "string"))
    }
}

/// A byte-string field. `Vec<u8>` converts as a list of integers; wrap it
/// in `Bytes` to store it as a single binary value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bytes(pub Vec<u8>);

impl Deref for Bytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Bytes {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(value: Vec<u8>) -> Self {
        Bytes(value)
    }
}

impl From<&[u8]> for Bytes {
    fn from(value: &[u8]) -> Self {
        Bytes(value.to_vec())
    }
}

impl Convertible for Bytes {
    fn field_type() -> FieldType {
        FieldType::Bytes
    }

    fn to_value(&self) -> DocResult<Value> {
        Ok(Value::Bytes(self.0.clone()))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        match value {
            Value::Bytes(b) => Ok(Bytes(b.clone())),
            Value::String(s) => Ok(Bytes(s.as_bytes().to_vec())),
            _ => Err(mismatch(value, "bytes")),
        }
    }
}

impl Convertible for Value {
    fn field_type() -> FieldType {
        FieldType::Any
    }

    fn to_value(&self) -> DocResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        Ok(value.clone())
    }

    fn node_mut(&mut self) -> Option<NodeMut<'_>> {
        match self {
            Value::Map(map) => Some(NodeMut::Map(map)),
            _ => None,
        }
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn field_type() -> FieldType {
        FieldType::Optional(Box::new(T::field_type()))
    }

    fn to_value(&self) -> DocResult<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }

    fn node_mut(&mut self) -> Option<NodeMut<'_>> {
        self.as_mut().and_then(|inner| inner.node_mut())
    }
}

fn list_items<'a>(value: &'a Value, target: &str) -> DocResult<&'a Vec<Value>> {
    value.as_list().ok_or_else(|| mismatch(value, target))
}

impl<T: Convertible> Convertible for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }

    fn to_value(&self) -> DocResult<Value> {
        self.iter()
            .map(|item| item.to_value())
            .collect::<DocResult<Vec<Value>>>()
            .map(Value::List)
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        list_items(value, "list")?.iter().map(T::from_value).collect()
    }
}

impl<T: Convertible + Eq + Hash> Convertible for HashSet<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }

    fn to_value(&self) -> DocResult<Value> {
        let mut items = self
            .iter()
            .map(|item| item.to_value())
            .collect::<DocResult<Vec<Value>>>()?;
        // hash order is not stable across runs
        items.sort();
        Ok(Value::List(items))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        list_items(value, "set")?.iter().map(T::from_value).collect()
    }
}

impl<T: Convertible + Ord> Convertible for BTreeSet<T> {
    fn field_type() -> FieldType {
        FieldType::List(Box::new(T::field_type()))
    }

    fn to_value(&self) -> DocResult<Value> {
        self.iter()
            .map(|item| item.to_value())
            .collect::<DocResult<Vec<Value>>>()
            .map(Value::List)
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        list_items(value, "set")?.iter().map(T::from_value).collect()
    }
}

fn map_entries<'a>(value: &'a Value) -> DocResult<&'a BTreeMap<String, Value>> {
    value.as_map().ok_or_else(|| mismatch(value, "map"))
}

impl<T: Convertible + Send> Convertible for BTreeMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn to_value(&self) -> DocResult<Value> {
        let mut map = BTreeMap::new();
        for (key, item) in self {
            map.insert(key.clone(), item.to_value()?);
        }
        Ok(Value::Map(map))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        map_entries(value)?
            .iter()
            .map(|(key, item)| Ok((key.clone(), T::from_value(item)?)))
            .collect()
    }

    fn node_mut(&mut self) -> Option<NodeMut<'_>> {
        Some(NodeMut::Map(self as &mut dyn MapNode))
    }
}

impl<T: Convertible + Send> Convertible for HashMap<String, T> {
    fn field_type() -> FieldType {
        FieldType::Map(Box::new(T::field_type()))
    }

    fn to_value(&self) -> DocResult<Value> {
        let mut map = BTreeMap::new();
        for (key, item) in self {
            map.insert(key.clone(), item.to_value()?);
        }
        Ok(Value::Map(map))
    }

    fn from_value(value: &Value) -> DocResult<Self> {
        map_entries(value)?
            .iter()
            .map(|(key, item)| Ok((key.clone(), T::from_value(item)?)))
            .collect()
    }

    fn node_mut(&mut self) -> Option<NodeMut<'_>> {
        Some(NodeMut::Map(self as &mut dyn MapNode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_map;

    #[test]
    fn test_int_narrowing_is_checked() {
        assert_eq!(i8::from_value(&Value::Int(127)).unwrap(), 127);
        let err = i8::from_value(&Value::Int(128)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        assert!(u32::from_value(&Value::Int(-1)).is_err());
        assert_eq!(u64::from_value(&Value::Int(i64::MAX)).unwrap(), i64::MAX as u64);
    }

    #[test]
    fn test_u64_above_i64_max_fails_to_encode() {
        let err = u64::MAX.to_value().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        assert_eq!(7u64.to_value().unwrap(), Value::Int(7));
    }

    #[test]
    fn test_integral_float_decodes_into_int() {
        assert_eq!(i32::from_value(&Value::Float(42.0)).unwrap(), 42);
        assert!(i32::from_value(&Value::Float(42.5)).is_err());
        assert!(i32::from_value(&Value::String("42".into())).is_err());
    }

    #[test]
    fn test_float_accepts_int() {
        assert_eq!(f64::from_value(&Value::Int(3)).unwrap(), 3.0);
        assert_eq!(f32::from_value(&Value::Float(1.5)).unwrap(), 1.5f32);
        assert!(f32::from_value(&Value::Float(f64::MAX)).unwrap().is_infinite());
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<String>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(&Value::from("x")).unwrap(),
            Some("x".to_string())
        );
        assert_eq!(None::<i32>.to_value().unwrap(), Value::Null);
    }

    #[test]
    fn test_collections() {
        let v = vec![1i32, 2, 3].to_value().unwrap();
        assert_eq!(Vec::<i64>::from_value(&v).unwrap(), vec![1, 2, 3]);

        let set: HashSet<String> = ["b".to_string(), "a".to_string()].into_iter().collect();
        assert_eq!(
            set.to_value().unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );

        let m = value_map! { "x": 1, "y": 2 };
        let decoded = HashMap::<String, u8>::from_value(&m).unwrap();
        assert_eq!(decoded.get("y"), Some(&2));
        assert!(Vec::<i32>::from_value(&m).is_err());
    }

    #[test]
    fn test_bytes_newtype() {
        let b = Bytes(vec![1, 2]);
        assert_eq!(b.to_value().unwrap(), Value::Bytes(vec![1, 2]));
        assert_eq!(Bytes::from_value(&Value::Bytes(vec![9])).unwrap().len(), 1);
        assert_eq!(Bytes::field_type(), FieldType::Bytes);
    }

    #[test]
    fn test_node_mut_only_for_documents() {
        let mut scalar = Value::Int(1);
        assert!(scalar.node_mut().is_none());
        let mut map = value_map! { "a": 1 };
        assert!(matches!(map.node_mut(), Some(NodeMut::Map(_))));
        let mut absent: Option<BTreeMap<String, Value>> = None;
        assert!(absent.node_mut().is_none());
    }
}
