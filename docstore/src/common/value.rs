use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Compare two floats with a total order; NaN sorts after every number.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// The wire-neutral value tree every document is encoded into.
///
/// # Purpose
/// Provides one closed representation for everything a backing store can
/// hold. Integers are always widened to 64 bits and floats to `f64` at this
/// boundary; narrowing back happens on typed decode using the declared type
/// of the target field.
///
/// # Variants
/// - Null: absence of a value
/// - Bool(bool)
/// - Int(i64): every fixed-width integer
/// - Float(f64): `f32` and `f64`
/// - String(String)
/// - Bytes(Vec<u8>): opaque binary data, compared byte-for-byte
/// - List(Vec<Value>): arrays, vectors and sets
/// - Map(BTreeMap<String, Value>): string-keyed maps and encoded objects
///
/// # Characteristics
/// - **Comparable**: `Int` and `Float` compare numerically with each other,
///   other variants compare within their kind and then by kind rank
/// - **Hashable**: usable as a key in hash maps (floats hash by bit pattern,
///   integral floats hash like the equal integer)
/// - **Default**: `Null`
///
/// # Usage
/// ```rust
/// use docstore::common::Value;
///
/// let v: Value = 42.into();
/// assert_eq!(v.as_int(), Some(42));
/// assert_eq!(Value::from("hello").as_str(), Some("hello"));
/// ```
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents any integer, widened to 64 bits.
    Int(i64),
    /// Represents any float, widened to 64 bits.
    Float(f64),
    /// Represents a string value.
    String(String),
    /// Represents a byte sequence.
    Bytes(Vec<u8>),
    /// Represents a homogeneous container.
    List(Vec<Value>),
    /// Represents a string-keyed map or an encoded object.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns a short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::List(_) => 5,
            Value::Map(_) => 6,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Returns `true` for values that can appear in a filter comparison
    /// (everything except null, lists and maps).
    pub fn is_comparable_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) | Value::Bytes(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as `f64`, accepting integers as well.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns `true` for the values a revision field treats as "unset":
    /// null, the empty string and empty bytes.
    pub fn is_empty_token(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            _ => false,
        }
    }

    /// Renders the value as a single-quoted statement literal.
    ///
    /// Strings have embedded quotes doubled; numbers and booleans are quoted
    /// too; lists render as a parenthesized literal list.
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => format!("'{}'", b),
            Value::Int(i) => format!("'{}'", i),
            Value::Float(f) => format!("'{}'", f),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => format!("'{}'", hex(b)),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_literal()).collect();
                format!("({})", rendered.join(", "))
            }
            Value::Map(_) => format!("'{}'", self.to_json().replace('\'', "''")),
        }
    }

    /// Renders the value as compact JSON-like text.
    pub fn to_json(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Bytes(b) => format!("\"0x{}\"", hex(b)),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_json()).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Map(map) => {
                let rendered: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("\"{}\": {}", k, v.to_json()))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({:?})", x),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Bytes(b) => write!(f, "Bytes(0x{})", hex(b)),
            Value::List(l) => f.debug_list().entries(l.iter()).finish(),
            Value::Map(m) => f.debug_map().entries(m.iter()).finish(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => num_cmp_float(*a, *b),
            (Value::Int(a), Value::Float(b)) => num_cmp_float(*a as f64, *b),
            (Value::Float(a), Value::Int(b)) => num_cmp_float(*a, *b as f64),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => {
                // integral floats must hash like the equal Int
                if v.fract() == 0.0 && v.is_finite() && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 {
                    (*v as i64).hash(state)
                } else {
                    v.to_bits().hash(state)
                }
            }
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::List(v) => v.hash(state),
            Value::Map(v) => v.hash(state),
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Builds a [Value::List] from anything convertible into values.
pub fn list_of<T: Into<Value>, I: IntoIterator<Item = T>>(items: I) -> Value {
    Value::List(items.into_iter().map(Into::into).collect())
}

/// Creates a [Value::Map] with JSON-like syntax.
///
/// ```rust
/// use docstore::value_map;
///
/// let v = value_map! { "title": "Dune", "pages": 412 };
/// assert_eq!(v.as_map().unwrap().len(), 2);
/// ```
#[macro_export]
macro_rules! value_map {
    () => {
        $crate::common::Value::Map(::std::collections::BTreeMap::new())
    };
    ($($key:literal : $value:expr),+ $(,)?) => {{
        let mut map = ::std::collections::BTreeMap::new();
        $(map.insert($key.to_string(), $crate::common::Value::from($value));)+
        $crate::common::Value::Map(map)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_from_widens_integers_and_floats() {
        assert_eq!(Value::from(7u8), Value::Int(7));
        assert_eq!(Value::from(-7i16), Value::Int(-7));
        assert_eq!(Value::from(1.5f32), Value::Float(1.5));
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn test_numeric_equality_across_variants() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Float(3.5));
        assert_eq!(hash_of(&Value::Int(3)), hash_of(&Value::Float(3.0)));
        assert!(Value::Int(2) < Value::Float(2.5));
    }

    #[test]
    fn test_nan_sorts_last() {
        assert!(Value::Float(f64::NAN) > Value::Float(1e300));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn test_cross_kind_ordering_uses_rank() {
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Bool(true) < Value::Int(0));
        assert!(Value::Int(100) < Value::String("a".into()));
        assert!(Value::String("z".into()) < Value::Bytes(vec![0]));
    }

    #[test]
    fn test_accessors() {
        let v = value_map! { "a": 1, "b": "two" };
        let map = v.as_map().unwrap();
        assert_eq!(map["a"].as_int(), Some(1));
        assert_eq!(map["b"].as_str(), Some("two"));
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert!(Value::Bool(true).as_int().is_none());
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
    }

    #[test]
    fn test_to_literal_quotes_everything() {
        assert_eq!(Value::from("X").to_literal(), "'X'");
        assert_eq!(Value::from("O'Brien").to_literal(), "'O''Brien'");
        assert_eq!(Value::Int(3).to_literal(), "'3'");
        assert_eq!(Value::Float(3.99).to_literal(), "'3.99'");
        assert_eq!(Value::Bool(true).to_literal(), "'true'");
        assert_eq!(list_of(["a", "b"]).to_literal(), "('a', 'b')");
    }

    #[test]
    fn test_display_is_json_like() {
        let v = value_map! { "name": "Ann", "tags": list_of([1, 2]) };
        assert_eq!(v.to_string(), "{\"name\": \"Ann\", \"tags\": [1, 2]}");
    }

    #[test]
    fn test_empty_token() {
        assert!(Value::Null.is_empty_token());
        assert!(Value::from("").is_empty_token());
        assert!(!Value::from("rev-1").is_empty_token());
        assert!(!Value::Int(0).is_empty_token());
    }
}
