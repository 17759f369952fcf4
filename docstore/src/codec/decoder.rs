use crate::common::Value;
use crate::errors::{DocResult, DocStoreError, ErrorKind};

/// A read-only view over one encoded value.
///
/// The scalar accessors return `None` when the value is of another kind.
/// Containers are visited through callbacks that receive a sub-decoder for
/// each element; a callback error stops the walk and is returned.
pub trait Decoder {
    fn is_null(&self) -> bool;
    fn as_bool(&self) -> Option<bool>;
    /// Integers only; floats are not reported here.
    fn as_int(&self) -> Option<i64>;
    /// Floats, and integers widened to `f64`.
    fn as_float(&self) -> Option<f64>;
    fn as_string(&self) -> Option<String>;
    fn as_bytes(&self) -> Option<Vec<u8>>;
    fn list_len(&self) -> Option<usize>;
    fn map_len(&self) -> Option<usize>;

    fn decode_list(&self, visit: &mut dyn FnMut(usize, &dyn Decoder) -> DocResult<()>) -> DocResult<()>;

    fn decode_map(&self, visit: &mut dyn FnMut(&str, &dyn Decoder) -> DocResult<()>) -> DocResult<()>;
}

/// A [Decoder] over a borrowed [Value].
pub struct ValueDecoder<'a> {
    value: &'a Value,
}

impl<'a> ValueDecoder<'a> {
    pub fn new(value: &'a Value) -> Self {
        ValueDecoder { value }
    }
}

fn not_a(value: &Value, expected: &str) -> DocStoreError {
    log::error!("Expected a {} but found {}", expected, value.kind_name());
    DocStoreError::new(
        &format!("expected a {} but found {}", expected, value.kind_name()),
        ErrorKind::InvalidArgument,
    )
}

impl Decoder for ValueDecoder<'_> {
    fn is_null(&self) -> bool {
        self.value.is_null()
    }

    fn as_bool(&self) -> Option<bool> {
        self.value.as_bool()
    }

    fn as_int(&self) -> Option<i64> {
        match self.value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        self.value.as_float()
    }

    fn as_string(&self) -> Option<String> {
        self.value.as_str().map(str::to_string)
    }

    fn as_bytes(&self) -> Option<Vec<u8>> {
        self.value.as_bytes().map(<[u8]>::to_vec)
    }

    fn list_len(&self) -> Option<usize> {
        self.value.as_list().map(Vec::len)
    }

    fn map_len(&self) -> Option<usize> {
        self.value.as_map().map(|m| m.len())
    }

    fn decode_list(&self, visit: &mut dyn FnMut(usize, &dyn Decoder) -> DocResult<()>) -> DocResult<()> {
        let items = self.value.as_list().ok_or_else(|| not_a(self.value, "list"))?;
        for (index, item) in items.iter().enumerate() {
            visit(index, &ValueDecoder::new(item))?;
        }
        Ok(())
    }

    fn decode_map(&self, visit: &mut dyn FnMut(&str, &dyn Decoder) -> DocResult<()>) -> DocResult<()> {
        let map = self.value.as_map().ok_or_else(|| not_a(self.value, "map"))?;
        for (key, item) in map {
            visit(key, &ValueDecoder::new(item))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_map;

    #[test]
    fn test_scalar_accessors() {
        let v = Value::Int(3);
        let d = ValueDecoder::new(&v);
        assert_eq!(d.as_int(), Some(3));
        assert_eq!(d.as_float(), Some(3.0));
        assert!(d.as_string().is_none());

        let f = Value::Float(2.5);
        assert!(ValueDecoder::new(&f).as_int().is_none());
    }

    #[test]
    fn test_decode_map_visits_every_key() {
        let v = value_map! { "a": 1, "b": 2 };
        let mut seen = Vec::new();
        ValueDecoder::new(&v)
            .decode_map(&mut |key, sub| {
                seen.push((key.to_string(), sub.as_int().unwrap()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_callback_error_stops_walk() {
        let v = Value::List(vec![Value::Int(1), Value::Int(2)]);
        let mut visits = 0;
        let result = ValueDecoder::new(&v).decode_list(&mut |_, _| {
            visits += 1;
            Err(DocStoreError::new("stop", ErrorKind::InvalidArgument))
        });
        assert!(result.is_err());
        assert_eq!(visits, 1);
    }

    #[test]
    fn test_decode_map_on_scalar_fails() {
        let v = Value::Bool(true);
        let err = ValueDecoder::new(&v).decode_map(&mut |_, _| Ok(())).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }
}
