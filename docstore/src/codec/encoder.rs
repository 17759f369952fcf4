use crate::common::Value;
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::collections::BTreeMap;

/// A sink for a stream of encoding events.
///
/// Containers are framed by `begin_*`/`end_*`. After each child value has
/// been emitted, the walker calls `list_index(i)` or `map_key(k)` so the
/// encoder can attach the just-produced value to its parent.
pub trait Encoder {
    fn encode_null(&mut self) -> DocResult<()>;
    fn encode_bool(&mut self, value: bool) -> DocResult<()>;
    fn encode_int(&mut self, value: i64) -> DocResult<()>;
    fn encode_float(&mut self, value: f64) -> DocResult<()>;
    fn encode_string(&mut self, value: &str) -> DocResult<()>;
    fn encode_bytes(&mut self, value: &[u8]) -> DocResult<()>;

    fn begin_list(&mut self, len: usize) -> DocResult<()>;
    fn list_index(&mut self, index: usize) -> DocResult<()>;
    fn end_list(&mut self) -> DocResult<()>;

    fn begin_map(&mut self, len: usize) -> DocResult<()>;
    fn map_key(&mut self, key: &str) -> DocResult<()>;
    fn end_map(&mut self) -> DocResult<()>;
}

enum Frame {
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// An [Encoder] that builds a [Value] tree.
#[derive(Default)]
pub struct ValueEncoder {
    stack: Vec<Frame>,
    current: Option<Value>,
}

fn protocol_error(message: &str) -> DocStoreError {
    log::error!("Encoder protocol violation: {}", message);
    DocStoreError::new(message, ErrorKind::Internal)
}

impl ValueEncoder {
    pub fn new() -> Self {
        ValueEncoder::default()
    }

    fn put(&mut self, value: Value) -> DocResult<()> {
        if self.current.is_some() {
            return Err(protocol_error("value emitted before the previous one was attached"));
        }
        self.current = Some(value);
        Ok(())
    }

    fn take_current(&mut self) -> DocResult<Value> {
        self.current
            .take()
            .ok_or_else(|| protocol_error("no value to attach"))
    }

    /// Returns the finished value. An encoder that saw no event yields `Null`.
    pub fn finish(mut self) -> DocResult<Value> {
        if !self.stack.is_empty() {
            return Err(protocol_error("unterminated container"));
        }
        Ok(self.current.take().unwrap_or(Value::Null))
    }
}

impl Encoder for ValueEncoder {
    fn encode_null(&mut self) -> DocResult<()> {
        self.put(Value::Null)
    }

    fn encode_bool(&mut self, value: bool) -> DocResult<()> {
        self.put(Value::Bool(value))
    }

    fn encode_int(&mut self, value: i64) -> DocResult<()> {
        self.put(Value::Int(value))
    }

    fn encode_float(&mut self, value: f64) -> DocResult<()> {
        self.put(Value::Float(value))
    }

    fn encode_string(&mut self, value: &str) -> DocResult<()> {
        self.put(Value::String(value.to_string()))
    }

    fn encode_bytes(&mut self, value: &[u8]) -> DocResult<()> {
        self.put(Value::Bytes(value.to_vec()))
    }

    fn begin_list(&mut self, len: usize) -> DocResult<()> {
        self.stack.push(Frame::List(Vec::with_capacity(len)));
        Ok(())
    }

    fn list_index(&mut self, index: usize) -> DocResult<()> {
        let value = self.take_current()?;
        match self.stack.last_mut() {
            Some(Frame::List(items)) => {
                if index < items.len() {
                    items[index] = value;
                } else {
                    items.resize(index, Value::Null);
                    items.push(value);
                }
                Ok(())
            }
            _ => Err(protocol_error("list index outside of a list")),
        }
    }

    fn end_list(&mut self) -> DocResult<()> {
        match self.stack.pop() {
            Some(Frame::List(items)) => self.put(Value::List(items)),
            _ => Err(protocol_error("end of list outside of a list")),
        }
    }

    fn begin_map(&mut self, _len: usize) -> DocResult<()> {
        self.stack.push(Frame::Map(BTreeMap::new()));
        Ok(())
    }

    fn map_key(&mut self, key: &str) -> DocResult<()> {
        let value = self.take_current()?;
        match self.stack.last_mut() {
            Some(Frame::Map(map)) => {
                map.insert(key.to_string(), value);
                Ok(())
            }
            _ => Err(protocol_error("map key outside of a map")),
        }
    }

    fn end_map(&mut self) -> DocResult<()> {
        match self.stack.pop() {
            Some(Frame::Map(map)) => self.put(Value::Map(map)),
            _ => Err(protocol_error("end of map outside of a map")),
        }
    }
}
