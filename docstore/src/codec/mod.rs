//! Conversion between documents and the encoder/decoder event protocol.
//!
//! Objects are walked through their cached field lists in declaration order,
//! maps and lists element by element. Decoding into a typed object is
//! strict: every incoming key must match a field, first by exact name and
//! then case-insensitively.

mod decoder;
mod encoder;
mod field_cache;

pub use decoder::*;
pub use encoder::*;
pub use field_cache::*;

use crate::common::Value;
use crate::document::{DocumentObject, NodeMut};
use crate::errors::{DocResult, DocStoreError, ErrorKind};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Emits `value` into `encoder`.
pub fn encode_value(value: &Value, encoder: &mut dyn Encoder) -> DocResult<()> {
    match value {
        Value::Null => encoder.encode_null(),
        Value::Bool(b) => encoder.encode_bool(*b),
        Value::Int(i) => encoder.encode_int(*i),
        Value::Float(f) => encoder.encode_float(*f),
        Value::String(s) => encoder.encode_string(s),
        Value::Bytes(b) => encoder.encode_bytes(b),
        Value::List(items) => {
            encoder.begin_list(items.len())?;
            for (index, item) in items.iter().enumerate() {
                encode_value(item, encoder)?;
                encoder.list_index(index)?;
            }
            encoder.end_list()
        }
        Value::Map(map) => {
            encoder.begin_map(map.len())?;
            for (key, item) in map {
                encode_value(item, encoder)?;
                encoder.map_key(key)?;
            }
            encoder.end_map()
        }
    }
}

/// Emits every field of `object`, in declaration order, as a map.
pub fn encode_object(object: &dyn DocumentObject, cache: &FieldCache, encoder: &mut dyn Encoder) -> DocResult<()> {
    let fields = cache.fields_of(object);
    encode_fields(object, &fields, encoder)
}

fn encode_fields(object: &dyn DocumentObject, fields: &FieldList, encoder: &mut dyn Encoder) -> DocResult<()> {
    encoder.begin_map(fields.len())?;
    for info in fields.fields() {
        let value = object.field_value(info.index())?;
        encode_value(&value, encoder)?;
        encoder.map_key(info.name())?;
    }
    encoder.end_map()
}

/// Reads an untyped value, whatever its kind.
pub fn decode_value(decoder: &dyn Decoder) -> DocResult<Value> {
    if decoder.is_null() {
        return Ok(Value::Null);
    }
    if let Some(b) = decoder.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(i) = decoder.as_int() {
        return Ok(Value::Int(i));
    }
    if let Some(f) = decoder.as_float() {
        return Ok(Value::Float(f));
    }
    if let Some(s) = decoder.as_string() {
        return Ok(Value::String(s));
    }
    if let Some(b) = decoder.as_bytes() {
        return Ok(Value::Bytes(b));
    }
    if let Some(len) = decoder.list_len() {
        let mut items = Vec::with_capacity(len);
        decoder.decode_list(&mut |_, sub| {
            items.push(decode_value(sub)?);
            Ok(())
        })?;
        return Ok(Value::List(items));
    }
    if decoder.map_len().is_some() {
        let mut map = BTreeMap::new();
        decoder.decode_map(&mut |key, sub| {
            map.insert(key.to_string(), decode_value(sub)?);
            Ok(())
        })?;
        return Ok(Value::Map(map));
    }

    log::error!("Decoder reported a value of no known kind");
    Err(DocStoreError::new(
        "value of no known kind",
        ErrorKind::InvalidArgument,
    ))
}

fn type_mismatch(field_type: &FieldType) -> DocStoreError {
    log::error!("Encoded value does not match declared type {}", field_type);
    DocStoreError::new(
        &format!("encoded value does not match declared type {}", field_type),
        ErrorKind::InvalidArgument,
    )
}

/// Reads a value using the accessor that `field_type` calls for.
pub(crate) fn decode_typed(field_type: &FieldType, decoder: &dyn Decoder) -> DocResult<Value> {
    if decoder.is_null() {
        return Ok(Value::Null);
    }
    match field_type {
        FieldType::Bool => decoder
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| type_mismatch(field_type)),
        FieldType::Int(_) => match decoder.as_int() {
            Some(i) => Ok(Value::Int(i)),
            // range checks happen when the value is narrowed into the field
            None => decoder
                .as_float()
                .filter(|f| f.fract() == 0.0)
                .map(Value::Float)
                .ok_or_else(|| type_mismatch(field_type)),
        },
        FieldType::Float(_) => decoder
            .as_float()
            .map(Value::Float)
            .ok_or_else(|| type_mismatch(field_type)),
        FieldType::String => decoder
            .as_string()
            .map(Value::String)
            .ok_or_else(|| type_mismatch(field_type)),
        FieldType::Bytes => match decoder.as_bytes() {
            Some(b) => Ok(Value::Bytes(b)),
            None => decoder
                .as_string()
                .map(|s| Value::Bytes(s.into_bytes()))
                .ok_or_else(|| type_mismatch(field_type)),
        },
        FieldType::List(element) => {
            let mut items = Vec::with_capacity(decoder.list_len().unwrap_or_default());
            decoder.decode_list(&mut |_, sub| {
                items.push(decode_typed(element, sub)?);
                Ok(())
            })?;
            Ok(Value::List(items))
        }
        FieldType::Map(element) => {
            let mut map = BTreeMap::new();
            decoder.decode_map(&mut |key, sub| {
                map.insert(key.to_string(), decode_typed(element, sub)?);
                Ok(())
            })?;
            Ok(Value::Map(map))
        }
        FieldType::Optional(inner) => decode_typed(inner, decoder),
        FieldType::Object(_) | FieldType::Any => decode_value(decoder),
    }
}

/// Decodes a map into the fields of `object`.
///
/// An incoming key that matches no field fails with `InvalidArgument`.
/// A null value resets the field to its default.
pub fn decode_object(object: &mut dyn DocumentObject, cache: &FieldCache, decoder: &dyn Decoder) -> DocResult<()> {
    decode_with(object, &|o| cache.fields_of(o), decoder)
}

fn decode_with(
    object: &mut dyn DocumentObject,
    lookup: &dyn Fn(&dyn DocumentObject) -> Arc<FieldList>,
    decoder: &dyn Decoder,
) -> DocResult<()> {
    let fields = lookup(&*object);
    decoder.decode_map(&mut |key, sub| {
        let info = match fields.match_name(key) {
            Some(info) => info,
            None => {
                log::error!("No field of {} matches key {}", fields.type_name(), key);
                return Err(DocStoreError::new(
                    &format!("no field of {} matches key {}", fields.type_name(), key),
                    ErrorKind::InvalidArgument,
                ));
            }
        };

        let index = info.index();
        if sub.is_null() {
            return object.reset_field(index);
        }

        if let FieldType::Object(_) = info.field_type() {
            if let Some(NodeMut::Object(nested)) = object.field_node_mut(index)? {
                return decode_with(nested, lookup, sub);
            }
        }

        let value = decode_typed(info.field_type(), sub)?;
        object.set_field_value(index, &value)
    })
}

/// Converts an object to a [Value::Map] without a collection's cache.
///
/// Used by derived `Convertible` impls for objects nested in lists and maps.
#[doc(hidden)]
pub fn object_to_value(object: &dyn DocumentObject) -> DocResult<Value> {
    let fields = describe_uncached(object);
    let mut encoder = ValueEncoder::new();
    encode_fields(object, &fields, &mut encoder)?;
    encoder.finish()
}

/// Strictly decodes a [Value::Map] into `object` without a collection's cache.
#[doc(hidden)]
pub fn object_from_value(object: &mut dyn DocumentObject, value: &Value) -> DocResult<()> {
    decode_with(object, &describe_uncached, &ValueDecoder::new(value))
}
