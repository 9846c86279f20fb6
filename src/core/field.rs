//! Typed key/value log fields

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::encoder::Encoder;

/// The conventional key carrying the human-readable message.
pub const MSG_KEY: &str = "msg";

/// Values that encode themselves as the elements of an array field.
pub trait ArrayValue: Send + Sync {
    fn encode_array(&self, enc: &mut dyn Encoder);
}

/// The typed payload of a [`Field`].
pub enum FieldValue {
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Str(Cow<'static, str>),
    /// String payload that may not be valid UTF-8.
    StrBytes(Vec<u8>),
    /// Arbitrary value captured as JSON at construction time.
    Reflect(JsonValue),
    Array(Box<dyn ArrayValue>),
    Object(Vec<Field>),
    /// Expands into individual fields, walking keys in sorted order.
    FromMap(HashMap<String, JsonValue>),
}

/// A structured log field with a key and a typed value.
pub struct Field {
    pub key: Cow<'static, str>,
    pub value: FieldValue,
}

impl Field {
    fn new(key: impl Into<Cow<'static, str>>, value: FieldValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// A field whose value is null.
    pub fn nil(key: impl Into<Cow<'static, str>>) -> Self {
        Self::new(key, FieldValue::Reflect(JsonValue::Null))
    }

    pub fn bool(key: impl Into<Cow<'static, str>>, val: bool) -> Self {
        Self::new(key, FieldValue::Bool(val))
    }

    pub fn int(key: impl Into<Cow<'static, str>>, val: impl Into<i64>) -> Self {
        Self::new(key, FieldValue::Int64(val.into()))
    }

    pub fn uint(key: impl Into<Cow<'static, str>>, val: impl Into<u64>) -> Self {
        Self::new(key, FieldValue::Uint64(val.into()))
    }

    pub fn float(key: impl Into<Cow<'static, str>>, val: impl Into<f64>) -> Self {
        Self::new(key, FieldValue::Float64(val.into()))
    }

    pub fn string(
        key: impl Into<Cow<'static, str>>,
        val: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(key, FieldValue::Str(val.into()))
    }

    /// A string field whose payload may not be valid UTF-8; invalid bytes
    /// render as replacement-character escapes.
    pub fn string_bytes(key: impl Into<Cow<'static, str>>, val: Vec<u8>) -> Self {
        Self::new(key, FieldValue::StrBytes(val))
    }

    /// Capture any serializable value through the generic JSON marshaller.
    pub fn reflect(key: impl Into<Cow<'static, str>>, val: impl Serialize) -> Self {
        let value = match serde_json::to_value(&val) {
            Ok(v) => FieldValue::Reflect(v),
            Err(err) => FieldValue::Str(Cow::Owned(err.to_string())),
        };
        Self::new(key, value)
    }

    pub fn array(key: impl Into<Cow<'static, str>>, val: impl ArrayValue + 'static) -> Self {
        Self::new(key, FieldValue::Array(Box::new(val)))
    }

    /// A nested object built from a field slice.
    pub fn object(key: impl Into<Cow<'static, str>>, fields: Vec<Field>) -> Self {
        Self::new(key, FieldValue::Object(fields))
    }

    /// Wrap a map so that encoding expands it into individual key/value
    /// fields, in sorted key order, without an enclosing key.
    pub fn from_map(map: HashMap<String, JsonValue>) -> Self {
        Self::new("", FieldValue::FromMap(map))
    }

    pub fn bools(key: impl Into<Cow<'static, str>>, val: Vec<bool>) -> Self {
        Self::array(key, val)
    }

    pub fn ints(key: impl Into<Cow<'static, str>>, val: Vec<i64>) -> Self {
        Self::array(key, val)
    }

    pub fn uints(key: impl Into<Cow<'static, str>>, val: Vec<u64>) -> Self {
        Self::array(key, val)
    }

    pub fn floats(key: impl Into<Cow<'static, str>>, val: Vec<f64>) -> Self {
        Self::array(key, val)
    }

    pub fn strings(key: impl Into<Cow<'static, str>>, val: Vec<String>) -> Self {
        Self::array(key, val)
    }

    /// Build a field from a JSON value by inspecting its dynamic type,
    /// dispatching to the matching typed constructor.
    pub fn any(key: impl Into<Cow<'static, str>>, value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::nil(key),
            JsonValue::Bool(v) => Self::bool(key, v),
            JsonValue::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Self::int(key, v)
                } else if let Some(v) = n.as_u64() {
                    Self::uint(key, v)
                } else {
                    Self::float(key, n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::string(key, s),
            composite => Self::new(key, FieldValue::Reflect(composite)),
        }
    }

    /// Encode this field into the encoder based on its type.
    pub fn encode(&self, enc: &mut dyn Encoder) {
        match &self.value {
            FieldValue::Bool(v) => {
                enc.append_key(&self.key);
                enc.append_bool(*v);
            }
            FieldValue::Int64(v) => {
                enc.append_key(&self.key);
                enc.append_int64(*v);
            }
            FieldValue::Uint64(v) => {
                enc.append_key(&self.key);
                enc.append_uint64(*v);
            }
            FieldValue::Float64(v) => {
                enc.append_key(&self.key);
                enc.append_float64(*v);
            }
            FieldValue::Str(v) => {
                enc.append_key(&self.key);
                enc.append_string(v);
            }
            FieldValue::StrBytes(v) => {
                enc.append_key(&self.key);
                enc.append_string_bytes(v);
            }
            FieldValue::Reflect(v) => {
                enc.append_key(&self.key);
                enc.append_reflect(v);
            }
            FieldValue::Array(v) => {
                enc.append_key(&self.key);
                enc.append_array_begin();
                v.encode_array(enc);
                enc.append_array_end();
            }
            FieldValue::Object(fields) => {
                enc.append_key(&self.key);
                enc.append_object_begin();
                encode_fields(enc, fields);
                enc.append_object_end();
            }
            FieldValue::FromMap(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for k in keys {
                    Field::any(k.clone(), map[k].clone()).encode(enc);
                }
            }
        }
    }
}

/// Encode a slice of fields into the encoder.
pub fn encode_fields(enc: &mut dyn Encoder, fields: &[Field]) {
    for f in fields {
        f.encode(enc);
    }
}

/// Create a string field with the fixed key `msg`.
pub fn msg(message: impl Into<Cow<'static, str>>) -> Field {
    Field::string(MSG_KEY, message)
}

impl ArrayValue for Vec<bool> {
    fn encode_array(&self, enc: &mut dyn Encoder) {
        for v in self {
            enc.append_bool(*v);
        }
    }
}

impl ArrayValue for Vec<i64> {
    fn encode_array(&self, enc: &mut dyn Encoder) {
        for v in self {
            enc.append_int64(*v);
        }
    }
}

impl ArrayValue for Vec<u64> {
    fn encode_array(&self, enc: &mut dyn Encoder) {
        for v in self {
            enc.append_uint64(*v);
        }
    }
}

impl ArrayValue for Vec<f64> {
    fn encode_array(&self, enc: &mut dyn Encoder) {
        for v in self {
            enc.append_float64(*v);
        }
    }
}

impl ArrayValue for Vec<String> {
    fn encode_array(&self, enc: &mut dyn Encoder) {
        for v in self {
            enc.append_string(v);
        }
    }
}
