//! Conversion between [`Value`] trees and JSON.
//!
//! JSON has no binary or tagged collections, so both are spelled as
//! reserved single-purpose objects:
//!
//! - binary: `{"@bin": "<base64>"}`
//! - tagged collection: `{"@type": <tag>, "@value": <array or object>}`
//!
//! [`PassThrough`] keeps tagged collections intact in both directions, so
//! bytes produced by any application can be inspected and re-encoded without
//! knowing its object types.

use base64::Engine;
use objpack_codec::{
    DecoderOptions, EncoderOptions, Envelope, ExtensionError, Map, Object, PackCtrl, UnpackCtrl,
    Value,
};
use serde_json::{Number, Value as Json};

pub const BIN_KEY: &str = "@bin";
pub const TYPE_KEY: &str = "@type";
pub const VALUE_KEY: &str = "@value";

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("@bin is not valid base64: {0}")]
    InvalidBinary(#[from] base64::DecodeError),

    #[error("@value must be an array or object")]
    InvalidTaggedValue,
}

/// A tagged collection whose tag is not interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub object_type: Value,
    /// Either [`Value::Array`] or [`Value::Map`].
    pub data: Value,
}

/// Controller that carries tagged collections through as [`Tagged`] objects.
#[derive(Debug, Clone, Default)]
pub struct PassThrough<O> {
    pub options: O,
}

impl<O> PassThrough<O> {
    pub fn new(options: O) -> Self {
        Self { options }
    }
}

impl PackCtrl for PassThrough<EncoderOptions> {
    fn options(&self) -> EncoderOptions {
        self.options
    }

    fn from_obj(&self, object: &Object) -> Result<Envelope, ExtensionError> {
        let Some(tagged) = object.downcast_ref::<Tagged>() else {
            return Err(ExtensionError::UnrecognizedObject(object.type_name()));
        };
        match &tagged.data {
            Value::Array(items) => Ok(Envelope::List {
                object_type: tagged.object_type.clone(),
                items: items.clone(),
            }),
            Value::Map(entries) => Ok(Envelope::Map {
                object_type: tagged.object_type.clone(),
                entries: entries.clone(),
            }),
            other => Err(ExtensionError::Invalid(format!(
                "tagged {} is not a collection",
                other.kind()
            ))),
        }
    }
}

impl UnpackCtrl for PassThrough<DecoderOptions> {
    fn options(&self) -> DecoderOptions {
        self.options.clone()
    }

    fn from_dict(&self, object_type: Value, data: Map) -> Result<Value, ExtensionError> {
        Ok(tagged(object_type, Value::Map(data)))
    }

    fn from_list(&self, object_type: Value, data: Vec<Value>) -> Result<Value, ExtensionError> {
        Ok(tagged(object_type, Value::Array(data)))
    }
}

fn tagged(object_type: Value, data: Value) -> Value {
    Value::Object(Object::new(Tagged { object_type, data }))
}

/// Convert a JSON document into a value tree.
pub fn from_json(json: &Json) -> Result<Value, JsonError> {
    let value = match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => number(n),
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(from_json).collect::<Result<_, _>>()?),
        Json::Object(map) => {
            if let (1, Some(Json::String(encoded))) = (map.len(), map.get(BIN_KEY)) {
                let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
                return Ok(Value::from(bytes));
            }
            if let (2, Some(object_type), Some(data)) =
                (map.len(), map.get(TYPE_KEY), map.get(VALUE_KEY))
            {
                let data = from_json(data)?;
                if !matches!(data, Value::Array(_) | Value::Map(_)) {
                    return Err(JsonError::InvalidTaggedValue);
                }
                return Ok(tagged(from_json(object_type)?, data));
            }
            let mut entries = Map::with_capacity(map.len());
            for (key, value) in map {
                entries.insert(key.clone(), from_json(value)?);
            }
            Value::Map(entries)
        }
    };
    Ok(value)
}

fn number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else if let Some(u) = n.as_u64() {
        Value::UInt(u)
    } else {
        Value::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Convert a value tree into JSON. Non-finite floats become `null`.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Nil | Value::Undefined => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::UInt(u) => Json::from(*u),
        Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.clone()),
        Value::Bin(bytes) => {
            let mut map = serde_json::Map::new();
            map.insert(
                BIN_KEY.to_string(),
                Json::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
            );
            Json::Object(map)
        }
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
        Value::Object(object) => match object.downcast_ref::<Tagged>() {
            Some(tagged) => {
                let mut map = serde_json::Map::new();
                map.insert(TYPE_KEY.to_string(), to_json(&tagged.object_type));
                map.insert(VALUE_KEY.to_string(), to_json(&tagged.data));
                Json::Object(map)
            }
            None => Json::String(format!("<object {}>", object.type_name())),
        },
    }
}
