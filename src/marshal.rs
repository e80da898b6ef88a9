//! Conversion of session values into the JSON-safe value model.

use serde::ser::{Error as _, SerializeSeq};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::session::NativeValue;

/// Sentinel prefix for values with no usable representation.
pub const UNSUPPORTED_PREFIX: &str = "Unserializable MATLAB type";

/// Restricted value model returned to callers.
///
/// Serialization fails for non-finite numbers instead of silently writing
/// `null`, so a successful encode means the payload is parseable JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Number(f64),
    Bool(bool),
    String(String),
    List(Vec<JsonValue>),
}

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonValue::Number(n) if !n.is_finite() => Err(S::Error::custom(format!(
                "non-finite number {} has no JSON representation",
                n
            ))),
            JsonValue::Number(n) => serializer.serialize_f64(*n),
            JsonValue::Bool(b) => serializer.serialize_bool(*b),
            JsonValue::String(s) => serializer.serialize_str(s),
            JsonValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// How a native value will be represented.
enum Form<'a> {
    Number(f64),
    Bool(bool),
    Text(&'a str),
    Numbers { shape: Vec<usize>, data: &'a [f64] },
    Bools { shape: Vec<usize>, data: &'a [bool] },
    Unsupported {
        type_tag: &'a str,
        display: Option<&'a str>,
    },
}

fn classify(value: &NativeValue) -> Form<'_> {
    match value {
        NativeValue::Scalar(n) => Form::Number(*n),
        NativeValue::Boolean(b) => Form::Bool(*b),
        NativeValue::Text(s) => Form::Text(s),
        NativeValue::NumericArray { shape, data } => match squeeze(shape, data.len()) {
            Some(shape) if shape.is_empty() => Form::Number(data[0]),
            Some(shape) => Form::Numbers { shape, data },
            None => Form::Unsupported {
                type_tag: value.type_name(),
                display: None,
            },
        },
        NativeValue::BooleanArray { shape, data } => match squeeze(shape, data.len()) {
            Some(shape) if shape.is_empty() => Form::Bool(data[0]),
            Some(shape) => Form::Bools { shape, data },
            None => Form::Unsupported {
                type_tag: value.type_name(),
                display: None,
            },
        },
        NativeValue::Opaque { type_tag, display } => Form::Unsupported {
            type_tag,
            display: display.as_deref(),
        },
    }
}

/// Drop singleton dimensions. `None` when the element count does not match
/// the shape. An empty result means a single element.
fn squeeze(shape: &[usize], len: usize) -> Option<Vec<usize>> {
    if shape.iter().product::<usize>() != len {
        return None;
    }
    Some(shape.iter().copied().filter(|&d| d != 1).collect())
}

/// Nest row-major `data` into lists following `shape`.
fn nest<T: Copy>(shape: &[usize], data: &[T], leaf: fn(T) -> JsonValue) -> JsonValue {
    match shape.split_first() {
        None => data.first().map(|&v| leaf(v)).unwrap_or(JsonValue::List(Vec::new())),
        Some((_, [])) => JsonValue::List(data.iter().map(|&v| leaf(v)).collect()),
        Some((&outer, inner)) => {
            let stride: usize = inner.iter().product();
            if outer == 0 || stride == 0 {
                return JsonValue::List(Vec::new());
            }
            JsonValue::List(
                data.chunks(stride)
                    .map(|chunk| nest(inner, chunk, leaf))
                    .collect(),
            )
        }
    }
}

/// Convert a session value. Never fails: values without a structural
/// representation degrade to a string.
pub fn marshal(value: &NativeValue) -> JsonValue {
    match classify(value) {
        Form::Number(n) => JsonValue::Number(n),
        Form::Bool(b) => JsonValue::Bool(b),
        Form::Text(s) => JsonValue::String(s.to_string()),
        Form::Numbers { shape, data } => nest(&shape, data, JsonValue::Number),
        Form::Bools { shape, data } => nest(&shape, data, JsonValue::Bool),
        Form::Unsupported { type_tag, display } => {
            warn!(
                "Unsupported MATLAB type encountered for conversion: {}. Using string representation.",
                type_tag
            );
            match display {
                Some(text) => JsonValue::String(text.to_string()),
                None => JsonValue::String(format!("{}: {}", UNSUPPORTED_PREFIX, type_tag)),
            }
        }
    }
}
