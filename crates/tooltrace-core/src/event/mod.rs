//! Schema-free event values emitted by an agent run.
//!
//! Agents emit heterogeneously shaped events. Rather than committing to a
//! record type, events are modelled as a JSON-like value tree
//! ([`EventValue`]) that may also carry leaves JSON cannot represent
//! natively: byte strings, unordered sets and arbitrary opaque values.
//!
//! Serialization goes through the [`Serialize`] impl below, which handles
//! the native variants itself and defers every other value to
//! [`fallback::fallback`], level by level.

pub mod fallback;

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

pub use fallback::{Substitute, fallback};

/// One discrete unit emitted by an agent run.
pub type StreamEvent = EventValue;

/// A JSON-like value tree with a few non-native leaf kinds.
#[derive(Clone)]
pub enum EventValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    List(Vec<EventValue>),
    /// Ordered map; entries serialize in insertion order.
    Map(Vec<(String, EventValue)>),
    /// Unordered collection. Not JSON-native.
    Set(Vec<EventValue>),
    /// Raw bytes, possibly not valid UTF-8. Not JSON-native.
    Bytes(Vec<u8>),
    /// Any other runtime value, known only by its textual representation.
    Opaque(Arc<dyn fmt::Display + Send + Sync>),
}

impl EventValue {
    /// Build an ordered map from `(key, value)` pairs.
    ///
    /// A repeated key keeps its first position and takes the last value,
    /// as with [`EventValue::insert`].
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<EventValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .fold(EventValue::Map(Vec::new()), |map, (k, v)| map.with(k, v))
    }

    /// Convert any serializable value. A serialization failure becomes an
    /// opaque leaf carrying the error text.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => v.into(),
            Err(e) => EventValue::opaque(format!("<unserializable: {e}>")),
        }
    }

    /// Wrap an arbitrary displayable value as an opaque leaf.
    pub fn opaque(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        EventValue::Opaque(Arc::new(value))
    }

    /// Look up a key in a map value. Returns `None` for non-maps.
    pub fn get(&self, key: &str) -> Option<&EventValue> {
        match self {
            EventValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Insert or replace a key in a map value.
    ///
    /// Has no effect on non-map values.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<EventValue>) {
        if let EventValue::Map(entries) = self {
            let key = key.into();
            let value = value.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
    }

    /// Builder-style [`EventValue::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<EventValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the standard encoder can represent this value at this level
    /// without consulting the fallback.
    pub fn is_native(&self) -> bool {
        match self {
            EventValue::Float(f) => f.is_finite(),
            EventValue::Set(_) | EventValue::Bytes(_) | EventValue::Opaque(_) => false,
            _ => true,
        }
    }

    /// Encode as a single JSON line (no trailing newline).
    pub fn encode_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Encode into a `serde_json::Value`, applying fallbacks.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

impl Serialize for EventValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventValue::Null => serializer.serialize_unit(),
            EventValue::Bool(b) => serializer.serialize_bool(*b),
            EventValue::Int(i) => serializer.serialize_i64(*i),
            EventValue::UInt(u) => serializer.serialize_u64(*u),
            EventValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            EventValue::String(s) => serializer.serialize_str(s),
            EventValue::List(items) => serializer.collect_seq(items),
            EventValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            rejected => fallback(rejected).serialize(serializer),
        }
    }
}

impl fmt::Debug for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::Null => f.write_str("Null"),
            EventValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            EventValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            EventValue::UInt(u) => f.debug_tuple("UInt").field(u).finish(),
            EventValue::Float(x) => f.debug_tuple("Float").field(x).finish(),
            EventValue::String(s) => f.debug_tuple("String").field(s).finish(),
            EventValue::List(items) => f.debug_tuple("List").field(items).finish(),
            EventValue::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            EventValue::Set(items) => f.debug_tuple("Set").field(items).finish(),
            EventValue::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            EventValue::Opaque(value) => f.debug_tuple("Opaque").field(&value.to_string()).finish(),
        }
    }
}

/// Textual representation: the inner text for strings and opaque values,
/// compact JSON for everything else.
impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::String(s) => f.write_str(s),
            EventValue::Opaque(value) => value.fmt(f),
            EventValue::Float(x) if !x.is_finite() => write!(f, "{x}"),
            other => {
                let encoded = serde_json::to_string(other).map_err(|_| fmt::Error)?;
                f.write_str(&encoded)
            }
        }
    }
}

impl PartialEq for EventValue {
    fn eq(&self, other: &Self) -> bool {
        use EventValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) | (Set(a), Set(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Opaque(a), Opaque(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<Value> for EventValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => EventValue::Null,
            Value::Bool(b) => EventValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    EventValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    EventValue::UInt(u)
                } else {
                    EventValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => EventValue::String(s),
            Value::Array(items) => EventValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                EventValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        EventValue::String(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        EventValue::String(value)
    }
}

impl From<bool> for EventValue {
    fn from(value: bool) -> Self {
        EventValue::Bool(value)
    }
}

impl From<i64> for EventValue {
    fn from(value: i64) -> Self {
        EventValue::Int(value)
    }
}

impl From<u64> for EventValue {
    fn from(value: u64) -> Self {
        EventValue::UInt(value)
    }
}

impl From<usize> for EventValue {
    fn from(value: usize) -> Self {
        EventValue::UInt(value as u64)
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        EventValue::Float(value)
    }
}

impl From<Vec<u8>> for EventValue {
    fn from(value: Vec<u8>) -> Self {
        EventValue::Bytes(value)
    }
}

impl From<Vec<EventValue>> for EventValue {
    fn from(value: Vec<EventValue>) -> Self {
        EventValue::List(value)
    }
}

impl<T: Into<EventValue>> From<Option<T>> for EventValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(EventValue::Null, Into::into)
    }
}
