//! Value model for command documents, options, and server responses.
//!
//! [`Value`] is the single tree type that flows through every builder and
//! interpreter. Besides the usual JSON-like variants it carries two
//! executable variants:
//!
//! - [`Value::Function`]: a caller-side callable, represented by its source
//!   text. Builders convert it exactly once, at the boundary.
//! - [`Value::Code`]: an Executable Code Value ready for transmission: an
//!   immutable code body plus an optional variable-binding scope.
//!
//! ## Extended JSON
//!
//! [`Value`] converts to and from `serde_json::Value` using the extended JSON
//! conventions `{"$code": "...", "$scope": {...}}` for [`Code`] and
//! `{"$function": "..."}` for [`Function`].

use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Executable values
// ---------------------------------------------------------------------------

/// A callable supplied by the caller, carried by its source text.
///
/// A `Function` never reaches the wire as-is: builders turn it into either
/// its source text or a [`Code`] value depending on the field it appears in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    source: String,
}

impl Function {
    /// Wraps the source text of a callable.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Returns the source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Converts the callable into an Executable Code Value with no scope.
    pub fn to_code(&self) -> Code {
        Code::new(self.source.clone())
    }
}

// ---------------------------------------------------------------------------

/// Executable Code Value: a code body plus an optional scope.
///
/// The code text cannot be changed after construction. The scope can only be
/// replaced through [`Code::with_scope`], which produces a new value, so a
/// scope held by a caller is never mutated by a builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    code: String,
    scope: Option<Document>,
}

impl Code {
    /// Creates a code value with no scope.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            scope: None,
        }
    }

    /// Creates a code value with the given scope.
    pub fn with_scope(code: impl Into<String>, scope: Document) -> Self {
        Self {
            code: code.into(),
            scope: Some(scope),
        }
    }

    /// Returns the code body.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the scope, if one is attached.
    pub fn scope(&self) -> Option<&Document> {
        self.scope.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A node in a command document, option mapping, or server response.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Document(Document),
    Function(Function),
    Code(Code),
}

impl Value {
    /// Truthiness as the server-side scripting language defines it.
    ///
    /// `null`, `false`, `0`, `NaN` and the empty string are falsy; every
    /// container, callable and code value is truthy, even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Double(d) => *d != 0.0 && !d.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Document(_) | Value::Function(_) | Value::Code(_) => true,
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for a caller-side callable.
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Numeric view of the value; doubles with an integral value count.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
            _ => None,
        }
    }

    /// Loose numeric equality with `1`, as used for `ok` flags and `inline: 1`.
    ///
    /// `true` compares equal to `1`.
    pub fn is_one(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => other.as_i64() == Some(1),
        }
    }

    /// Renders the value as extended JSON.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Document(doc) => doc.to_json(),
            Value::Function(f) => serde_json::json!({ "$function": f.source() }),
            Value::Code(code) => match code.scope() {
                Some(scope) => serde_json::json!({ "$code": code.code(), "$scope": scope.to_json() }),
                None => serde_json::json!({ "$code": code.code() }),
            },
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                if let Some(Json::String(source)) = map.get("$function") {
                    if map.len() == 1 {
                        return Value::Function(Function::new(source.clone()));
                    }
                }
                if let Some(Json::String(code)) = map.get("$code") {
                    match map.get("$scope") {
                        Some(Json::Object(scope)) if map.len() == 2 => {
                            let scope = Document::from_json_map(scope.clone());
                            return Value::Code(Code::with_scope(code.clone(), scope));
                        }
                        None if map.len() == 1 => return Value::Code(Code::new(code.clone())),
                        _ => {}
                    }
                }
                Value::Document(Document::from_json_map(map))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Code> for Value {
    fn from(code: Code) -> Self {
        Value::Code(code)
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An insertion-ordered mapping of field name to [`Value`].
///
/// Field order is preserved for the wire (the kind field of a command comes
/// first) but is ignored by equality.
#[derive(Debug, Clone, Default)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing an existing field of the same name in place.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(index) = self.entries.iter().position(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut self.entries[index].1, value));
        }
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns `true` if the field exists and is truthy.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    /// Name of the first field; for a command document this is its kind.
    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a document from a JSON object; returns `None` for any other JSON value.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Object(map) => Some(Self::from_json_map(map)),
            _ => None,
        }
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
