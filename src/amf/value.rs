//! AMF value types
//!
//! Object properties are kept as ordered key/value pairs rather than a map:
//! some ingest servers reject a `connect` command object whose properties
//! arrive in a different order than the encoder that produced it, so ordering
//! is data here, not an artifact of code structure.

/// AMF0 value tree
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    /// IEEE 754 double-precision floating point (marker 0x00)
    Number(f64),

    /// Boolean value (marker 0x01)
    Boolean(bool),

    /// UTF-8 string (marker 0x02, or 0x0C when longer than 65535 bytes)
    String(String),

    /// Key-value object, property order preserved (marker 0x03)
    Object(Vec<(String, AmfValue)>),

    /// Null value (marker 0x05)
    Null,

    /// Undefined value (marker 0x06)
    Undefined,

    /// Associative array with a length hint, order preserved (marker 0x08)
    EcmaArray(Vec<(String, AmfValue)>),
}

impl AmfValue {
    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value's properties (objects and ECMA arrays)
    pub fn as_pairs(&self) -> Option<&[(String, AmfValue)]> {
        match self {
            AmfValue::Object(pairs) => Some(pairs),
            AmfValue::EcmaArray(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, AmfValue::Null | AmfValue::Undefined)
    }

    /// Get a property from an object value (first match in order)
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.as_pairs()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Get a string property from an object value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Get a number property from an object value
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }

    /// Build an object from (key, value) pairs
    pub fn object<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AmfValue>,
    {
        AmfValue::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Default for AmfValue {
    fn default() -> Self {
        AmfValue::Null
    }
}

impl From<bool> for AmfValue {
    fn from(v: bool) -> Self {
        AmfValue::Boolean(v)
    }
}

impl From<f64> for AmfValue {
    fn from(v: f64) -> Self {
        AmfValue::Number(v)
    }
}

impl From<u32> for AmfValue {
    fn from(v: u32) -> Self {
        AmfValue::Number(v as f64)
    }
}

impl From<String> for AmfValue {
    fn from(v: String) -> Self {
        AmfValue::String(v)
    }
}

impl From<&str> for AmfValue {
    fn from(v: &str) -> Self {
        AmfValue::String(v.to_string())
    }
}
