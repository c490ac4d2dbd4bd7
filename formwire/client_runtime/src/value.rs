use std::fmt;

use encoding_rs::Encoding;
use serde_json::json;

use crate::protocol::DataType;

/// Decoded wire value.
///
/// String-like scalars keep their declared type so that they can be sent
/// back under the same tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Char(String),
    VarChar(String),
    DbCode(String),
    Text(String),
    Number(String),
    Array(Vec<Value>),
    Record(Vec<(String, Value)>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::Bool(_) => DataType::Bool,
            Self::Char(_) => DataType::Char,
            Self::VarChar(_) => DataType::VarChar,
            Self::DbCode(_) => DataType::DbCode,
            Self::Text(_) => DataType::Text,
            Self::Number(_) => DataType::Number,
            Self::Array(_) => DataType::Array,
            Self::Record(_) => DataType::Record,
        }
    }

    pub fn string_of(tag: DataType, text: String) -> Option<Self> {
        match tag {
            DataType::Char => Some(Self::Char(text)),
            DataType::VarChar => Some(Self::VarChar(text)),
            DataType::DbCode => Some(Self::DbCode(text)),
            DataType::Text => Some(Self::Text(text)),
            DataType::Number => Some(Self::Number(text)),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::Record(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Char(s) | Self::VarChar(s) | Self::DbCode(s) | Self::Text(s) | Self::Number(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(v) => Some(i32::from(*v)),
            other => other.as_str().and_then(|s| s.trim().parse().ok()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            other => match other.as_str().map(str::trim) {
                Some("T" | "t" | "true" | "TRUE") => Some(true),
                Some("F" | "f" | "false" | "FALSE") => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn to_wire_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Bool(true) => "T".to_string(),
            Self::Bool(false) => "F".to_string(),
            Self::Array(_) | Self::Record(_) => String::new(),
            other => other.as_str().unwrap_or_default().to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => json!(v),
            Self::Bool(v) => json!(v),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
            other => json!(other.as_str().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Fully-qualified field address, e.g. `main.list[2].name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamePath {
    root: String,
    segments: Vec<PathSegment>,
}

impl NamePath {
    pub fn root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    pub fn parse(long_name: &str) -> Self {
        let mut parts = long_name.split('.');
        let head = parts.next().unwrap_or_default();
        let (root, head_indexes) = split_indexes(head);
        let mut path = Self::root(root);
        path.segments.extend(head_indexes);

        for part in parts {
            let (name, indexes) = split_indexes(part);
            path.segments.push(PathSegment::Field(name.to_string()));
            path.segments.extend(indexes);
        }
        path
    }

    pub fn field(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Field(name.to_string()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(index));
        next
    }

    pub fn window(&self) -> &str {
        &self.root
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn last_field(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Index(_) => None,
        })
    }
}

impl fmt::Display for NamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

fn split_indexes(part: &str) -> (&str, Vec<PathSegment>) {
    let Some(open) = part.find('[') else {
        return (part, Vec::new());
    };

    let indexes = part[open..]
        .split('[')
        .filter_map(|chunk| chunk.strip_suffix(']'))
        .filter_map(|digits| digits.parse().ok())
        .map(PathSegment::Index)
        .collect();
    (&part[..open], indexes)
}

/// Form-style escaping: ASCII letters and digits pass through, space
/// becomes `+`, every other character becomes `%xx` (lowercase hex) per
/// byte of its form in `encoding`.
pub fn percent_encode(text: &str, encoding: &'static Encoding) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == ' ' {
            out.push('+');
        } else if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            let mut buf = [0_u8; 4];
            let (bytes, _, _) = encoding.encode(ch.encode_utf8(&mut buf));
            for byte in bytes.iter() {
                out.push_str(&format!("%{byte:02x}"));
            }
        }
    }
    out
}

/// Inverse of [`percent_encode`]. Malformed escapes are kept literally.
pub fn percent_decode(text: &str, encoding: &'static Encoding) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    encoding.decode_without_bom_handling(&out).0.into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
