//! JSON paths and their JSON Pointer (RFC 6901) representation.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// One step of a [`JsonPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Immutable sequence of path segments addressing a value inside a document.
///
/// The root path is empty. `child_*` methods return new paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn child_key(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    /// Append every segment of `other` to this path.
    pub fn join(&self, other: &JsonPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Parse a JSON Pointer, with or without a leading `#`.
    ///
    /// Fragment input (`#/...`) is percent-decoded before `~1`/`~0` unescaping.
    /// Segments made only of digits become [`Segment::Index`]; evaluation
    /// still accepts them as object keys.
    pub fn from_pointer(pointer: &str) -> Result<Self, String> {
        let (body, is_fragment) = match pointer.strip_prefix('#') {
            Some(rest) => (rest, true),
            None => (pointer, false),
        };
        if body.is_empty() {
            return Ok(Self::root());
        }
        let Some(body) = body.strip_prefix('/') else {
            return Err(format!("JSON pointer must start with '/': {}", pointer));
        };

        let mut segments = Vec::new();
        for raw in body.split('/') {
            let decoded = if is_fragment {
                percent_decode(raw)?
            } else {
                raw.to_string()
            };
            let key = unescape(&decoded)?;
            let segment = if is_array_index(&key) {
                match key.parse::<usize>() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => Segment::Key(key),
                }
            } else {
                Segment::Key(key)
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Plain JSON Pointer form (`/a/0/b~1c`), empty for the root.
    pub fn to_pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Key(key) => out.push_str(&escape(key)),
                Segment::Index(index) => out.push_str(&index.to_string()),
            }
        }
        out
    }

    /// URI fragment form (`#/a/0/b~1c`), `#` for the root.
    ///
    /// Characters not allowed in a fragment are percent-encoded.
    pub fn to_uri_fragment(&self) -> String {
        let mut out = String::from("#");
        out.push_str(&percent_encode(&self.to_pointer()));
        out
    }

    /// Evaluate the path against a document.
    pub fn evaluate<'v>(&self, document: &'v Value) -> Option<&'v Value> {
        let mut current = document;
        for segment in &self.segments {
            current = match (current, segment) {
                (Value::Object(map), Segment::Key(key)) => map.get(key)?,
                (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string())?,
                (Value::Array(items), Segment::Index(index)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri_fragment())
    }
}

impl Serialize for JsonPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_uri_fragment())
    }
}

fn is_array_index(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && (s == "0" || !s.starts_with('0'))
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return Err(format!("invalid escape in JSON pointer segment: {}", raw)),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Bytes escaped in a URI fragment: controls, space and the characters
/// RFC 3986 does not allow there.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, FRAGMENT).to_string()
}

fn percent_decode(s: &str) -> Result<String, String> {
    let malformed = s.match_indices('%').any(|(i, _)| {
        !s.get(i + 1..i + 3)
            .is_some_and(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
    });
    if malformed {
        return Err(format!("invalid percent-encoding in JSON pointer: {}", s));
    }
    percent_decode_str(s)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| format!("JSON pointer is not valid UTF-8: {}", s))
}
