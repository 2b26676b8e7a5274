//! PDF object values.

use std::fmt;

/// Object number and generation of an indirect object.
pub type ObjectId = (u32, u16);

/// How a string was written in the source, kept so it is written back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `(text)`
    #[default]
    Literal,
    /// `<74657874>`
    Hexadecimal,
}

/// A PDF value.
///
/// Closed on purpose: every consumer matches it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer number.
    Integer(i64),
    /// Real number.
    Real(f64),
    /// String bytes (escapes already decoded).
    String(Vec<u8>, StringFormat),
    /// Name bytes without the leading slash (`#xx` escapes decoded).
    Name(Vec<u8>),
    /// `[ ... ]`
    Array(Vec<Object>),
    /// `<< ... >>`
    Dictionary(Dictionary),
    /// Dictionary followed by a raw payload.
    Stream(Stream),
    /// `n g R`
    Reference(ObjectId),
}

impl Object {
    /// Build a name object.
    pub fn name(name: impl Into<Vec<u8>>) -> Self {
        Self::Name(name.into())
    }

    /// Integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Name bytes, if this is a name.
    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Referenced id, if this is a reference.
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Self::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Array items, if this is an array.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary, if this is a dictionary or a stream.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            Self::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Stream, if this is a stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Value of the `/Type` entry of a dictionary or stream.
    pub fn type_name(&self) -> Option<&[u8]> {
        self.as_dict().and_then(Dictionary::type_name)
    }

    /// Visit every reference held directly or nested in this value.
    pub fn for_each_reference(&self, visit: &mut impl FnMut(ObjectId)) {
        match self {
            Self::Reference(id) => visit(*id),
            Self::Array(items) => items.iter().for_each(|item| item.for_each_reference(visit)),
            Self::Dictionary(dict) => dict.for_each_reference(visit),
            Self::Stream(stream) => stream.dict.for_each_reference(visit),
            Self::Null
            | Self::Boolean(_)
            | Self::Integer(_)
            | Self::Real(_)
            | Self::String(..)
            | Self::Name(_) => {}
        }
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Self::Reference(id)
    }
}

impl From<Dictionary> for Object {
    fn from(dict: Dictionary) -> Self {
        Self::Dictionary(dict)
    }
}

impl From<Vec<Object>> for Object {
    fn from(items: Vec<Object>) -> Self {
        Self::Array(items)
    }
}

impl From<Stream> for Object {
    fn from(stream: Stream) -> Self {
        Self::Stream(stream)
    }
}

/// Insertion-ordered dictionary.
///
/// Keys are unique; setting an existing key replaces its value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: Vec<(Vec<u8>, Object)>,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key.
    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Object>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// True if the key is present.
    pub fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Object)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Iterate entries mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&[u8], &mut Object)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_slice(), v))
    }

    /// Value of `/Type`, if it is a name.
    pub fn type_name(&self) -> Option<&[u8]> {
        self.get(b"Type").and_then(Object::as_name)
    }

    /// True if `/Type` equals `name`.
    pub fn has_type(&self, name: &[u8]) -> bool {
        self.type_name() == Some(name)
    }

    /// Visit every reference nested in the values.
    pub fn for_each_reference(&self, visit: &mut impl FnMut(ObjectId)) {
        self.entries
            .iter()
            .for_each(|(_, value)| value.for_each_reference(visit));
    }
}

impl<K: Into<Vec<u8>>, V: Into<Object>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (key, value) in iter {
            dict.set(key, value);
        }
        dict
    }
}

/// Stream object: dictionary plus raw (still encoded) payload.
#[derive(Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary. `Length` here is whatever the source said; the
    /// writer always recomputes it from `content`.
    pub dict: Dictionary,
    /// Raw payload exactly as stored between `stream` and `endstream`.
    pub content: Vec<u8>,
}

impl Stream {
    /// Create a stream.
    pub fn new(dict: Dictionary, content: Vec<u8>) -> Self {
        Self { dict, content }
    }

    /// Payload with the stream's filters undone.
    pub fn decoded_content(&self) -> super::PdfResult<Vec<u8>> {
        super::filter::decode(self)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("dict", &self.dict)
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .finish()
    }
}
