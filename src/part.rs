use bytes::Bytes;

use crate::parser::headers::{
    CONTENT_DISPOSITION, CONTENT_TYPE, encode_extended_value, parse_content_disposition,
    parse_header_parameters, quote_parameter_value,
};

/// One header line of a part, after unfolding and trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    key: String,
    name: String,
    value: String,
}

impl HeaderEntry {
    /// Creates an entry, deriving the lowercase lookup key from `name`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.to_ascii_lowercase(),
            name,
            value: value.into(),
        }
    }

    /// Lowercase lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Header name with its original casing.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header value.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn append_folded(&mut self, continuation: &str) {
        if !self.value.is_empty() {
            self.value.push(' ');
        }
        self.value.push_str(continuation);
    }
}

/// Ordered part headers with case-insensitive lookup.
///
/// Repeated names are kept in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartHeaders {
    entries: Vec<HeaderEntry>,
}

impl PartHeaders {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(HeaderEntry::new(name, value));
    }

    pub(crate) fn push_entry(&mut self, entry: HeaderEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut HeaderEntry> {
        self.entries.last_mut()
    }

    /// Replaces the value of the first header named `name`, or appends one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let key = name.to_ascii_lowercase();
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value.into(),
            None => self.push(name, value),
        }
    }

    /// Removes every header named `name`.
    pub fn remove(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        self.entries.retain(|entry| entry.key != key);
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Returns every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let key = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |entry| entry.key == key)
            .map(HeaderEntry::value)
    }

    /// Number of headers named `name`.
    pub fn count(&self, name: &str) -> usize {
        self.get_all(name).count()
    }

    /// Iterates over all entries in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, HeaderEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a PartHeaders {
    type Item = &'a HeaderEntry;
    type IntoIter = std::slice::Iter<'a, HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// One field or file of a `multipart/form-data` message.
///
/// `filename == Some("")` (parameter present but empty) and
/// `filename == None` (no parameter) are different parts.
///
/// The typed fields are authoritative for `Content-Disposition` and
/// `Content-Type` when the part is generated; `headers` supplies everything
/// else and the original wording of those two headers when it still agrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Form field name from `Content-Disposition`.
    pub name: String,
    /// Plain `filename` parameter.
    pub filename: Option<String>,
    /// Decoded `filename*` parameter.
    pub filename_star: Option<String>,
    /// Raw part `Content-Type` value.
    pub content_type: Option<String>,
    /// All part headers, in wire order.
    pub headers: PartHeaders,
    /// Body bytes, verbatim.
    pub body: Bytes,
}

impl Part {
    /// Creates a text part with a synthesized `Content-Disposition` header.
    pub fn new(name: impl Into<String>) -> Self {
        let mut part = Self {
            name: name.into(),
            filename: None,
            filename_star: None,
            content_type: None,
            headers: PartHeaders::new(),
            body: Bytes::new(),
        };
        part.sync_disposition();
        part
    }

    /// Sets the plain `filename` parameter.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self.sync_disposition();
        self
    }

    /// Sets the extended `filename*` parameter.
    pub fn with_filename_star(mut self, filename: impl Into<String>) -> Self {
        self.filename_star = Some(filename.into());
        self.sync_disposition();
        self
    }

    /// Sets the part `Content-Type` header.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.headers.set(CONTENT_TYPE, content_type.clone());
        self.content_type = Some(content_type);
        self
    }

    /// Appends an extra header.
    ///
    /// `Content-Type` and `Content-Disposition` replace the existing header
    /// and update the typed fields they describe.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();

        if name.eq_ignore_ascii_case(CONTENT_TYPE) {
            self.headers.set(&name, value.clone());
            self.content_type = Some(value);
        } else if name.eq_ignore_ascii_case(CONTENT_DISPOSITION) {
            if let Ok(disposition) = parse_content_disposition(&value, false) {
                self.name = disposition.name.unwrap_or_default();
                self.filename = disposition.filename;
                self.filename_star = disposition.filename_star;
            }
            self.headers.set(&name, value);
        } else {
            self.headers.push(name, value);
        }
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// `filename*` when present, otherwise `filename`.
    pub fn effective_filename(&self) -> Option<&str> {
        self.filename_star.as_deref().or(self.filename.as_deref())
    }

    /// Returns `true` when the part carries any filename parameter.
    pub fn is_file(&self) -> bool {
        self.filename.is_some() || self.filename_star.is_some()
    }

    /// Parses the part `Content-Type`.
    pub fn mime(&self) -> Option<mime::Mime> {
        self.content_type.as_deref()?.parse().ok()
    }

    /// The `charset` parameter of the part `Content-Type`.
    pub fn charset(&self) -> Option<String> {
        let content_type = self.content_type.as_deref()?;
        let (_, params) = content_type.split_once(';')?;
        parse_header_parameters(params, false)
            .ok()?
            .into_iter()
            .find(|(key, _)| key == "charset")
            .map(|(_, value)| value)
    }

    /// Body decoded as UTF-8, when it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// `Content-Disposition` value built from the typed fields.
    pub fn disposition_value(&self) -> String {
        let mut value = format!("form-data; name={}", quote_parameter_value(&self.name));
        if let Some(filename) = &self.filename {
            value.push_str("; filename=");
            value.push_str(&quote_parameter_value(filename));
        }
        if let Some(filename) = &self.filename_star {
            value.push_str("; filename*=");
            value.push_str(&encode_extended_value(filename));
        }
        value
    }

    /// Returns `true` when `value` names exactly the typed disposition fields.
    pub(crate) fn disposition_agrees(&self, value: &str) -> bool {
        parse_content_disposition(value, true).is_ok_and(|disposition| {
            disposition.name.as_deref() == Some(self.name.as_str())
                && disposition.filename == self.filename
                && disposition.filename_star == self.filename_star
        })
    }

    fn sync_disposition(&mut self) {
        let value = self.disposition_value();
        self.headers.set(CONTENT_DISPOSITION, value);
    }
}

/// A parsed or to-be-generated `multipart/form-data` message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// Parts in wire order.
    pub parts: Vec<Part>,
    /// Bytes before the first delimiter. `None` when the body starts with it.
    pub preamble: Option<Bytes>,
    /// Bytes after the final delimiter line. An empty epilogue is `None`.
    pub epilogue: Option<Bytes>,
}

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a part.
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Sets the preamble.
    pub fn with_preamble(mut self, preamble: impl Into<Bytes>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    /// Sets the epilogue.
    pub fn with_epilogue(mut self, epilogue: impl Into<Bytes>) -> Self {
        let epilogue = epilogue.into();
        self.epilogue = (!epilogue.is_empty()).then_some(epilogue);
        self
    }

    /// Parts whose field name is `name`, in wire order.
    pub fn parts_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Part> + 'a {
        self.parts.iter().filter(move |part| part.name == name)
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` when the message has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
