//! Block header grammar
//!
//! Every block starts with a single-line HTML comment carrying its metadata:
//!
//! ```text
//! <!-- id:0190..., ts:2025-01-01T10:00:00Z, category:"work", parent-id:0190... -->
//! ```
//!
//! ```text
//! header  := "<!--" ws field ("," ws field)* ws "-->"
//! field   := key ":" value
//! value   := quoted | bare
//! quoted  := JSON string literal
//! bare    := any text up to the next ","
//! ```
//!
//! Parsing never fails on a malformed value; the raw text is kept so callers
//! can apply their own fallback.

/// Opening delimiter of a header (and of a trashed body).
pub const COMMENT_OPEN: &str = "<!--";
/// Closing delimiter of a header (and of a trashed body).
pub const COMMENT_CLOSE: &str = "-->";
/// Text every block header starts with; used to split a buffer into blocks.
pub const BLOCK_MARKER: &str = "<!-- id:";

pub const KEY_ID: &str = "id";
pub const KEY_TIMESTAMP: &str = "ts";
pub const KEY_CATEGORY: &str = "category";
pub const KEY_TEMPLATE: &str = "template";
pub const KEY_DELETED: &str = "deleted";
pub const KEY_TRASHED_AT: &str = "trashedAt";
pub const KEY_PINNED_AT: &str = "pinnedAt";
pub const KEY_PARENT_ID: &str = "parent-id";
pub const KEY_PERMANENTLY_DELETED: &str = "permanently-deleted";

const KNOWN_KEYS: &[&str] = &[
    KEY_ID,
    KEY_TIMESTAMP,
    KEY_CATEGORY,
    KEY_TEMPLATE,
    KEY_DELETED,
    KEY_TRASHED_AT,
    KEY_PINNED_AT,
    KEY_PARENT_ID,
    KEY_PERMANENTLY_DELETED,
];

/// Value of a header field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Unquoted text, trimmed
    Bare(String),
    /// Successfully unescaped quoted string
    Quoted(String),
    /// Quoted value that failed to parse; holds the raw text
    Malformed(String),
}

impl FieldValue {
    /// The value as text, if it parsed cleanly.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Bare(s) | FieldValue::Quoted(s) => Some(s),
            FieldValue::Malformed(_) => None,
        }
    }

    /// The value as text, falling back to the raw text when malformed.
    pub fn raw(&self) -> &str {
        match self {
            FieldValue::Bare(s) | FieldValue::Quoted(s) | FieldValue::Malformed(s) => s,
        }
    }

    pub fn is_true(&self) -> bool {
        self.as_text() == Some("true")
    }
}

/// A parsed block header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<(String, FieldValue)>,
}

impl Header {
    /// Parse the header at the start of `block`.
    ///
    /// Returns the header and the byte offset just past its closing
    /// delimiter, or `None` if the first line carries no recognizable header.
    pub fn parse(block: &str) -> Option<(Header, usize)> {
        let lead = block.len() - block.trim_start().len();
        let line_end = block[lead..]
            .find('\n')
            .map(|i| lead + i)
            .unwrap_or(block.len());
        let line = &block[lead..line_end];

        let inner_start = line.strip_prefix(COMMENT_OPEN)?;
        let inner_offset = lead + COMMENT_OPEN.len();
        let close = find_close(inner_start)?;
        let header = Self::parse_fields(&inner_start[..close]);

        if !header.fields.iter().any(|(k, _)| KNOWN_KEYS.contains(&k.as_str())) {
            return None;
        }
        Some((header, inner_offset + close + COMMENT_CLOSE.len()))
    }

    fn parse_fields(inner: &str) -> Header {
        let mut scanner = FieldScanner {
            src: inner,
            pos: 0,
        };
        let mut fields = Vec::new();
        while let Some(field) = scanner.next_field() {
            fields.push(field);
        }
        Header { fields }
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Clean text value for `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map(FieldValue::is_true).unwrap_or(false)
    }

    /// Id recorded in the header, if any.
    pub fn id(&self) -> Option<&str> {
        self.text(KEY_ID).filter(|id| !id.is_empty())
    }
}

/// Locate the closing delimiter, ignoring any inside quoted values.
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_quotes = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quotes => i += 1,
            b'"' => in_quotes = !in_quotes,
            b'-' if !in_quotes && s[i..].starts_with(COMMENT_CLOSE) => return Some(i),
            _ => {}
        }
        i += 1;
    }
    // Unbalanced quotes: take the first delimiter on the line
    s.find(COMMENT_CLOSE)
}

struct FieldScanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> FieldScanner<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_separators(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        self.pos += rest.len() - trimmed.len();
    }

    /// Advance to the next top-level comma (or the end) and return the text skipped.
    fn take_until_comma(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest.find(',').unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn next_field(&mut self) -> Option<(String, FieldValue)> {
        loop {
            self.skip_separators();
            if self.pos >= self.src.len() {
                return None;
            }

            let fragment_start = self.pos;
            let rest = self.rest();
            let colon = rest.find(':');
            let comma = rest.find(',');
            let key_end = match (colon, comma) {
                (Some(c), Some(m)) if c < m => c,
                (Some(c), None) => c,
                // A fragment without a key; skip it
                _ => {
                    self.take_until_comma();
                    continue;
                }
            };

            let key = rest[..key_end].trim().to_string();
            self.pos = fragment_start + key_end + 1;

            let rest = self.rest();
            let value_text = rest.trim_start();
            self.pos += rest.len() - value_text.len();

            let value = if value_text.starts_with('"') {
                self.quoted_value()
            } else {
                FieldValue::Bare(self.take_until_comma().trim().to_string())
            };
            return Some((key, value));
        }
    }

    fn quoted_value(&mut self) -> FieldValue {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut i = 1;
        let mut closed = None;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 1,
                b'"' => {
                    closed = Some(i);
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        let Some(close) = closed else {
            self.pos = self.src.len();
            return FieldValue::Malformed(rest.trim().to_string());
        };

        let literal = &rest[..=close];
        self.pos += close + 1;
        let trailing = self.take_until_comma();
        if !trailing.trim().is_empty() {
            let raw = &rest[..close + 1 + trailing.len()];
            return FieldValue::Malformed(raw.trim().to_string());
        }

        match serde_json::from_str::<String>(literal) {
            Ok(value) => FieldValue::Quoted(value),
            Err(_) => FieldValue::Malformed(literal.to_string()),
        }
    }
}

/// Quote a value for the header.
///
/// JSON escaping keeps it on one line; `>` is escaped as well so the value
/// can never terminate the comment.
pub fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace('>', "\\u003e")
}

/// Builds a header line field by field.
pub struct HeaderWriter {
    out: String,
}

impl HeaderWriter {
    /// Start a header with the two mandatory fields.
    pub fn new(id: &str, timestamp: &str) -> Self {
        Self {
            out: format!(
                "{} {}:{}, {}:{}",
                COMMENT_OPEN, KEY_ID, id, KEY_TIMESTAMP, timestamp
            ),
        }
    }

    pub fn bare(mut self, key: &str, value: &str) -> Self {
        self.out.push_str(&format!(", {}:{}", key, value));
        self
    }

    pub fn quoted(mut self, key: &str, value: &str) -> Self {
        self.out.push_str(&format!(", {}:{}", key, quote(value)));
        self
    }

    pub fn flag(self, key: &str) -> Self {
        self.bare(key, "true")
    }

    pub fn finish(mut self) -> String {
        self.out.push(' ');
        self.out.push_str(COMMENT_CLOSE);
        self.out
    }
}
