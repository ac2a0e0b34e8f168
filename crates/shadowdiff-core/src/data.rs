use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Maximum number of characters of a non-structured body shown in diff input.
/// Keeps a single unparseable payload from producing an enormous diff.
pub const BODY_PREVIEW_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// Body — closed variant for a response/request payload
// ---------------------------------------------------------------------------

/// The payload of a request or response, resolved once at ingestion.
///
/// Log files carry bodies as raw text; anything that parses as JSON becomes
/// [`Body::Structured`], anything else non-empty stays [`Body::Raw`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// Empty string, absent field, or JSON `null`.
    #[default]
    Empty,
    /// Non-empty text that is not valid JSON.
    Raw(String),
    /// A parsed JSON tree.
    Structured(Value),
}

impl Body {
    /// Classify raw log text into a body variant.
    pub fn from_raw_text(text: &str) -> Body {
        if text.is_empty() {
            return Body::Empty;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Null) => Body::Empty,
            Ok(value) => Body::Structured(value),
            Err(_) => Body::Raw(text.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Body::Raw(_))
    }

    /// Short tag identifying the variant, shown next to truncated bodies
    /// in diff output.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Body::Empty => "(empty)",
            Body::Raw(_) => "(raw)",
            Body::Structured(_) => "(json)",
        }
    }

    /// The string form of the body truncated to [`BODY_PREVIEW_CHARS`]
    /// characters.
    pub fn preview(&self) -> String {
        self.to_string().chars().take(BODY_PREVIEW_CHARS).collect()
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => Ok(()),
            Body::Raw(text) => f.write_str(text),
            Body::Structured(value) => write!(f, "{value}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Response/request headers as observed in the log.
///
/// The haproxy format stores headers as one CRLF-joined blob; when that blob
/// does not split cleanly into `name:value` entries the raw text is kept
/// as-is. Keys are never case-normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum Headers {
    Map(BTreeMap<String, String>),
    Raw(String),
}

impl Default for Headers {
    fn default() -> Self {
        Headers::Map(BTreeMap::new())
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Headers::Map(map) => {
                f.write_str("{")?;
                for (i, (name, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
            Headers::Raw(text) => f.write_str(text),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response records
// ---------------------------------------------------------------------------

/// One observed HTTP request.
///
/// Fields are optional to accommodate whatever the log format actually
/// carries; correlation decides what to do when something it needs is
/// missing.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Epoch seconds; `None` when the log format does not record it.
    pub timestamp: Option<i64>,
    pub method: Option<String>,
    pub uri: Option<String>,
    pub headers: Headers,
    pub body: Body,
}

impl Request {
    /// Whether two requests describe the same logical call.
    /// Timestamps are deliberately excluded — the whole point of
    /// correlation is matching equivalent requests at different times.
    pub fn equivalent_to(&self, other: &Request) -> bool {
        self.method == other.method
            && self.uri == other.uri
            && self.headers == other.headers
            && self.body == other.body
    }
}

/// One observed HTTP response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// Epoch seconds; `None` when the log format does not record it.
    pub timestamp: Option<i64>,
    /// HTTP status code; 0 when unknown.
    pub status_code: u16,
    pub headers: Headers,
    pub body: Body,
    /// Round-trip time in milliseconds. Zero or negative means
    /// "not recorded" and must be excluded from latency statistics.
    pub latency_ms: f64,
}

/// One observed exchange on one side of the deployment pair.
#[derive(Debug, Clone, Default)]
pub struct RequestResponsePair {
    pub request: Request,
    pub response: Response,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
