use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::data::{Body, Headers, Request, RequestResponsePair, Response};
use crate::error::ShadowdiffError;

// Replayer triples flatten headers into the same JSON object as these
// special fields, so everything not listed here is a header.
const REQUEST_SPECIAL_FIELDS: &[&str] = &["Request-URI", "Method", "HTTP-Version", "body"];
const RESPONSE_SPECIAL_FIELDS: &[&str] = &[
    "Status-Code",
    "HTTP-Version",
    "Reason-Phrase",
    "response_time_ms",
    "body",
];

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load one replayer-triples log file.
///
/// Each line is a JSON object holding the request and both responses, so a
/// line appends one exchange to each stream at the same index. The streams
/// therefore come out pre-correlated. Malformed lines are logged at debug
/// and skipped.
pub(crate) fn load_file(
    path: &Path,
    primary: &mut Vec<RequestResponsePair>,
    shadow: &mut Vec<RequestResponsePair>,
) -> Result<(), ShadowdiffError> {
    let file = File::open(path)?;
    let mut loaded = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok((primary_pair, shadow_pair)) => {
                primary.push(primary_pair);
                shadow.push(shadow_pair);
                loaded += 1;
            }
            Err(e) => {
                debug!(line = line_no, path = %path.display(), error = %e,
                    "triple line could not be loaded, skipping");
            }
        }
    }
    info!(count = loaded, path = %path.display(), "loaded replayer triples");
    Ok(())
}

fn parse_line(line: &str) -> Result<(RequestResponsePair, RequestResponsePair), ShadowdiffError> {
    let triple: Map<String, Value> = serde_json::from_str(line)?;

    let request = parse_request(object_field(&triple, "request")?);
    let primary_response = parse_response(object_field(&triple, "primaryResponse")?);
    let shadow_response = parse_response(object_field(&triple, "shadowResponse")?);

    let primary_pair = RequestResponsePair {
        request: request.clone(),
        response: primary_response,
    };
    let shadow_pair = RequestResponsePair {
        request,
        response: shadow_response,
    };
    Ok((primary_pair, shadow_pair))
}

fn object_field<'a>(
    triple: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a Map<String, Value>, ShadowdiffError> {
    triple
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| ShadowdiffError::InvalidInput(format!("triple is missing '{name}'")))
}

fn parse_request(fields: &Map<String, Value>) -> Request {
    Request {
        timestamp: None,
        method: string_field(fields, "Method"),
        uri: string_field(fields, "Request-URI"),
        headers: remaining_headers(fields, REQUEST_SPECIAL_FIELDS),
        body: parse_body(fields.get("body")),
    }
}

fn parse_response(fields: &Map<String, Value>) -> Response {
    // Status-Code arrives as a string, e.g. "200".
    let status_code = string_field(fields, "Status-Code")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let latency_ms = fields
        .get("response_time_ms")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Response {
        timestamp: None,
        status_code,
        headers: remaining_headers(fields, RESPONSE_SPECIAL_FIELDS),
        body: parse_body(fields.get("body")),
        latency_ms,
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Everything that is not a special field is a header. Non-string header
/// values are stringified.
fn remaining_headers(fields: &Map<String, Value>, special: &[&str]) -> Headers {
    let mut map = BTreeMap::new();
    for (name, value) in fields {
        if special.contains(&name.as_str()) {
            continue;
        }
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        map.insert(name.clone(), rendered);
    }
    Headers::Map(map)
}

fn parse_body(value: Option<&Value>) -> Body {
    match value {
        None | Some(Value::Null) => Body::Empty,
        Some(Value::String(text)) => Body::from_raw_text(text),
        Some(structured) => Body::Structured(structured.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
