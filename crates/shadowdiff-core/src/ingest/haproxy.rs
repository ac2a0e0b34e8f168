use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::data::{Body, Headers, Request, RequestResponsePair, Response};
use crate::error::ShadowdiffError;

/// Everything before the JSON payload on a haproxy log line, e.g.
/// `Feb  1 23:05:17 localhost haproxy[20]: `.
const LINE_PATTERN: &str = r"(?s)^[\w\s:\[\]]+:\s(\{.*\})$";

/// Placeholder bodies haproxy emits for "no body". Stored as-is but not
/// worth a parse-failure log line.
const BODY_PLACEHOLDERS: &[&str] = &["-", "\u{1f}\u{8}"];

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LogLine {
    request: WireRequest,
    response: WireResponse,
}

#[derive(Debug, Deserialize)]
struct WireRequest {
    timestamp: Option<i64>,
    uri: Option<String>,
    method: Option<String>,
    headers: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    timestamp: Option<i64>,
    status_code: Option<u16>,
    headers: Option<String>,
    response_time_ms: Option<f64>,
    body: Option<String>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load one haproxy-jsons log file into an exchange stream.
///
/// Lines that carry no JSON payload, or whose payload fails to parse, are
/// logged at debug and skipped; the loader never aborts the file.
pub(crate) fn load_file(path: &Path) -> Result<Vec<RequestResponsePair>, ShadowdiffError> {
    let extractor = Regex::new(LINE_PATTERN)
        .map_err(|e| ShadowdiffError::InvalidInput(format!("log line pattern: {e}")))?;

    let file = File::open(path)?;
    let mut pairs = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        match parse_line(&extractor, &line, line_no) {
            Ok(Some(pair)) => pairs.push(pair),
            Ok(None) => {}
            Err(e) => {
                debug!(line = line_no, path = %path.display(), error = %e,
                    "log line could not be loaded, skipping");
            }
        }
    }
    info!(count = pairs.len(), path = %path.display(), "loaded logged exchanges");
    Ok(pairs)
}

/// Parse one log line. `Ok(None)` means the line carried no JSON payload.
fn parse_line(
    extractor: &Regex,
    line: &str,
    line_no: usize,
) -> Result<Option<RequestResponsePair>, serde_json::Error> {
    let Some(captures) = extractor.captures(line) else {
        return Ok(None);
    };
    let item: LogLine = serde_json::from_str(&captures[1])?;

    let request = Request {
        timestamp: item.request.timestamp,
        method: item.request.method,
        uri: item.request.uri,
        headers: parse_headers(item.request.headers.as_deref()),
        body: parse_body(item.request.body.as_deref(), line_no, "request"),
    };
    let response = Response {
        timestamp: item.response.timestamp,
        status_code: item.response.status_code.unwrap_or(0),
        headers: parse_headers(item.response.headers.as_deref()),
        body: parse_body(item.response.body.as_deref(), line_no, "response"),
        latency_ms: item.response.response_time_ms.unwrap_or(0.0),
    };

    Ok(Some(RequestResponsePair { request, response }))
}

/// Split a CRLF-joined header blob into `name:value` entries.
///
/// Entries shorter than four characters are dropped. If any entry does not
/// split into exactly one name and one value (a value containing `:`, say),
/// the raw blob is kept verbatim instead.
fn parse_headers(raw: Option<&str>) -> Headers {
    let Some(raw) = raw else {
        return Headers::default();
    };
    let mut map = BTreeMap::new();
    for entry in raw.split("\r\n") {
        if entry.len() <= 3 {
            continue;
        }
        let parts: Vec<&str> = entry.split(':').collect();
        if parts.len() != 2 {
            return Headers::Raw(raw.to_string());
        }
        map.insert(parts[0].to_string(), parts[1].to_string());
    }
    Headers::Map(map)
}

fn parse_body(raw: Option<&str>, line_no: usize, side: &str) -> Body {
    let Some(text) = raw else {
        return Body::Empty;
    };
    let body = Body::from_raw_text(text);
    if body.is_raw() && !BODY_PLACEHOLDERS.contains(&text) {
        debug!(line = line_no, side, "body could not be parsed as JSON");
    }
    body
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const PREFIX: &str = "Feb  1 23:05:17 localhost haproxy[20]: ";

    fn make_line(payload: serde_json::Value) -> String {
        format!("{PREFIX}{payload}")
    }

    fn write_log(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        for line in lines {
            writeln!(file, "{line}").expect("write should succeed");
        }
        file
    }

    fn basic_payload() -> serde_json::Value {
        json!({
            "request": {
                "timestamp": 1643756717,
                "uri": "/_cat/indices",
                "method": "GET",
                "headers": "accept-encoding:gzip\r\nuser-agent:curl/7.61.1",
                "body": ""
            },
            "response": {
                "timestamp": 1643756718,
                "status_code": 200,
                "headers": "content-type:application/json",
                "response_time_ms": 14,
                "body": "{\"tagline\": \"You Know, for Search\"}"
            }
        })
    }

    // -----------------------------------------------------------------------
    // load_file
    // -----------------------------------------------------------------------

    #[test]
    fn loads_a_well_formed_line() {
        let log = write_log(&[make_line(basic_payload())]);
        let pairs = load_file(log.path()).expect("load should succeed");
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        assert_eq!(pair.request.timestamp, Some(1643756717));
        assert_eq!(pair.request.method.as_deref(), Some("GET"));
        assert_eq!(pair.request.uri.as_deref(), Some("/_cat/indices"));
        assert!(pair.request.body.is_empty());

        assert_eq!(pair.response.status_code, 200);
        assert_eq!(pair.response.latency_ms, 14.0);
        assert_eq!(
            pair.response.body,
            Body::Structured(json!({"tagline": "You Know, for Search"}))
        );
    }

    #[test]
    fn lines_without_json_payload_are_skipped() {
        let log = write_log(&[
            "Feb  1 23:05:16 localhost haproxy[20]: Connect from 10.0.0.1".to_string(),
            make_line(basic_payload()),
        ]);
        let pairs = load_file(log.path()).expect("load should succeed");
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn lines_with_malformed_payload_are_skipped_not_fatal() {
        let log = write_log(&[
            format!("{PREFIX}{{\"request\": \"not an object\"}}"),
            make_line(basic_payload()),
        ]);
        let pairs = load_file(log.path()).expect("load should succeed");
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load_file(Path::new("/nonexistent/haproxy.log"));
        assert!(result.is_err());
    }

    #[test]
    fn placeholder_body_is_stored_as_raw() {
        let mut payload = basic_payload();
        payload["response"]["body"] = json!("-");
        let log = write_log(&[make_line(payload)]);
        let pairs = load_file(log.path()).expect("load should succeed");
        assert_eq!(pairs[0].response.body, Body::Raw("-".to_string()));
    }

    // -----------------------------------------------------------------------
    // parse_headers
    // -----------------------------------------------------------------------

    #[test]
    fn header_blob_splits_into_map() {
        let headers = parse_headers(Some("accept:*/*\r\ncontent-length:549"));
        let Headers::Map(map) = headers else {
            panic!("expected a header map");
        };
        assert_eq!(map["accept"], "*/*");
        assert_eq!(map["content-length"], "549");
    }

    #[test]
    fn header_value_with_colon_falls_back_to_raw_blob() {
        let blob = "Host:localhost:9200\r\naccept:*/*";
        assert_eq!(parse_headers(Some(blob)), Headers::Raw(blob.to_string()));
    }

    #[test]
    fn short_header_entries_are_dropped() {
        let headers = parse_headers(Some("a:b\r\naccept:*/*"));
        let Headers::Map(map) = headers else {
            panic!("expected a header map");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(map["accept"], "*/*");
    }

    #[test]
    fn absent_headers_are_an_empty_map() {
        assert_eq!(parse_headers(None), Headers::default());
    }
}
