use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::compare::ResponseComparison;
use crate::data::{Body, RequestResponsePair, Response};
use crate::error::ShadowdiffError;
use crate::report::{diff, Report};

// ---------------------------------------------------------------------------
// CorrectnessStats
// ---------------------------------------------------------------------------

/// Cached output of a correctness computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectnessStats {
    pub total_comparisons: usize,
    pub number_identical: usize,
    /// Status-code matches are tracked on their own axis: a response can
    /// match on status and still differ in body, or vice versa.
    pub statuses_identical: usize,
    /// Fraction in [0, 1]; 0 when there were no comparisons.
    pub percent_matching: f64,
    /// Fraction in [0, 1]; 0 when there were no comparisons.
    pub percent_statuses_matching: f64,
    pub number_skipped: usize,
}

// ---------------------------------------------------------------------------
// CorrectnessReport
// ---------------------------------------------------------------------------

/// Quantifies how often primary and shadow responded identically, and
/// materializes a line diff for every pair that did not match.
pub struct CorrectnessReport<'a> {
    comparisons: &'a [ResponseComparison],
    unmatched: &'a [RequestResponsePair],
    stats: Option<CorrectnessStats>,
}

impl<'a> CorrectnessReport<'a> {
    pub fn new(
        comparisons: &'a [ResponseComparison],
        unmatched: &'a [RequestResponsePair],
    ) -> Self {
        Self {
            comparisons,
            unmatched,
            stats: None,
        }
    }

    /// The computed statistics, filling the cache on first use.
    pub fn stats(&mut self) -> &CorrectnessStats {
        let comparisons = self.comparisons;
        let unmatched = self.unmatched;
        self.stats
            .get_or_insert_with(|| compute_stats(comparisons, unmatched))
    }
}

fn compute_stats(
    comparisons: &[ResponseComparison],
    unmatched: &[RequestResponsePair],
) -> CorrectnessStats {
    let total_comparisons = comparisons.len();
    let number_identical = comparisons.iter().filter(|c| c.is_identical()).count();
    let statuses_identical = comparisons
        .iter()
        .filter(|c| c.primary_response.status_code == c.shadow_response.status_code)
        .count();

    // An empty input is a defined outcome (0%), not a division error.
    let (percent_matching, percent_statuses_matching) = if total_comparisons > 0 {
        (
            number_identical as f64 / total_comparisons as f64,
            statuses_identical as f64 / total_comparisons as f64,
        )
    } else {
        (0.0, 0.0)
    };

    CorrectnessStats {
        total_comparisons,
        number_identical,
        statuses_identical,
        percent_matching,
        percent_statuses_matching,
        number_skipped: unmatched.len(),
    }
}

impl Report for CorrectnessReport<'_> {
    fn compute(&mut self) {
        self.stats();
    }

    fn summary(&mut self) -> String {
        let stats = self.stats();
        format!(
            "\n    {total} responses were compared.\n    \
             {identical} were identical, for a match rate of {matching:.2}%\n    \
             The status codes matched in {statuses:.2}% of responses.\n    \
             {skipped} requests from the primary cluster were not matched \
             with a request from the shadow cluster.\n",
            total = stats.total_comparisons,
            identical = stats.number_identical,
            matching = stats.percent_matching * 100.0,
            statuses = stats.percent_statuses_matching * 100.0,
            skipped = stats.number_skipped,
        )
    }

    fn export(&mut self, sink: &mut dyn Write) -> Result<(), ShadowdiffError> {
        let summary = self.summary();
        sink.write_all(summary.as_bytes())?;
        writeln!(sink)?;

        for comparison in self.comparisons {
            // Identical pairs have nothing to show; an empty body on either
            // side means there is nothing to diff.
            if comparison.is_identical()
                || comparison.primary_response.body.is_empty()
                || comparison.shadow_response.body.is_empty()
            {
                continue;
            }

            let single_line = comparison.primary_response.body.is_raw()
                || comparison.shadow_response.body.is_raw();
            let primary_lines = match render_side(&comparison.primary_response, single_line) {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(error = %e, "primary body failed to serialize, skipping comparison");
                    continue;
                }
            };
            let shadow_lines = match render_side(&comparison.shadow_response, single_line) {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(error = %e, "shadow body failed to serialize, skipping comparison");
                    continue;
                }
            };

            writeln!(sink, "{}", "=".repeat(40))?;
            writeln!(sink, "{}", diff::diff_lines(&primary_lines, &shadow_lines).join("\n"))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Diff input rendering
// ---------------------------------------------------------------------------

/// One response rendered as diff input lines: status, headers, body.
///
/// When either side of the pair is a raw (non-JSON) body, both sides render
/// the body as a single truncated line so one unstructured payload cannot
/// blow up the diff. Otherwise the structured body is pretty-printed with
/// sorted keys, one diff input line per text line, so key order can never
/// produce spurious diff noise.
fn render_side(response: &Response, single_line: bool) -> Result<Vec<String>, serde_json::Error> {
    let mut lines = vec![
        format!("Status code: {}", response.status_code),
        format!("Headers: {}", response.headers),
    ];
    if single_line {
        lines.push(format!(
            "Body:{} {}",
            response.body.type_tag(),
            response.body.preview()
        ));
    } else if let Body::Structured(value) = &response.body {
        lines.push("Body:".to_string());
        lines.extend(sorted_pretty_json(value)?.lines().map(str::to_string));
    }
    Ok(lines)
}

/// Pretty-print with four-space indent. Keys come out sorted because the
/// underlying map is ordered.
fn sorted_pretty_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Headers;
    use serde_json::json;

    fn make_response(status_code: u16, body: Body) -> Response {
        Response {
            status_code,
            body,
            ..Response::default()
        }
    }

    fn identical_comparison() -> ResponseComparison {
        let body = Body::Structured(json!({"ok": true}));
        ResponseComparison::new(make_response(200, body.clone()), make_response(200, body))
    }

    fn mismatched_comparison() -> ResponseComparison {
        ResponseComparison::new(
            make_response(200, Body::Structured(json!({"count": 1}))),
            make_response(500, Body::Structured(json!({"count": 2}))),
        )
    }

    fn export_to_string(report: &mut CorrectnessReport<'_>) -> String {
        let mut sink = Vec::new();
        report.export(&mut sink).expect("export should succeed");
        String::from_utf8(sink).expect("export should be UTF-8")
    }

    // -----------------------------------------------------------------------
    // compute
    // -----------------------------------------------------------------------

    #[test]
    fn stats_count_identical_and_status_matches_separately() {
        // One fully identical pair, one pair matching on status only.
        let comparisons = vec![
            identical_comparison(),
            ResponseComparison::new(
                make_response(200, Body::Structured(json!({"a": 1}))),
                make_response(200, Body::Structured(json!({"a": 2}))),
            ),
        ];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let stats = report.stats();
        assert_eq!(stats.total_comparisons, 2);
        assert_eq!(stats.number_identical, 1);
        assert_eq!(stats.statuses_identical, 2);
        assert!((stats.percent_matching - 0.5).abs() < f64::EPSILON);
        assert!((stats.percent_statuses_matching - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percent_matching_is_exact_and_bounded() {
        let comparisons = vec![
            identical_comparison(),
            identical_comparison(),
            mismatched_comparison(),
        ];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let stats = report.stats();
        assert_eq!(
            stats.percent_matching,
            stats.number_identical as f64 / stats.total_comparisons as f64
        );
        assert!(stats.percent_matching >= 0.0 && stats.percent_matching <= 1.0);
    }

    #[test]
    fn empty_input_yields_zero_percentages_without_error() {
        let comparisons = Vec::new();
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let stats = report.stats();
        assert_eq!(stats.total_comparisons, 0);
        assert_eq!(stats.percent_matching, 0.0);
        assert_eq!(stats.percent_statuses_matching, 0.0);
    }

    #[test]
    fn unmatched_requests_are_counted_as_skipped() {
        let comparisons = Vec::new();
        let unmatched = vec![RequestResponsePair::default(), RequestResponsePair::default()];
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        assert_eq!(report.stats().number_skipped, 2);
    }

    #[test]
    fn two_identical_comparisons_end_to_end() {
        let comparisons = vec![identical_comparison(), identical_comparison()];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let stats = report.stats();
        assert_eq!(stats.total_comparisons, 2);
        assert_eq!(stats.number_identical, 2);
        assert_eq!(stats.percent_matching, 1.0);
        assert_eq!(stats.number_skipped, 0);
    }

    // -----------------------------------------------------------------------
    // idempotence
    // -----------------------------------------------------------------------

    #[test]
    fn compute_twice_yields_identical_stats() {
        let comparisons = vec![identical_comparison(), mismatched_comparison()];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        report.compute();
        let first = report.stats().clone();
        report.compute();
        assert_eq!(*report.stats(), first);
    }

    #[test]
    fn summary_is_identical_before_and_after_explicit_compute() {
        let comparisons = vec![identical_comparison()];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let lazy = report.summary();
        report.compute();
        assert_eq!(report.summary(), lazy);
    }

    // -----------------------------------------------------------------------
    // summary
    // -----------------------------------------------------------------------

    #[test]
    fn summary_reports_all_counts() {
        let comparisons = vec![identical_comparison(), mismatched_comparison()];
        let unmatched = vec![RequestResponsePair::default()];
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let summary = report.summary();
        assert!(summary.contains("2 responses were compared."));
        assert!(summary.contains("1 were identical, for a match rate of 50.00%"));
        assert!(summary.contains("The status codes matched in 50.00% of responses."));
        assert!(summary.contains("1 requests from the primary cluster were not matched"));
    }

    // -----------------------------------------------------------------------
    // export
    // -----------------------------------------------------------------------

    #[test]
    fn export_starts_with_the_summary() {
        let comparisons = vec![mismatched_comparison()];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let summary = report.summary();
        let text = export_to_string(&mut report);
        assert!(text.starts_with(&summary));
    }

    #[test]
    fn identical_comparisons_contribute_no_diff() {
        let comparisons = vec![identical_comparison()];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let text = export_to_string(&mut report);
        assert!(!text.contains("========"));
        assert!(!text.contains("- Status code"));
    }

    #[test]
    fn empty_body_on_either_side_contributes_no_diff() {
        // Not identical (statuses differ) but one body is empty.
        let comparisons = vec![ResponseComparison::new(
            make_response(200, Body::Empty),
            make_response(500, Body::Structured(json!({"error": "boom"}))),
        )];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let text = export_to_string(&mut report);
        assert!(!text.contains("========"));
    }

    #[test]
    fn mismatched_pair_renders_separator_and_diff() {
        let comparisons = vec![mismatched_comparison()];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let text = export_to_string(&mut report);
        assert!(text.contains(&"=".repeat(40)));
        assert!(text.contains("- Status code: 200"));
        assert!(text.contains("+ Status code: 500"));
        // Structured bodies are rendered line-by-line under a bare marker.
        assert!(text.contains("  Body:\n"));
        assert!(text.contains("\"count\": 1"));
        assert!(text.contains("\"count\": 2"));
    }

    #[test]
    fn structured_body_lines_use_sorted_keys_and_four_space_indent() {
        let comparisons = vec![ResponseComparison::new(
            make_response(200, Body::Structured(json!({"zeta": 1, "alpha": 1}))),
            make_response(200, Body::Structured(json!({"zeta": 2, "alpha": 1}))),
        )];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let text = export_to_string(&mut report);
        let alpha_pos = text.find("\"alpha\"").expect("alpha should be rendered");
        let zeta_pos = text.find("\"zeta\"").expect("zeta should be rendered");
        assert!(alpha_pos < zeta_pos);
        assert!(text.contains("    \"alpha\": 1"));
    }

    #[test]
    fn raw_body_renders_as_single_truncated_line_on_both_sides() {
        let long_raw = "x".repeat(200);
        let comparisons = vec![ResponseComparison::new(
            make_response(200, Body::Raw(long_raw)),
            make_response(200, Body::Structured(json!({"parsed": true}))),
        )];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let text = export_to_string(&mut report);
        let raw_line = text
            .lines()
            .find(|l| l.contains("Body:(raw)"))
            .expect("raw body line should be rendered");
        // "Body:(raw) " plus exactly 80 characters of payload.
        let payload = raw_line
            .split("Body:(raw) ")
            .nth(1)
            .expect("payload should follow the tag");
        assert_eq!(payload.chars().count(), 80);
        // The structured side is also collapsed to one line.
        assert!(text.contains("Body:(json)"));
        assert!(!text.contains("\"parsed\": true"));
    }

    #[test]
    fn headers_line_is_rendered_for_both_sides() {
        let mut primary = make_response(200, Body::Structured(json!({"a": 1})));
        primary.headers = Headers::Raw("content-type:text/plain".to_string());
        let shadow = make_response(200, Body::Structured(json!({"a": 2})));
        let comparisons = vec![ResponseComparison::new(primary, shadow)];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let text = export_to_string(&mut report);
        assert!(text.contains("- Headers: content-type:text/plain"));
        assert!(text.contains("+ Headers: {}"));
    }

    #[test]
    fn export_order_follows_input_order() {
        let comparisons = vec![
            ResponseComparison::new(
                make_response(200, Body::Structured(json!({"first": 1}))),
                make_response(200, Body::Structured(json!({"first": 2}))),
            ),
            ResponseComparison::new(
                make_response(200, Body::Structured(json!({"second": 1}))),
                make_response(200, Body::Structured(json!({"second": 2}))),
            ),
        ];
        let unmatched = Vec::new();
        let mut report = CorrectnessReport::new(&comparisons, &unmatched);
        let text = export_to_string(&mut report);
        let first = text.find("\"first\"").expect("first diff should render");
        let second = text.find("\"second\"").expect("second diff should render");
        assert!(first < second);
    }
}
