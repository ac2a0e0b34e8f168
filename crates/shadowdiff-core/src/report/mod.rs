mod correctness;
mod diff;
mod performance;

pub use correctness::{CorrectnessReport, CorrectnessStats};
pub use performance::{LatencySamples, PerformanceReport};

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::compare::ResponseComparison;
use crate::data::RequestResponsePair;
use crate::error::ShadowdiffError;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// The shared capability set of all report types.
///
/// Reports are lazy: the first call to any of these methods computes and
/// caches the underlying statistics, and later calls reuse the cache.
/// Summary and export output therefore always reflect a fully computed
/// state.
pub trait Report {
    /// Compute and cache the report's statistics. Idempotent.
    fn compute(&mut self);

    /// Render the fixed-format summary block, computing first if needed.
    fn summary(&mut self) -> String;

    /// Write the summary followed by the report's detail section to `sink`,
    /// computing first if needed. Sink write failures are fatal and
    /// propagate to the caller.
    fn export(&mut self, sink: &mut dyn Write) -> Result<(), ShadowdiffError>;
}

// ---------------------------------------------------------------------------
// ReportKind
// ---------------------------------------------------------------------------

/// The reports this tool can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Correctness,
    Performance,
}

impl ReportKind {
    pub const ALL: &'static [ReportKind] = &[ReportKind::Correctness, ReportKind::Performance];

    /// One-line description shown by `available-reports`.
    pub fn description(&self) -> &'static str {
        match self {
            ReportKind::Correctness => {
                "Counts and ratio of identical responses, with a line diff \
                 for every response pair that does not match."
            }
            ReportKind::Performance => {
                "Latency percentiles (p99/p90/p50) and averages per cluster, \
                 with a raw latency dump in the exported file."
            }
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportKind::Correctness => "correctness",
            ReportKind::Performance => "performance",
        };
        f.write_str(name)
    }
}

impl FromStr for ReportKind {
    type Err = ShadowdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correctness" => Ok(ReportKind::Correctness),
            "performance" => Ok(ReportKind::Performance),
            other => Err(ShadowdiffError::UnknownReport(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ReportGenerator
// ---------------------------------------------------------------------------

/// Holds one instance of every report over the same borrowed input and
/// dispatches by kind, so a summary printed before an export reuses the
/// already-computed statistics.
pub struct ReportGenerator<'a> {
    correctness: CorrectnessReport<'a>,
    performance: PerformanceReport<'a>,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(
        comparisons: &'a [ResponseComparison],
        unmatched: &'a [RequestResponsePair],
    ) -> Self {
        Self {
            correctness: CorrectnessReport::new(comparisons, unmatched),
            performance: PerformanceReport::new(comparisons),
        }
    }

    pub fn summary(&mut self, kind: ReportKind) -> String {
        self.report_mut(kind).summary()
    }

    pub fn export(
        &mut self,
        kind: ReportKind,
        sink: &mut dyn Write,
    ) -> Result<(), ShadowdiffError> {
        self.report_mut(kind).export(sink)
    }

    fn report_mut(&mut self, kind: ReportKind) -> &mut dyn Report {
        match kind {
            ReportKind::Correctness => &mut self.correctness,
            ReportKind::Performance => &mut self.performance,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
