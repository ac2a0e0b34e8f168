use std::io::Write;

use crate::compare::ResponseComparison;
use crate::error::ShadowdiffError;
use crate::report::Report;

// ---------------------------------------------------------------------------
// LatencySamples
// ---------------------------------------------------------------------------

/// Cached output of a performance computation: the filtered latency samples
/// per side, in comparison input order.
///
/// A latency at or below zero means "not recorded" and is dropped here;
/// treating it as a real zero-millisecond observation would corrupt every
/// percentile and average downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySamples {
    pub primary: Vec<f64>,
    pub shadow: Vec<f64>,
}

// ---------------------------------------------------------------------------
// PerformanceReport
// ---------------------------------------------------------------------------

/// Summarizes latency distribution divergence between primary and shadow.
pub struct PerformanceReport<'a> {
    comparisons: &'a [ResponseComparison],
    samples: Option<LatencySamples>,
}

impl<'a> PerformanceReport<'a> {
    pub fn new(comparisons: &'a [ResponseComparison]) -> Self {
        Self {
            comparisons,
            samples: None,
        }
    }

    /// The filtered latency samples, filling the cache on first use.
    pub fn samples(&mut self) -> &LatencySamples {
        let comparisons = self.comparisons;
        self.samples.get_or_insert_with(|| {
            let mut samples = LatencySamples::default();
            for comparison in comparisons {
                if comparison.primary_response.latency_ms > 0.0 {
                    samples.primary.push(comparison.primary_response.latency_ms);
                }
                if comparison.shadow_response.latency_ms > 0.0 {
                    samples.shadow.push(comparison.shadow_response.latency_ms);
                }
            }
            samples
        })
    }
}

impl Report for PerformanceReport<'_> {
    fn compute(&mut self) {
        self.samples();
    }

    fn summary(&mut self) -> String {
        let samples = self.samples();
        format!(
            "\n            ==Stats for primary cluster==\n{}\
             \n            ==Stats for shadow cluster==\n{}",
            side_summary(&samples.primary),
            side_summary(&samples.shadow),
        )
    }

    fn export(&mut self, sink: &mut dyn Write) -> Result<(), ShadowdiffError> {
        let summary = self.summary();
        sink.write_all(summary.as_bytes())?;
        writeln!(sink)?;

        let samples = self.samples();
        writeln!(sink, "All Primary Cluster Latencies: ")?;
        for latency in &samples.primary {
            write!(sink, "{latency} ")?;
        }
        writeln!(sink)?;
        writeln!(sink, "All Shadow Cluster Latencies: ")?;
        for latency in &samples.shadow {
            write!(sink, "{latency} ")?;
        }
        writeln!(sink)?;
        Ok(())
    }
}

/// The four stat lines for one side, or an explicit no-data line when the
/// filtered sample set is empty.
fn side_summary(latencies: &[f64]) -> String {
    let mut sorted = latencies.to_vec();
    sorted.sort_by(f64::total_cmp);

    match (
        percentile(&sorted, 99.0),
        percentile(&sorted, 90.0),
        percentile(&sorted, 50.0),
        average(&sorted),
    ) {
        (Some(p99), Some(p90), Some(p50), Some(avg)) => format!(
            "    99th percentile = {p99:.1}\n    \
             90th percentile = {p90:.1}\n    \
             50th percentile = {p50:.1}\n    \
             Average Latency = {avg:.1}\n",
        ),
        _ => "    no latency samples recorded\n".to_string(),
    }
}

/// Linear-interpolation percentile over an already-sorted sample.
/// Returns `None` for an empty sample instead of a misleading number.
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    let fraction = rank - below as f64;
    Some(sorted[below] + (sorted[above] - sorted[below]) * fraction)
}

fn average(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
