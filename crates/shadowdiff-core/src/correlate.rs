use tracing::{debug, info};

use crate::compare::ResponseComparison;
use crate::data::RequestResponsePair;
use crate::ingest::LoadedStreams;

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// The paired-up output of correlation, ready for the report engines.
///
/// `comparisons` follows primary input order; diff export preserves that
/// order downstream.
#[derive(Debug, Default)]
pub struct Correlation {
    pub comparisons: Vec<ResponseComparison>,
    /// Primary exchanges with no shadow counterpart.
    pub unmatched: Vec<RequestResponsePair>,
}

/// Pair each primary exchange with its shadow counterpart and build the
/// response comparisons.
///
/// Pre-correlated streams are zipped by index. Uncorrelated streams are
/// matched by scanning the not-yet-claimed shadow exchanges for one whose
/// request is equivalent and whose timestamp is at or after the primary's.
/// This scan is O(n^2) in the worst case but close to O(n) in practice
/// because both sides arrive in roughly the same order.
pub fn correlate(streams: LoadedStreams, ignored_body_paths: &[String]) -> Correlation {
    if streams.correlated {
        return correlate_by_index(streams, ignored_body_paths);
    }

    let mut comparisons = Vec::new();
    let mut unmatched = Vec::new();
    let mut shadow_pool: Vec<Option<RequestResponsePair>> =
        streams.shadow.into_iter().map(Some).collect();

    for primary_pair in streams.primary {
        // A request without a timestamp can never satisfy the ordering
        // constraint, so it goes straight to the unmatched list.
        if primary_pair.request.timestamp.is_none() {
            unmatched.push(primary_pair);
            continue;
        }

        let claimed = shadow_pool.iter().position(|slot| {
            slot.as_ref().is_some_and(|shadow_pair| {
                shadow_pair.request.timestamp.is_some()
                    && shadow_pair.request.timestamp >= primary_pair.request.timestamp
                    && primary_pair.request.equivalent_to(&shadow_pair.request)
            })
        });

        match claimed.and_then(|idx| shadow_pool[idx].take()) {
            Some(shadow_pair) => comparisons.push(ResponseComparison::with_ignored_paths(
                primary_pair.response,
                shadow_pair.response,
                ignored_body_paths,
            )),
            None => {
                debug!(
                    timestamp = primary_pair.request.timestamp,
                    "primary request found no corresponding shadow request"
                );
                unmatched.push(primary_pair);
            }
        }
    }

    let leftover_shadow = shadow_pool.iter().filter(|slot| slot.is_some()).count();
    info!(
        comparisons = comparisons.len(),
        unmatched_primary = unmatched.len(),
        unmatched_shadow = leftover_shadow,
        "correlation finished"
    );

    Correlation {
        comparisons,
        unmatched,
    }
}

/// Zip streams that the loader already paired positionally. A trailing
/// imbalance on either side leaves extra primaries unmatched and extra
/// shadows dropped.
fn correlate_by_index(streams: LoadedStreams, ignored_body_paths: &[String]) -> Correlation {
    let mut comparisons = Vec::new();
    let mut unmatched = Vec::new();
    let mut shadow_iter = streams.shadow.into_iter();

    for primary_pair in streams.primary {
        match shadow_iter.next() {
            Some(shadow_pair) => comparisons.push(ResponseComparison::with_ignored_paths(
                primary_pair.response,
                shadow_pair.response,
                ignored_body_paths,
            )),
            None => unmatched.push(primary_pair),
        }
    }

    info!(
        comparisons = comparisons.len(),
        unmatched_primary = unmatched.len(),
        "pre-correlated streams zipped"
    );

    Correlation {
        comparisons,
        unmatched,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
