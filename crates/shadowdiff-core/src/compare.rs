use serde_json::Value;
use tracing::debug;

use crate::data::{Body, Response};

/// Body keys that are volatile deployment-identity fields and must not count
/// against response equality (node names, cluster ids, and so on).
/// Customizable per run via [`ResponseComparison::with_ignored_paths`].
pub const DEFAULT_IGNORED_BODY_PATHS: &[&str] = &["cluster_name", "cluster_uuid", "name"];

// ---------------------------------------------------------------------------
// ResponseComparison
// ---------------------------------------------------------------------------

/// A correlated primary/shadow response pair with its identity verdict.
///
/// The verdict is computed once at construction; reports treat it as an
/// opaque predicate and never re-derive identity themselves.
#[derive(Debug, Clone)]
pub struct ResponseComparison {
    pub primary_response: Response,
    pub shadow_response: Response,
    identical: bool,
}

impl ResponseComparison {
    /// Compare with the default ignored-path list.
    pub fn new(primary_response: Response, shadow_response: Response) -> Self {
        let default_paths: Vec<String> = DEFAULT_IGNORED_BODY_PATHS
            .iter()
            .map(|p| p.to_string())
            .collect();
        Self::with_ignored_paths(primary_response, shadow_response, &default_paths)
    }

    /// Compare, pruning the given keys from structured bodies (at any
    /// nesting depth) before testing body equality.
    pub fn with_ignored_paths(
        primary_response: Response,
        shadow_response: Response,
        ignored_body_paths: &[String],
    ) -> Self {
        let statuses_equal = primary_response.status_code == shadow_response.status_code;
        let headers_equal = primary_response.headers == shadow_response.headers;
        let bodies_equal = pruned_body(&primary_response.body, ignored_body_paths)
            == pruned_body(&shadow_response.body, ignored_body_paths);

        let identical = statuses_equal && headers_equal && bodies_equal;
        if !identical {
            debug!(
                statuses_equal,
                headers_equal, bodies_equal, "responses differ"
            );
        }

        Self {
            primary_response,
            shadow_response,
            identical,
        }
    }

    /// Whether status code, headers, and (pruned) bodies all match.
    pub fn is_identical(&self) -> bool {
        self.identical
    }
}

/// The body with ignored keys removed, when it is structured.
/// Raw and empty bodies pass through unchanged.
fn pruned_body(body: &Body, ignored: &[String]) -> Body {
    match body {
        Body::Structured(value) => Body::Structured(prune_keys(value, ignored)),
        other => other.clone(),
    }
}

fn prune_keys(value: &Value, ignored: &[String]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !ignored.iter().any(|i| i == *key))
                .map(|(key, child)| (key.clone(), prune_keys(child, ignored)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| prune_keys(item, ignored)).collect())
        }
        scalar => scalar.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
