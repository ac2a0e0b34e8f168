mod haproxy;
mod triples;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::info;

use crate::data::RequestResponsePair;
use crate::error::ShadowdiffError;

// ---------------------------------------------------------------------------
// LogFormat
// ---------------------------------------------------------------------------

/// The wire format of the captured log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One decorated haproxy log line per exchange, one file per side.
    /// Requires correlation.
    HaproxyJsons,
    /// One JSON triple (request, primary response, shadow response) per
    /// line. Already correlated at the source.
    ReplayerTriples,
}

impl LogFormat {
    /// Whether the loaded streams are already paired by index, making the
    /// correlation scan unnecessary.
    pub fn is_correlated(&self) -> bool {
        matches!(self, LogFormat::ReplayerTriples)
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::HaproxyJsons => "haproxy-jsons",
            LogFormat::ReplayerTriples => "replayer-triples",
        };
        f.write_str(name)
    }
}

impl FromStr for LogFormat {
    type Err = ShadowdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "haproxy-jsons" => Ok(LogFormat::HaproxyJsons),
            "replayer-triples" => Ok(LogFormat::ReplayerTriples),
            other => Err(ShadowdiffError::UnknownLogFormat(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadedStreams
// ---------------------------------------------------------------------------

/// The two ordered exchange streams produced by ingestion.
///
/// When `correlated` is true, `primary[i]` pairs with `shadow[i]` and the
/// correlation scan is skipped.
#[derive(Debug, Default)]
pub struct LoadedStreams {
    pub primary: Vec<RequestResponsePair>,
    pub shadow: Vec<RequestResponsePair>,
    pub correlated: bool,
}

/// Load the given log files in the given format.
///
/// `haproxy-jsons` expects exactly two files: the primary log then the
/// shadow log. `replayer-triples` accepts one or more files, each line of
/// which contributes to both streams.
pub fn load_streams(format: LogFormat, paths: &[PathBuf]) -> Result<LoadedStreams, ShadowdiffError> {
    let streams = match format {
        LogFormat::HaproxyJsons => {
            let [primary_path, shadow_path] = paths else {
                return Err(ShadowdiffError::InvalidInput(format!(
                    "haproxy-jsons requires a primary and a shadow log file, got {} path(s)",
                    paths.len()
                )));
            };
            LoadedStreams {
                primary: haproxy::load_file(primary_path)?,
                shadow: haproxy::load_file(shadow_path)?,
                correlated: false,
            }
        }
        LogFormat::ReplayerTriples => {
            if paths.is_empty() {
                return Err(ShadowdiffError::InvalidInput(
                    "replayer-triples requires at least one log file".to_string(),
                ));
            }
            let mut streams = LoadedStreams {
                correlated: true,
                ..LoadedStreams::default()
            };
            for path in paths {
                triples::load_file(path, &mut streams.primary, &mut streams.shadow)?;
            }
            streams
        }
    };

    info!(
        primary = streams.primary.len(),
        shadow = streams.shadow.len(),
        correlated = streams.correlated,
        "log streams loaded"
    );
    Ok(streams)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
