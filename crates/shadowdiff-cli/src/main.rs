use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use shadowdiff_core::compare::DEFAULT_IGNORED_BODY_PATHS;
use shadowdiff_core::correlate::correlate;
use shadowdiff_core::ingest::{load_streams, LogFormat};
use shadowdiff_core::report::{ReportGenerator, ReportKind};
use shadowdiff_core::ShadowdiffError;

// ---------------------------------------------------------------------------
// Argument definitions
// ---------------------------------------------------------------------------

/// Compare HTTP traffic captured from a primary and a shadow deployment.
#[derive(Parser)]
#[command(name = "shadowdiff", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load log files, correlate the traffic, and produce reports.
    Run {
        /// Path to the log file from the primary cluster.
        #[arg(long)]
        primary_log_file: PathBuf,

        /// Path to the log file from the shadow cluster. Required by
        /// uncorrelated formats, forbidden by pre-correlated ones.
        #[arg(long)]
        shadow_log_file: Option<PathBuf>,

        /// The wire format of the log files.
        #[arg(long)]
        log_file_format: LogFormat,

        /// Reports to print (in summary form) to stdout. Repeatable.
        #[arg(long = "display-reports")]
        display_reports: Vec<ReportKind>,

        /// Reports to export, as KIND=PATH. PATH may be '-' for stdout.
        /// Repeatable.
        #[arg(long = "export-reports", value_parser = parse_export_spec)]
        export_reports: Vec<ExportSpec>,

        /// Additional body keys to ignore when comparing responses, on top
        /// of the built-in volatile-identity keys. Repeatable.
        #[arg(long = "ignore-body-path")]
        ignore_body_paths: Vec<String>,

        /// Increase log verbosity (-v for info, -vv for debug).
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },
    /// List the available report kinds with their descriptions.
    AvailableReports,
}

#[derive(Debug, Clone)]
struct ExportSpec {
    kind: ReportKind,
    path: PathBuf,
}

fn parse_export_spec(s: &str) -> Result<ExportSpec, String> {
    let (kind, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=PATH, got '{s}'"))?;
    let kind: ReportKind = kind.parse().map_err(|e: ShadowdiffError| e.to_string())?;
    if path.is_empty() {
        return Err(format!("expected KIND=PATH, got '{s}'"));
    }
    Ok(ExportSpec {
        kind,
        path: PathBuf::from(path),
    })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn dispatch(command: Command) -> Result<(), ShadowdiffError> {
    match command {
        Command::Run {
            primary_log_file,
            shadow_log_file,
            log_file_format,
            display_reports,
            export_reports,
            ignore_body_paths,
            verbose,
        } => {
            init_logging(verbose);
            run(
                primary_log_file,
                shadow_log_file,
                log_file_format,
                &display_reports,
                &export_reports,
                ignore_body_paths,
            )
        }
        Command::AvailableReports => {
            for kind in ReportKind::ALL {
                println!("{kind}: {}", kind.description());
            }
            Ok(())
        }
    }
}

/// Log to stderr so stdout stays clean for report summaries.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(
    primary_log_file: PathBuf,
    shadow_log_file: Option<PathBuf>,
    log_file_format: LogFormat,
    display_reports: &[ReportKind],
    export_reports: &[ExportSpec],
    extra_ignore_paths: Vec<String>,
) -> Result<(), ShadowdiffError> {
    let paths = log_file_paths(primary_log_file, shadow_log_file, log_file_format)?;
    let streams = load_streams(log_file_format, &paths)?;

    let mut ignored_body_paths: Vec<String> = DEFAULT_IGNORED_BODY_PATHS
        .iter()
        .map(|p| p.to_string())
        .collect();
    ignored_body_paths.extend(extra_ignore_paths);

    let correlation = correlate(streams, &ignored_body_paths);
    let mut generator = ReportGenerator::new(&correlation.comparisons, &correlation.unmatched);

    for kind in display_reports {
        println!("{kind}:");
        println!("{}", generator.summary(*kind));
        println!();
    }

    for spec in export_reports {
        if spec.path.as_os_str() == "-" {
            let stdout = std::io::stdout();
            let mut sink = stdout.lock();
            generator.export(spec.kind, &mut sink)?;
            sink.flush()?;
        } else {
            let mut sink = File::create(&spec.path)?;
            generator.export(spec.kind, &mut sink)?;
        }
        println!("{} was exported to {}", spec.kind, spec.path.display());
    }

    Ok(())
}

/// The ordered path list the loader expects for the given format.
fn log_file_paths(
    primary: PathBuf,
    shadow: Option<PathBuf>,
    format: LogFormat,
) -> Result<Vec<PathBuf>, ShadowdiffError> {
    if format.is_correlated() {
        if shadow.is_some() {
            return Err(ShadowdiffError::InvalidInput(format!(
                "{format} log files already contain both sides; \
                 --shadow-log-file does not apply"
            )));
        }
        Ok(vec![primary])
    } else {
        let shadow = shadow.ok_or_else(|| {
            ShadowdiffError::InvalidInput(format!("{format} requires --shadow-log-file"))
        })?;
        Ok(vec![primary, shadow])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
