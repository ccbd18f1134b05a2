//! rdf2csv command-line entry point.
//!
//! Usage:
//!   rdf2csv data/foaf.nt http://example.org/foaf
//!   rdf2csv data/dumps/                 # every *.nt in the directory
//!   rdf2csv -t                          # convert the built-in sample

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use rdf2csv::config::defaults::{SELF_TEST_GRAPH, SELF_TEST_SAMPLE};
use rdf2csv::{Converter, ConverterConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

/// Takes either a single RDF file in N-Triples format or a directory of
/// N-Triples files, plus an optional target graph IRI, and writes
/// Postgres-loadable delimited file(s) next to the input.
#[derive(Parser, Debug)]
#[command(name = "rdf2csv")]
#[command(version)]
#[command(after_help = "EXAMPLE: rdf2csv test/mhausenblas-foaf.nt http://example.org/mhausenblas")]
struct CliArgs {
    /// N-Triples file, or a directory whose *.nt files are all converted
    #[arg(required_unless_present = "self_test")]
    input: Option<PathBuf>,

    /// Graph IRI appended to every row (all files of a directory share it)
    target_graph: Option<String>,

    /// Convert a built-in two-line sample and print the result
    #[arg(short = 't', long)]
    self_test: bool,

    /// Config file (default: $RDF2CSV_CONFIG, then ./rdf2csv.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Parse workers (default: one less than the number of cores)
    #[arg(long, env = "RDF2CSV_WORKERS")]
    workers: Option<usize>,

    /// Bound of the line and row queues
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    queue_capacity: Option<u64>,

    /// Write rows in input line order
    #[arg(long)]
    preserve_order: bool,

    /// Add the literal's language tag or datatype as a column
    #[arg(long)]
    object_annotations: bool,
}

impl CliArgs {
    /// Flags win over the config file.
    fn apply(&self, config: &mut ConverterConfig) {
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.pipeline.queue_capacity = usize::try_from(capacity).unwrap_or(usize::MAX);
        }
        if self.preserve_order {
            config.ordering.preserve_order = true;
        }
        if self.object_annotations {
            config.output.object_annotations = true;
        }
    }

    /// With `-t` the only positional is the graph, which clap puts in `input`.
    fn self_test_graph(&self) -> String {
        self.target_graph
            .clone()
            .or_else(|| {
                self.input
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| SELF_TEST_GRAPH.to_string())
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries self-test output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let mut config = ConverterConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    debug!(?config, "Effective configuration");

    if args.self_test {
        let converter = Converter::new(config).with_target_graph(args.self_test_graph());
        converter.convert_str_to(SELF_TEST_SAMPLE, Box::new(std::io::stdout()))?;
        return Ok(());
    }

    let Some(input) = args.input.as_deref() else {
        anyhow::bail!("no input given");
    };
    let mut converter = Converter::new(config);
    if let Some(graph) = &args.target_graph {
        converter = converter.with_target_graph(graph.clone());
    }

    let reports = converter.convert_path(input)?;
    let rows: u64 = reports.iter().map(|r| r.summary.rows_written).sum();
    info!(files = reports.len(), rows, "Conversion finished");
    Ok(())
}
