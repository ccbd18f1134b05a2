//! File-level driver: maps input paths onto pipeline runs.
//!
//! A single file converts to a sibling with the output extension. A
//! directory converts each regular file carrying the input extension, one
//! run per file, in name order. Subdirectories are not entered.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::acquisition::NTriplesParser;
use crate::config::ConverterConfig;
use crate::pipeline::{
    Diagnostics, OrderingPolicy, PipelineCoordinator, RunSummary, TracingDiagnostics,
};
use crate::types::{SharedBuffer, SinkHandle};

/// Outcome of converting one input file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub summary: RunSummary,
}

pub struct Converter {
    config: ConverterConfig,
    target_graph: Option<String>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            target_graph: None,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    /// Append `graph` as the last column of every row.
    pub fn with_target_graph(mut self, graph: impl Into<String>) -> Self {
        self.target_graph = Some(graph.into());
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Files a run over `path` would convert, in order.
    pub fn input_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("cannot access input {}", path.display()))?;
        if !meta.is_dir() {
            return Ok(vec![path.to_path_buf()]);
        }

        let wanted = self.config.input.extension.as_str();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)
            .with_context(|| format!("cannot list directory {}", path.display()))?
        {
            let entry =
                entry.with_context(|| format!("cannot list directory {}", path.display()))?;
            let candidate = entry.path();
            if candidate.is_file() && candidate.extension().is_some_and(|ext| ext == wanted) {
                files.push(candidate);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Where the rows of `input` are written.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        input.with_extension(&self.config.output.extension)
    }

    /// Convert a file, or every matching file of a directory.
    pub fn convert_path(&self, path: &Path) -> Result<Vec<FileReport>> {
        let files = self.input_files(path)?;
        if files.is_empty() {
            info!(dir = %path.display(), extension = %self.config.input.extension, "No input files found");
        }
        files.iter().map(|file| self.convert_file(file)).collect()
    }

    pub fn convert_file(&self, input: &Path) -> Result<FileReport> {
        let output = self.output_path(input);
        if same_file(input, &output) {
            bail!(
                "refusing to convert {}: output {} is the input file",
                input.display(),
                output.display()
            );
        }
        let file = File::open(input)
            .with_context(|| format!("cannot open input {}", input.display()))?;

        let mut coordinator = PipelineCoordinator::new(
            self.config.pipeline_settings(self.target_graph.clone()),
            NTriplesParser::default,
        )
        .with_diagnostics(Arc::clone(&self.diagnostics))
        .with_label(input.display().to_string());

        let summary = coordinator
            .run(BufReader::new(file), SinkHandle::Path(output.clone()))
            .with_context(|| format!("failed to convert {}", input.display()))?;

        info!(
            lines = summary.lines_read,
            rows = summary.rows_written,
            rejected = summary.lines_rejected + summary.statements_rejected + summary.rows_rejected,
            lines_per_sec = summary.throughput() as u64,
            "Done converting {} to {}",
            input.display(),
            output.display()
        );
        Ok(FileReport {
            input: input.to_path_buf(),
            output,
            summary,
        })
    }

    /// Convert N-Triples text held in memory; rows come back in line order.
    pub fn convert_str(&self, text: &str) -> Result<String> {
        let buffer = SharedBuffer::new();
        self.convert_text(text, SinkHandle::Buffer(buffer.clone()))?;
        Ok(buffer.to_string_lossy())
    }

    /// Like [`convert_str`](Self::convert_str), streaming rows to `out`.
    pub fn convert_str_to(&self, text: &str, out: Box<dyn Write + Send>) -> Result<RunSummary> {
        self.convert_text(text, SinkHandle::Stream(out))
    }

    fn convert_text(&self, text: &str, sink: SinkHandle) -> Result<RunSummary> {
        let mut settings = self.config.pipeline_settings(self.target_graph.clone());
        if !settings.ordering.is_ordered() {
            settings.ordering = OrderingPolicy::Sequence {
                window: self.config.ordering.reorder_window.max(1),
            };
        }

        PipelineCoordinator::new(settings, NTriplesParser::default)
            .with_diagnostics(Arc::clone(&self.diagnostics))
            .with_label("<string>")
            .run(text.as_bytes(), sink)
            .context("failed to convert string input")
    }
}

/// Both paths exist and resolve to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_swaps_extension() {
        let converter = Converter::new(ConverterConfig::default());
        assert_eq!(
            converter.output_path(Path::new("/data/foaf.nt")),
            PathBuf::from("/data/foaf.csv")
        );
        assert_eq!(
            converter.output_path(Path::new("dump.2012.nt")),
            PathBuf::from("dump.2012.csv")
        );
    }

    #[test]
    fn test_single_file_is_its_own_input_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "").unwrap();

        let converter = Converter::new(ConverterConfig::default());
        assert_eq!(converter.input_files(&path).unwrap(), vec![path]);
    }

    #[test]
    fn test_directory_listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.nt", "a.nt", "notes.txt", "c.nt.bak"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.nt")).unwrap();

        let converter = Converter::new(ConverterConfig::default());
        let files = converter.input_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.nt", "b.nt"]);
    }

    #[test]
    fn test_same_file_resolves_relative_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert!(same_file(&path, &dir.path().join("sub/../data.csv")));
        assert!(!same_file(&path, &dir.path().join("other.csv")));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let converter = Converter::new(ConverterConfig::default());
        let err = converter
            .convert_path(Path::new("/definitely/not/here.nt"))
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.nt"));
    }
}
