//! Converter configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::defaults::{
    CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_QUEUE_CAPACITY, DEFAULT_REORDER_WINDOW,
    INPUT_EXTENSION, OUTPUT_EXTENSION, PROGRESS_LOG_INTERVAL,
};
use crate::pipeline::{default_worker_count, OrderingPolicy, PipelineSettings, RowLayout};
use crate::storage::{Dialect, Quoting};

// ============================================================================
// Root Config
// ============================================================================

/// Complete converter configuration.
///
/// Every section has defaults, so an empty file (or no file at all) is a
/// valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub pipeline: PipelineConfig,
    pub ordering: OrderingConfig,
    pub output: OutputConfig,
    pub input: InputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound of each queue
    pub queue_capacity: usize,
    /// Worker threads; 0 picks one less than the available cores
    pub workers: usize,
    /// Sequences between worker progress logs; 0 disables them
    pub progress_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: 0,
            progress_interval: PROGRESS_LOG_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    /// Write rows in input line order instead of arrival order
    pub preserve_order: bool,
    pub reorder_window: usize,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            preserve_order: false,
            reorder_window: DEFAULT_REORDER_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub delimiter: char,
    /// Escape character; empty for none
    pub escape: String,
    /// Double-quote every field instead of escaping
    pub quote_all: bool,
    /// Add a language tag / datatype column after the object
    pub object_annotations: bool,
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            delimiter: '|',
            escape: String::from("\\"),
            quote_all: false,
            object_annotations: false,
            extension: OUTPUT_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub extension: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extension: INPUT_EXTENSION.to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl ConverterConfig {
    /// Load configuration using the standard search order:
    /// 1. `explicit` (from `--config`); any failure here is an error
    /// 2. `$RDF2CSV_CONFIG`
    /// 3. `./rdf2csv.toml`
    /// 4. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", CONFIG_FILE_NAME);
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", CONFIG_FILE_NAME);
                }
            }
        }

        debug!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate TOML text; unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.pipeline.queue_capacity == 0 {
            errors.push("pipeline.queue_capacity must be at least 1".to_string());
        }
        if self.ordering.preserve_order && self.ordering.reorder_window == 0 {
            errors.push(
                "ordering.reorder_window must be at least 1 when preserve_order is set".to_string(),
            );
        }

        let out = &self.output;
        if matches!(out.delimiter, '\n' | '\r' | '"') {
            errors.push(format!(
                "output.delimiter {:?} cannot separate fields",
                out.delimiter
            ));
        }
        let mut escape = out.escape.chars();
        match (escape.next(), escape.next()) {
            (Some(_), Some(_)) => errors.push(format!(
                "output.escape must be a single character, got {:?}",
                out.escape
            )),
            (Some(c), None) if c == out.delimiter => errors.push(format!(
                "output.escape and output.delimiter are both {c:?}"
            )),
            (Some(c), None) if matches!(c, '\n' | '\r') => {
                errors.push(format!("output.escape {c:?} cannot be a line break"))
            }
            _ => {}
        }

        for (key, ext) in [
            ("input.extension", &self.input.extension),
            ("output.extension", &self.output.extension),
        ] {
            if ext.is_empty() {
                errors.push(format!("{key} must not be empty"));
            } else if ext.starts_with('.') {
                errors.push(format!("{key} = {ext:?} must not start with '.'"));
            }
        }
        if !self.input.extension.is_empty() && self.input.extension == self.output.extension {
            errors.push(format!(
                "input.extension and output.extension are both {:?}; outputs would overwrite inputs",
                self.input.extension
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    // ========================================================================
    // Derived Settings
    // ========================================================================

    pub fn dialect(&self) -> Dialect {
        Dialect {
            delimiter: self.output.delimiter,
            escape: self.output.escape.chars().next(),
            quoting: if self.output.quote_all {
                Quoting::All
            } else {
                Quoting::Never
            },
        }
    }

    pub fn worker_count(&self) -> usize {
        match self.pipeline.workers {
            0 => default_worker_count(),
            n => n,
        }
    }

    pub fn ordering_policy(&self) -> OrderingPolicy {
        if self.ordering.preserve_order {
            OrderingPolicy::Sequence {
                window: self.ordering.reorder_window,
            }
        } else {
            OrderingPolicy::Arrival
        }
    }

    /// Settings for one pipeline run, with an optional graph column.
    pub fn pipeline_settings(&self, target_graph: Option<String>) -> PipelineSettings {
        PipelineSettings {
            workers: self.worker_count(),
            queue_capacity: self.pipeline.queue_capacity,
            progress_interval: self.pipeline.progress_interval,
            ordering: self.ordering_policy(),
            dialect: self.dialect(),
            layout: RowLayout {
                object_annotations: self.output.object_annotations,
                target_graph,
            },
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error ({}): {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConverterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dialect(), Dialect::default());
        assert_eq!(config.ordering_policy(), OrderingPolicy::Arrival);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        assert_eq!(
            ConverterConfig::from_toml_str("").unwrap(),
            ConverterConfig::default()
        );
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = ConverterConfig::from_toml_str(
            r#"
[pipeline]
workers = 3

[ordering]
preserve_order = true
reorder_window = 50

[output]
delimiter = ","
escape = ""
quote_all = true
"#,
        )
        .unwrap();

        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.pipeline.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.ordering_policy(), OrderingPolicy::Sequence { window: 50 });
        assert_eq!(
            config.dialect(),
            Dialect {
                delimiter: ',',
                escape: None,
                quoting: Quoting::All
            }
        );
        assert_eq!(config.input.extension, "nt");
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let mut config = ConverterConfig::default();
        config.pipeline.queue_capacity = 0;
        config.ordering.preserve_order = true;
        config.ordering.reorder_window = 0;
        config.output.escape = "|".into();
        config.output.extension = "nt".into();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 4, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("queue_capacity")));
                assert!(errors.iter().any(|e| e.contains("reorder_window")));
                assert!(errors.iter().any(|e| e.contains("output.escape")));
                assert!(errors.iter().any(|e| e.contains("overwrite")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_char_escape_rejected() {
        let mut config = ConverterConfig::default();
        config.output.escape = "\\\\".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_dotted_extension_rejected() {
        let mut config = ConverterConfig::default();
        config.input.extension = ".nt".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[pipeline]\nworkers = \"many\"\n").unwrap();

        let err = ConverterConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(&err, ConfigError::Parse { path: p, .. } if p == &path));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConverterConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_pipeline_settings_carry_layout() {
        let mut config = ConverterConfig::default();
        config.output.object_annotations = true;
        let settings = config.pipeline_settings(Some("http://g".into()));
        assert!(settings.layout.object_annotations);
        assert_eq!(settings.layout.target_graph.as_deref(), Some("http://g"));
        assert_eq!(settings.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }
}
