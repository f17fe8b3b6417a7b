use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default pairs submitted per chunk
pub const DEFAULT_SUBMISSION_BATCH_SIZE: usize = 5000;

/// Default completed results drained per wake-up
pub const DEFAULT_PROCESSING_BATCH_SIZE: usize = 500;

/// Main configuration for a kernel matrix run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSettings,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub cluster: ClusterConfig,
    pub task: TaskConfig,
    pub logging: LoggingConfig,
}

/// What to do when a single pairwise computation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failure
    #[default]
    FailFast,
    /// Record NaN for the failed pair and keep going
    SkipAsNan,
}

/// Chunking and failure handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Upper bound on in-flight computations per chunk
    pub submission_batch_size: usize,

    /// Upper bound on completed-but-unrecorded results per wake-up
    pub processing_batch_size: usize,

    /// Cap on the number of items (bounded debug runs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    pub failure_policy: FailurePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            submission_batch_size: DEFAULT_SUBMISSION_BATCH_SIZE,
            processing_batch_size: DEFAULT_PROCESSING_BATCH_SIZE,
            max_items: None,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl EngineSettings {
    /// Check batch bounds
    pub fn validate(&self) -> Result<()> {
        if self.submission_batch_size == 0 {
            return Err(EngineError::Config(
                "submission_batch_size must be at least 1".into(),
            ));
        }

        if self.processing_batch_size == 0 {
            return Err(EngineError::Config(
                "processing_batch_size must be at least 1".into(),
            ));
        }

        if self.max_items == Some(0) {
            return Err(EngineError::Config("max_items must be at least 1".into()));
        }

        Ok(())
    }
}

/// Where items come from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    pub extension: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("qasm"),
            extension: "qasm".to_string(),
        }
    }
}

/// Where the finished matrix goes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub write_manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("kernel_matrix.json"),
            write_manifest: true,
        }
    }
}

/// Local cluster sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub workers: usize,

    /// Per-task timeout handed to the cluster client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_timeout_ms: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            task_timeout_ms: None,
        }
    }
}

/// External overlap program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    pub command: String,

    /// Argument template; `{a}` and `{b}` are replaced by item identifiers
    pub args: Vec<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            command: "qkernel-overlap".to_string(),
            args: vec!["{a}".to_string(), "{b}".to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_to_file: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_dir: None,
        }
    }
}

impl EngineConfig {
    /// Get default configuration file path: `~/.qkernel/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Cannot determine home directory".into()))?;
        Ok(home.join(".qkernel").join("config.toml"))
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to read config file");
            e
        })?;

        let config: EngineConfig = toml::from_str(&content)?;

        config.validate()?;

        tracing::info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.cluster.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".into()));
        }

        if self.cluster.task_timeout_ms == Some(0) {
            return Err(EngineError::Config(
                "task_timeout_ms must be at least 1".into(),
            ));
        }

        if self.task.command.trim().is_empty() {
            return Err(EngineError::Config("task command must not be empty".into()));
        }

        if self.input.extension.trim_start_matches('.').is_empty() {
            return Err(EngineError::Config("input extension must not be empty".into()));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(EngineError::Config(
                    "log level must be one of: trace, debug, info, warn, error".into(),
                ))
            }
        }

        Ok(())
    }

    /// Save configuration to file (atomic write)
    pub fn save(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    tracing::error!(
                        path = %parent.display(),
                        error = %e,
                        "Failed to create config directory"
                    );
                    e
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &toml_string).map_err(|e| {
            tracing::error!(
                path = %temp_path.display(),
                error = %e,
                "Failed to write temp config file"
            );
            e
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| {
            tracing::error!(
                from = %temp_path.display(),
                to = %path.display(),
                error = %e,
                "Failed to rename temp config file"
            );
            e
        })?;

        tracing::info!(path = %path.display(), "Configuration saved successfully");
        Ok(())
    }
}
