use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::error::{EditorError, EditorResult};

/// Logging configuration for the editor
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
            max_log_files: 10,
        }
    }
}

/// Keeps the non-blocking file writer flushing until dropped
#[derive(Default)]
pub struct LoggingGuard {
    #[cfg(feature = "advanced_logging")]
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("relation_editor={},{}", config.level, config.level))
    })
}

/// Install the global subscriber. Console output goes to stderr so stdout
/// stays free for the interactive session.
pub fn init_logging(config: &LoggingConfig) -> EditorResult<LoggingGuard> {
    let guard = if config.enable_file_logging {
        init_with_file(config)?
    } else {
        init_console(config)?
    };
    info!(level = %config.level, "Logging initialized");
    Ok(guard)
}

fn console_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .boxed()
}

fn already_initialized(e: impl std::fmt::Display) -> EditorError {
    EditorError::configuration(format!("logging already initialized: {}", e))
}

fn init_console(config: &LoggingConfig) -> EditorResult<LoggingGuard> {
    Registry::default()
        .with(console_layer())
        .with(env_filter(config))
        .try_init()
        .map_err(already_initialized)?;
    Ok(LoggingGuard::default())
}

#[cfg(feature = "advanced_logging")]
fn init_with_file(config: &LoggingConfig) -> EditorResult<LoggingGuard> {
    use tracing_appender::{non_blocking, rolling};

    fs::create_dir_all(&config.log_dir)
        .map_err(|e| EditorError::file_io(config.log_dir.to_string_lossy(), e))?;

    let file_appender = rolling::daily(&config.log_dir, "relation-editor.log");
    let (file_writer, guard) = non_blocking(file_appender);
    let file_layer = if config.enable_json_format {
        fmt::layer().json().with_writer(file_writer).boxed()
    } else {
        fmt::layer().with_writer(file_writer).with_ansi(false).boxed()
    };

    Registry::default()
        .with(vec![console_layer(), file_layer])
        .with(env_filter(config))
        .try_init()
        .map_err(already_initialized)?;

    info!(dir = %config.log_dir.display(), "File logging enabled");
    Ok(LoggingGuard { _file: Some(guard) })
}

#[cfg(not(feature = "advanced_logging"))]
fn init_with_file(config: &LoggingConfig) -> EditorResult<LoggingGuard> {
    let guard = init_console(config)?;
    warn!("File logging requested but the advanced_logging feature is disabled");
    Ok(guard)
}

pub fn log_system_info() {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "relation-editor starting"
    );
    if let Ok(cwd) = std::env::current_dir() {
        debug!("Working directory: {}", cwd.display());
    }
}

/// Logs how long an operation took when dropped
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        debug!("Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn checkpoint(&self, checkpoint: &str) {
        debug!(
            "{} - {}: {}ms",
            self.operation,
            checkpoint,
            self.start.elapsed().as_millis()
        );
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        debug!(
            "Completed {}: {}ms",
            self.operation,
            self.start.elapsed().as_millis()
        );
    }
}

/// Remove the oldest `.log` files beyond `max_log_files`.
pub fn cleanup_old_logs(config: &LoggingConfig) -> EditorResult<usize> {
    if !config.enable_file_logging || !config.log_dir.exists() {
        return Ok(0);
    }

    let dir = config.log_dir.to_string_lossy().to_string();
    let mut log_files = Vec::new();
    for entry in fs::read_dir(&config.log_dir).map_err(|e| EditorError::file_io(dir.clone(), e))? {
        let path = entry.map_err(|e| EditorError::file_io(dir.clone(), e))?.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.contains(".log"))
            .unwrap_or(false);
        if is_log {
            if let Ok(metadata) = fs::metadata(&path) {
                let modified = metadata
                    .modified()
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(config.max_log_files) {
        match fs::remove_file(path) {
            Ok(()) => {
                removed += 1;
                info!("Removed old log file: {}", path.display());
            }
            Err(e) => warn!("Failed to remove old log file {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}

/// Log an `EditorError` at an action boundary
#[macro_export]
macro_rules! log_error {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            recoverable = $error.is_recoverable(),
            "Editor action failed"
        );
    };
}
