//! Logging bootstrap.
//!
//! # Responsibility
//! - Start logging once per process from a typed [`LogConfig`]: stderr for
//!   development, rolling files for deployments.
//! - Keep backend log lines on the `event=… module=… status=…` key=value
//!   convention so they stay machine-greppable.
//!
//! # Invariants
//! - The first successful init wins; a later init with a different
//!   configuration is rejected, an identical one is accepted.
//! - Initialization never panics.

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

const LOG_FILE_BASENAME: &str = "atomcas";
const ROTATE_SIZE_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 4;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Everything to stderr, nothing on disk.
    Stderr,
    /// Rolling files under the directory, errors duplicated to stderr.
    /// The directory is created when missing.
    Directory(PathBuf),
}

/// Configuration consumed by [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub target: LogTarget,
}

impl Default for LogConfig {
    /// Stderr logging at `debug` in debug builds, `info` in release builds.
    fn default() -> Self {
        let level = if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        Self {
            level,
            target: LogTarget::Stderr,
        }
    }
}

impl LogConfig {
    /// File logging into `directory` at the build-mode default level.
    pub fn file(directory: impl Into<PathBuf>) -> Self {
        Self {
            target: LogTarget::Directory(directory.into()),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }
}

struct ActiveLogging {
    config: LogConfig,
    _handle: LoggerHandle,
}

static ACTIVE: OnceCell<ActiveLogging> = OnceCell::new();

/// Starts logging once per process.
///
/// # Errors
/// - Returns an error when a file target's directory cannot be created or
///   the logger backend fails to start.
/// - Returns an error when logging is already active with a different
///   configuration.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let active = ACTIVE.get_or_try_init(|| start(config.clone()))?;
    if active.config != *config {
        return Err(format!(
            "logging already active as {:?}; refusing to switch to {:?}",
            active.config, config
        ));
    }
    Ok(())
}

/// Returns the active configuration, `None` before any successful init.
pub fn logging_status() -> Option<LogConfig> {
    ACTIVE.get().map(|active| active.config.clone())
}

fn start(config: LogConfig) -> Result<ActiveLogging, String> {
    let logger = Logger::try_with_str(level_token(config.level))
        .map_err(|err| format!("unusable log level {:?}: {err}", config.level))?;

    let handle = match &config.target {
        LogTarget::Stderr => logger.log_to_stderr().start(),
        LogTarget::Directory(directory) => {
            std::fs::create_dir_all(directory).map_err(|err| {
                format!(
                    "failed to create log directory `{}`: {err}",
                    directory.display()
                )
            })?;
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(directory)
                        .basename(LOG_FILE_BASENAME),
                )
                .rotate(
                    Criterion::Size(ROTATE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
                )
                .duplicate_to_stderr(Duplicate::Error)
                .write_mode(WriteMode::BufferAndFlush)
                .format_for_files(flexi_logger::detailed_format)
                .start()
        }
    }
    .map_err(|err| format!("failed to start logger: {err}"))?;

    info!(
        "event=logging_init module=core status=ok level={} target={} version={}",
        level_token(config.level),
        target_token(&config.target),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogging {
        config,
        _handle: handle,
    })
}

fn level_token(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}

fn target_token(target: &LogTarget) -> String {
    match target {
        LogTarget::Stderr => "stderr".to_string(),
        LogTarget::Directory(directory) => directory.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, LogConfig, LogTarget};
    use log::LevelFilter;

    #[test]
    fn default_config_tracks_build_mode() {
        let config = LogConfig::default();
        assert_eq!(config.target, LogTarget::Stderr);
        if cfg!(debug_assertions) {
            assert_eq!(config.level, LevelFilter::Debug);
        } else {
            assert_eq!(config.level, LevelFilter::Info);
        }
    }

    #[test]
    fn file_config_builder_sets_target_and_level() {
        let config = LogConfig::file("/var/log/atomcas").with_level(LevelFilter::Warn);
        assert_eq!(config.level, LevelFilter::Warn);
        assert_eq!(
            config.target,
            LogTarget::Directory("/var/log/atomcas".into())
        );
    }

    #[test]
    fn first_init_wins_and_conflicts_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let config = LogConfig::file(dir.path()).with_level(LevelFilter::Info);

        init_logging(&config).expect("first init should succeed");
        init_logging(&config).expect("identical config should be accepted");

        let conflicting = config.clone().with_level(LevelFilter::Trace);
        let err = init_logging(&conflicting).expect_err("conflicting level must be rejected");
        assert!(err.contains("refusing to switch"));

        let other_dir = tempfile::tempdir().expect("temp dir should be created");
        let moved = LogConfig::file(other_dir.path()).with_level(LevelFilter::Info);
        let err = init_logging(&moved).expect_err("conflicting target must be rejected");
        assert!(err.contains("refusing to switch"));

        assert_eq!(logging_status(), Some(config));
    }
}
