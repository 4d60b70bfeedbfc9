//! Logging Module
//!
//! Structured logging through the `tracing` crate, plus a small logger that
//! reports fold / attempt / epoch progress while the ensemble trains.

use std::time::Instant;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Create a verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, falling back to `Info`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Initialize logging with the given configuration
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Progress logger for one fold's training run
pub struct TrainingLogger {
    fold: usize,
    total_folds: usize,
    attempt: usize,
    epoch: usize,
    max_epochs: usize,
    epoch_start: Instant,
    fold_start: Instant,
}

impl TrainingLogger {
    /// Create a new training logger for a fold
    pub fn new(fold: usize, total_folds: usize, max_epochs: usize) -> Self {
        Self {
            fold,
            total_folds,
            attempt: 0,
            epoch: 0,
            max_epochs,
            epoch_start: Instant::now(),
            fold_start: Instant::now(),
        }
    }

    /// Log the start of a (re)initialised attempt
    pub fn start_attempt(&mut self, attempt: usize) {
        self.attempt = attempt;
        if attempt == 0 {
            tracing::info!("Fold {}/{}: training started", self.fold + 1, self.total_folds);
        } else {
            tracing::info!(
                "Fold {}/{}: restarting from scratch (attempt {})",
                self.fold + 1,
                self.total_folds,
                attempt + 1
            );
        }
    }

    /// Log start of an epoch
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();
        tracing::debug!(
            "Fold {} epoch {}/{} started",
            self.fold + 1,
            epoch + 1,
            self.max_epochs
        );
    }

    /// Log end of an epoch with losses
    pub fn end_epoch(&self, train_loss: f64, val_loss: f64, learning_rate: f64) {
        tracing::info!(
            "Fold {} | Epoch {}/{} in {:.1}s | Train loss: {:.4} | Val loss: {:.4} | LR: {:.6}",
            self.fold + 1,
            self.epoch + 1,
            self.max_epochs,
            self.epoch_start.elapsed().as_secs_f64(),
            train_loss,
            val_loss,
            learning_rate
        );
    }

    /// Log a new best epoch
    pub fn log_new_best(&self, val_loss: f64) {
        tracing::info!(
            "Fold {}: new best validation loss {:.4} at epoch {}",
            self.fold + 1,
            val_loss,
            self.epoch + 1
        );
    }

    /// Log a divergence that triggers a restart
    pub fn log_divergence(&self, val_loss: f64, threshold: f64) {
        tracing::warn!(
            "Fold {}: validation loss {:.4} exceeded {:.2} at epoch {} (attempt {}), restarting",
            self.fold + 1,
            val_loss,
            threshold,
            self.epoch + 1,
            self.attempt + 1
        );
    }

    /// Log early stopping
    pub fn log_early_stop(&self, patience: usize) {
        tracing::info!(
            "Fold {}: early stop at epoch {} after more than {} epochs without improvement",
            self.fold + 1,
            self.epoch + 1,
            patience
        );
    }

    /// Log fold completion
    pub fn log_complete(&self, best_epoch: Option<usize>, best_loss: Option<f64>) {
        tracing::info!(
            "Fold {}/{} complete in {} | best epoch: {} | best val loss: {}",
            self.fold + 1,
            self.total_folds,
            super::format_duration(self.fold_start.elapsed().as_secs_f64()),
            best_epoch.map(|e| (e + 1).to_string()).unwrap_or_else(|| "-".to_string()),
            best_loss.map(|l| format!("{:.4}", l)).unwrap_or_else(|| "-".to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::parse("Warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("unknown"), LogLevel::Info);
    }

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(LogConfig::verbose().level, LogLevel::Debug);
    }

    #[test]
    fn test_training_logger_tracks_attempt_and_epoch() {
        let mut logger = TrainingLogger::new(0, 9, 200);
        logger.start_attempt(2);
        logger.start_epoch(5);
        assert_eq!(logger.attempt, 2);
        assert_eq!(logger.epoch, 5);
    }
}
