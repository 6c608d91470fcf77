//! CLI command implementations for DeepRTS.

pub(crate) mod batch;
pub(crate) mod replay;
pub(crate) mod run;
pub(crate) mod validate;

mod output;

use clap::ValueEnum;
use deeprts::{EngineError, GameConfig};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Output format for the `run` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Output format for the `replay` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReplayFormat {
    /// ASCII map for every tick.
    Text,
    /// JSON snapshot of the final tick.
    Json,
}

/// Output format for the `batch` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum BatchFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
    /// CSV format.
    Csv,
}

/// What the `validate` command checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ValidateKind {
    /// Map descriptor.
    Map,
    /// Game configuration.
    Config,
    /// Recording (replayed to the end).
    Recording,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<deeprts::replay::ReplayError> for CliError {
    fn from(e: deeprts::replay::ReplayError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON serialization failed: {e}"))
    }
}

/// Load a config file, or return `default` when none is given.
pub(crate) fn load_config(
    path: Option<&Path>,
    default: GameConfig,
) -> Result<GameConfig, CliError> {
    match path {
        Some(path) => GameConfig::load(path).map_err(|e| {
            CliError::new(format!("Failed to load config {}: {e}", path.display()))
        }),
        None => Ok(default),
    }
}

/// Seed from the command line, or one derived from the clock.
pub(crate) fn seed_or_now(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos() % u128::from(u64::MAX)).unwrap_or(42))
            .unwrap_or(42)
    })
}
