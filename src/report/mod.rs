//! Output sinks for inspection results.
//!
//! The scheduler hands every completed pass to an [`OutputSink`]. Sink
//! failures are logged by the caller and never stop the scheduler.

mod json;
mod text;

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::OutputFormat;
use crate::health::{AggregatedResult, HealthLevel};

pub use json::JsonSink;
pub use text::{TextSink, render_text};

#[derive(Debug)]
pub enum SinkError {
    Io(io::Error),
    Encode(serde_json::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "write failed: {}", e),
            SinkError::Encode(e) => write!(f, "encoding failed: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Encode(e) => Some(e),
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Encode(e)
    }
}

/// Consumer of aggregated results.
pub trait OutputSink: Send + Sync {
    fn emit(&self, result: &AggregatedResult) -> Result<(), SinkError>;

    /// Called once when the scheduler stops.
    fn stopped(&self) {}
}

/// Emits results as structured log events.
#[derive(Debug, Default)]
pub struct LogSink;

impl OutputSink for LogSink {
    fn emit(&self, result: &AggregatedResult) -> Result<(), SinkError> {
        for detail in &result.details {
            match detail.level {
                HealthLevel::Ok => info!(collector = %detail.name, level = %detail.level, "{}", detail.message),
                HealthLevel::Warn => warn!(collector = %detail.name, level = %detail.level, "{}", detail.message),
                HealthLevel::Critical => error!(collector = %detail.name, level = %detail.level, "{}", detail.message),
            }
        }
        info!(
            instance = %result.instance,
            overall = %result.overall,
            ok = result.counts.ok,
            warn = result.counts.warn,
            critical = result.counts.critical,
            elapsed_ms = result.elapsed.as_millis() as u64,
            partial = result.partial,
            "inspection completed"
        );
        Ok(())
    }

    fn stopped(&self) {
        info!("inspector stopped");
    }
}

/// Sink writing to stdout in the given format.
pub fn stdout_sink(format: OutputFormat) -> Arc<dyn OutputSink> {
    match format {
        OutputFormat::Text => Arc::new(TextSink::stdout()),
        OutputFormat::Json => Arc::new(JsonSink::stdout()),
        OutputFormat::Log => Arc::new(LogSink),
    }
}
