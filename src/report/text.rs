use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

use crossterm::style::Stylize;

use super::{OutputSink, SinkError};
use crate::fmt::format_metric;
use crate::health::{AggregatedResult, HealthLevel};

const WIDTH: usize = 70;

fn level_label(level: HealthLevel, color: bool) -> String {
    if !color {
        return level.to_string();
    }
    match level {
        HealthLevel::Ok => level.as_str().green().to_string(),
        HealthLevel::Warn => level.as_str().yellow().bold().to_string(),
        HealthLevel::Critical => level.as_str().red().bold().to_string(),
    }
}

/// Renders a human-readable report. Unavailable metrics show as `N/A`.
pub fn render_text(result: &AggregatedResult, color: bool) -> String {
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "MySQL Health Check Report");
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "Instance: {}:{}", result.instance.host, result.instance.port);
    if let Some(version) = &result.instance.version {
        let _ = writeln!(out, "Version:  {}", version);
    }
    let _ = writeln!(out, "Checked:  {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Elapsed:  {}ms", result.elapsed.as_millis());
    let _ = writeln!(out, "Overall:  {}", level_label(result.overall, color));
    if result.partial {
        let _ = writeln!(out, "Partial:  deadline reached before all collectors finished");
    }
    let _ = writeln!(out, "{}", light);

    for detail in &result.details {
        let _ = write!(out, "\n[{}] {}", detail.name, level_label(detail.level, color));
        if detail.message.is_empty() {
            let _ = writeln!(out);
        } else {
            let _ = writeln!(out, " - {}", detail.message);
        }
        let width = detail.metrics.keys().map(String::len).max().unwrap_or(0);
        for (key, value) in &detail.metrics {
            let _ = writeln!(out, "  {:<width$} : {}", key, format_metric(key, *value), width = width);
        }
    }

    let _ = writeln!(out, "\n{}", heavy);
    let _ = writeln!(
        out,
        "Summary: OK={}, WARN={}, CRITICAL={} ({} collectors)",
        result.counts.ok,
        result.counts.warn,
        result.counts.critical,
        result.counts.total()
    );
    let _ = writeln!(out, "{}", heavy);
    out
}

/// Writes [`render_text`] output to a writer.
pub struct TextSink {
    out: Mutex<Box<dyn Write + Send>>,
    color: bool,
}

impl TextSink {
    pub fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            out: Mutex::new(out),
            color,
        }
    }

    /// Stdout, coloured when attached to a terminal.
    pub fn stdout() -> Self {
        let color = io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), color)
    }
}

impl OutputSink for TextSink {
    fn emit(&self, result: &AggregatedResult) -> Result<(), SinkError> {
        let text = render_text(result, self.color);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
