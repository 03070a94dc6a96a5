// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes for commands, batches and relays.

use crate::diagnostics::Warning;
use crate::fanout::{ExecutionResult, FanOutReport};
use crate::relay::{RelayEvent, RelaySnapshot};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Instant;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    #[default]
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => emit_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a non-fatal warning (stderr, except JSON).
    pub fn warning(&self, warning: &Warning) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Warning: {}", warning.message);
            }
            OutputMode::Json => emit_json(&JsonEvent {
                event: "warning",
                message: &warning.message,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a finished batch.
    pub fn report(&self, report: &FanOutReport) {
        match self.mode {
            OutputMode::Normal => print!("{}", render_report(report)),
            OutputMode::Quiet => println!("{}", render_summary(report)),
            OutputMode::Json => {
                for result in report.sorted() {
                    emit_json(&JsonResult {
                        event: "result",
                        result,
                    });
                }
                emit_json(&JsonSummary::from(report));
            }
        }
    }

    /// Print one relay connection log entry (suppressed in quiet mode).
    pub fn relay_event(&self, event: &RelayEvent) {
        match self.mode {
            OutputMode::Normal => println!("{}", render_relay_event(event)),
            OutputMode::Quiet => {}
            OutputMode::Json => emit_json(event),
        }
    }

    /// Print the totals of a stopped relay.
    pub fn relay_stats(&self, stats: &RelaySnapshot) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => print!("{}", render_relay_stats(stats)),
            OutputMode::Json => emit_json(&JsonRelayStats {
                event: "relay_stats",
                stats,
                duration_secs: self.duration(),
            }),
        }
    }
}

fn emit_json<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

/// Human-readable batch report: one block per endpoint, then the summary.
pub fn render_report(report: &FanOutReport) -> String {
    let mut out = String::new();
    for result in report.sorted() {
        render_result(&mut out, result);
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{}", render_summary(report));
    let _ = writeln!(out, "{RULE}");
    out
}

fn render_result(out: &mut String, result: &ExecutionResult) {
    let mark = if result.succeeded { "✅" } else { "❌" };
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "{mark} Host: {} (Exit Code: {})",
        result.token, result.exit_status
    );
    let _ = writeln!(out, "{RULE}");

    if !result.output.is_empty() {
        out.push_str(&result.output);
        if !result.output.ends_with('\n') {
            out.push('\n');
        }
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "Error: {error}");
    }
    out.push('\n');
}

pub fn render_summary(report: &FanOutReport) -> String {
    format!(
        "Summary: {} succeeded, {} failed, {} total | Time: {:.2}s",
        report.success_count(),
        report.failure_count(),
        report.results.len(),
        report.elapsed.as_secs_f64()
    )
}

pub fn render_relay_event(event: &RelayEvent) -> String {
    match event {
        RelayEvent::Opened { number, peer, at } => {
            format!("[{}] #{number} connection from {peer}", at.format("%H:%M:%S"))
        }
        RelayEvent::Closed {
            number,
            transfer,
            at,
            ..
        } => format!(
            "[{}] #{number} closed (↑{} ↓{})",
            at.format("%H:%M:%S"),
            format_bytes(i64::try_from(transfer.up).unwrap_or(i64::MAX)),
            format_bytes(i64::try_from(transfer.down).unwrap_or(i64::MAX))
        ),
        RelayEvent::TargetUnreachable {
            number,
            peer,
            error,
            at,
        } => format!(
            "[{}] #{number} target unreachable for {peer}: {error}",
            at.format("%H:%M:%S")
        ),
    }
}

pub fn render_relay_stats(stats: &RelaySnapshot) -> String {
    format!(
        "Total connections: {}\nBytes sent: {}\nBytes received: {}\n",
        stats.total_connections,
        format_bytes(stats.bytes_up),
        format_bytes(stats.bytes_down)
    )
}

/// Bytes with a binary unit suffix, one decimal above 1 KB.
pub fn format_bytes(bytes: i64) -> String {
    const KB: i64 = 1024;
    const MB: i64 = 1024 * KB;
    const GB: i64 = 1024 * MB;

    match bytes {
        b if b >= GB => format!("{:.1}GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1}MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1}KB", b as f64 / KB as f64),
        b => format!("{b}B"),
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    event: &'a str,
    #[serde(flatten)]
    result: &'a ExecutionResult,
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    event: &'a str,
    success: usize,
    failure: usize,
    total: usize,
    groups: &'a [String],
    duration_secs: f64,
}

impl<'a> From<&'a FanOutReport> for JsonSummary<'a> {
    fn from(report: &'a FanOutReport) -> Self {
        Self {
            event: "summary",
            success: report.success_count(),
            failure: report.failure_count(),
            total: report.results.len(),
            groups: &report.groups,
            duration_secs: report.elapsed.as_secs_f64(),
        }
    }
}

#[derive(Serialize)]
struct JsonRelayStats<'a> {
    event: &'a str,
    #[serde(flatten)]
    stats: &'a RelaySnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
