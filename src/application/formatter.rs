//! Output formatting for persisted state and run reports.
//!
//! Supports multiple output formats: plain text, JSON, and table view.

use std::path::Path;

use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{CounterKind, PersistedState, PositionToken};

use super::tally_service::{ResumeKind, RunReport};

/// Output format options.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// JSON format for programmatic use.
    Json,
    /// Table listing of counters.
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => Err(format!("Unknown format: {s}. Use: text, json, table")),
        }
    }
}

/// Persisted state as shown by `show`.
#[derive(Debug, Serialize)]
pub struct StateView<'a> {
    pub state_file: &'a Path,
    pub committed_at: Option<DateTime<Utc>>,
    pub state: Option<&'a PersistedState>,
}

/// Formats the persisted state in the requested format.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn format_state(view: &StateView<'_>, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(view),
        OutputFormat::Table => Ok(view.state.map_or_else(
            || "No state committed yet".to_string(),
            format_counters_table,
        )),
        OutputFormat::Text => Ok(format_state_text(view)),
    }
}

fn format_state_text(view: &StateView<'_>) -> String {
    let mut out = format!(
        "{}\n  File: {}\n",
        "📄 Tally state".bold(),
        view.state_file.display()
    );

    let Some(state) = view.state else {
        out.push_str("  No state committed yet");
        return out;
    };

    if let Some(at) = view.committed_at {
        out.push_str(&format!(
            "  Committed: {}\n",
            at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    out.push_str(&format!("  Position: {}\n", describe_position(&state.position)));
    out.push_str(&format_counter_lines(state));
    out
}

/// Formats a run report in the requested format.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn format_report(report: &RunReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Table => Ok(format_counters_table(&report.current)),
        OutputFormat::Text => Ok(format_report_text(report)),
    }
}

fn format_report_text(report: &RunReport) -> String {
    let resumed = match report.resumed {
        ResumeKind::Fresh => "fresh start".green(),
        ResumeKind::Saved => "saved position".normal(),
        ResumeKind::Fallback => "lost position, fell back".yellow(),
    };

    let mut out = format!(
        "{}\n  Resumed from: {}\n  Lines read: {} ({} matched)\n  Position: {}\n",
        "📊 Tally run".bold(),
        resumed,
        report.lines_read.to_string().cyan(),
        report.lines_matched.to_string().cyan(),
        describe_position(&report.current.position),
    );

    for kind in CounterKind::ALL {
        out.push_str(&format!(
            "  {:<11} {} (+{})\n",
            format!("{kind}:"),
            report.current.counters.get(kind).to_string().cyan(),
            report.delta.get(kind).to_string().green()
        ));
    }

    out.push_str(&format!(
        "  Committed: {}",
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}

fn format_counter_lines(state: &PersistedState) -> String {
    CounterKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "  {:<11} {}\n",
                format!("{kind}:"),
                state.counters.get(*kind).to_string().cyan()
            )
        })
        .collect()
}

/// Formats counters and position as a table.
fn format_counters_table(state: &PersistedState) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Counter", "Value"]);

    for kind in CounterKind::ALL {
        table.add_row(vec![kind.to_string(), state.counters.get(kind).to_string()]);
    }
    table.add_row(vec!["position".to_string(), describe_position(&state.position)]);

    table.to_string()
}

fn describe_position(position: &PositionToken) -> String {
    match position {
        PositionToken::Start => "start of history".to_string(),
        PositionToken::End => "waiting for the newest file".to_string(),
        PositionToken::At { offset, identity } => {
            format!("byte {offset} of file {identity} (device:inode)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Counters, FileIdentity};

    fn state() -> PersistedState {
        PersistedState::new(
            PositionToken::at(25, FileIdentity::new(2049, 7)),
            Counters {
                messages: 3,
                recipients: 0,
                completed: 1,
            },
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!(matches!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table)));
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_state_json() {
        let state = state();
        let view = StateView {
            state_file: Path::new("/tmp/state"),
            committed_at: None,
            state: Some(&state),
        };

        let json: serde_json::Value =
            serde_json::from_str(&format_state(&view, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["state"]["counters"]["messages"], 3);
        assert_eq!(json["state"]["position"]["offset"], 25);
        assert!(json["committed_at"].is_null());
    }

    #[test]
    fn test_state_text_mentions_position() {
        let state = state();
        let view = StateView {
            state_file: Path::new("/tmp/state"),
            committed_at: None,
            state: Some(&state),
        };

        let text = format_state(&view, OutputFormat::Text).unwrap();
        assert!(text.contains("byte 25 of file 2049:7"));
        assert!(text.contains("completed:"));
    }

    #[test]
    fn test_missing_state() {
        let view = StateView {
            state_file: Path::new("/tmp/state"),
            committed_at: None,
            state: None,
        };
        assert!(format_state(&view, OutputFormat::Table)
            .unwrap()
            .contains("No state committed yet"));
    }

    #[test]
    fn test_table_lists_counters() {
        let table = format_counters_table(&state());
        assert!(table.contains("recipients"));
        assert!(table.contains("2049:7"));
    }
}
