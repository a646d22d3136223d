//! Log and change history commands

use std::path::Path;

use colored::Colorize;
use fim_core::HistoryEvent;
use serde::Serialize;

use super::{classification_label, print_json};
use crate::context::CliContext;
use crate::error::Result;

#[derive(Serialize)]
struct LogFile<'a> {
    file: &'a str,
    content: &'a str,
}

/// Run the logs command
pub fn run_logs(context: &CliContext, directory: Option<&Path>) -> Result<()> {
    let monitor = context.open_monitor(context.load_config()?)?;
    let logs = monitor.view_logs(directory)?;

    if context.json {
        let files: Vec<_> = logs
            .iter()
            .map(|(file, content)| LogFile { file, content })
            .collect();
        return print_json(&files);
    }

    if logs.is_empty() {
        println!("{}", "No logs yet.".dimmed());
        return Ok(());
    }
    for (file, content) in &logs {
        println!("{}", file.bold());
        if content.is_empty() {
            println!("  {}", "(empty)".dimmed());
        } else {
            print!("{content}");
        }
        println!();
    }
    Ok(())
}

/// Run the history command
pub fn run_history(context: &CliContext, path: &Path, limit: usize) -> Result<()> {
    let monitor = context.open_monitor(context.load_config()?)?;
    let events = monitor.file_history(path, limit)?;

    if context.json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No recorded changes for {}.", path.display());
        return Ok(());
    }
    print_events(&events);
    Ok(())
}

/// Run the recent command
pub fn run_recent(context: &CliContext, hours: u32) -> Result<()> {
    let monitor = context.open_monitor(context.load_config()?)?;
    let events = monitor.recent_changes(hours)?;

    if context.json {
        return print_json(&events);
    }
    if events.is_empty() {
        println!("No changes in the last {hours} hours.");
        return Ok(());
    }
    println!("{} ({}):", format!("Changes in the last {hours} hours").bold(), events.len());
    print_events(&events);
    Ok(())
}

fn print_events(events: &[HistoryEvent]) {
    for event in events {
        let mut line = format!(
            "  {} {} {:<6} {}",
            event.detected_at.dimmed(),
            classification_label(event.classification),
            event.kind.as_str(),
            event.path
        );
        if let Some(from) = &event.previous_path {
            line.push_str(&format!(" {}", format!("(from {from})").dimmed()));
        }
        println!("{line}");
    }
}
