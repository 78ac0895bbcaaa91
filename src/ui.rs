use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use vhostctl::drift::{Severity, StateDiff};

pub fn print_step(msg: &str) {
    println!("{} {}", "::".blue().bold(), msg.bold());
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✔".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✖".red().bold(), msg.red());
}

pub fn create_spinner(msg: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("{:<7}", severity.to_string());
    match severity {
        Severity::Error => label.red().bold(),
        Severity::Warning => label.yellow(),
        Severity::Info => label.dimmed(),
    }
}

/// Diffs grouped under one heading per domain, in the order given.
pub fn print_drift(diffs: &[StateDiff]) {
    let mut current: Option<&str> = None;
    for diff in diffs {
        if current != Some(diff.resource_id.as_str()) {
            println!();
            println!("{}", diff.resource_id.bold());
            println!("{}", "─".repeat(60));
            current = Some(diff.resource_id.as_str());
        }
        println!(
            "  {} {:<20} desired: {:<16} actual: {}",
            severity_label(diff.severity),
            diff.field,
            diff.desired,
            diff.actual
        );
    }
}
