//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print records as pretty JSON, exactly as the service returned them
pub fn print_json<T: Serialize + ?Sized>(records: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.2}Gi", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes / KB)
    } else {
        format!("{:.0}B", bytes)
    }
}

/// Format a percentage value (already 0-100)
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format currency
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Render an optional value, `-` when absent
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Last segment of an ARM resource id (the VM name)
pub fn resource_name(resource_id: &str) -> &str {
    resource_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(resource_id)
}

/// Color compliance, power state and impact values
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "compliant" | "running" | "low" => status.green().to_string(),
        "deallocated" | "stopped" | "medium" | "unknown" => status.yellow().to_string(),
        "noncompliant" | "high" => status.red().to_string(),
        _ => status.to_string(),
    }
}
