//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use uiflow_e2e::runner::ScenarioState;
use uiflow_e2e::{Outcome, RunSummary};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No scenarios selected.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

fn outcome_cell(outcome: &Outcome) -> Cell {
    match outcome.state() {
        ScenarioState::Passed => Cell::new("passed").fg(Color::Green),
        ScenarioState::Failed => Cell::new("FAILED").fg(Color::Red),
        _ => Cell::new("ERRORED").fg(Color::Yellow),
    }
}

fn failing_step(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Passed => String::new(),
        Outcome::Failed { step_index, step, .. } => format!("#{} {}", step_index, step),
        Outcome::Errored { step_index: Some(i), step, .. } => {
            format!("#{} {}", i, step.as_deref().unwrap_or_default())
        }
        Outcome::Errored { step_index: None, .. } => "(before first step)".to_string(),
    }
}

/// Print a run summary: per-scenario table, totals, groups, then problem details
pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary).unwrap_or_default());
            return;
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(summary).unwrap_or_default());
            return;
        }
        OutputFormat::Plain => {
            for r in &summary.results {
                println!("{}\t{:?}\t{} ms\t{}", r.name, r.outcome.state(), r.duration_ms, failing_step(&r.outcome));
            }
        }
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["Scenario", "Target", "Outcome", "Duration", "Failing step"]);
            for r in &summary.results {
                table.add_row(vec![
                    Cell::new(&r.name),
                    Cell::new(&r.target),
                    outcome_cell(&r.outcome),
                    Cell::new(format!("{} ms", r.duration_ms)),
                    Cell::new(failing_step(&r.outcome)),
                ]);
            }
            println!("{table}");

            if !summary.groups.is_empty() {
                let mut groups = new_table();
                groups.set_header(vec!["Group", "Total", "Passed", "Failed", "Errored"]);
                for (tag, c) in &summary.groups {
                    groups.add_row(vec![
                        tag.clone(),
                        c.total.to_string(),
                        c.passed.to_string(),
                        c.failed.to_string(),
                        c.errored.to_string(),
                    ]);
                }
                println!("{groups}");
            }
        }
    }

    for r in summary.problems() {
        let cause = r.outcome.message().unwrap_or("unknown error");
        eprintln!("{} {} {}", "✗".red(), r.name.bold(), failing_step(&r.outcome).dimmed());
        eprintln!("    {}", cause);
        if let Some(shot) = &r.screenshot {
            eprintln!("    screenshot: {} (sha256 {})", shot.path.display(), &shot.sha256[..12]);
        }
    }

    let c = &summary.counts;
    let totals = format!(
        "{} scenario(s): {} passed, {} failed, {} errored in {} ms [{}]",
        c.total, c.passed, c.failed, c.errored, summary.duration_ms, summary.environment
    );
    if summary.success() {
        print_success(&totals);
    } else {
        print_error(&totals);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✅", message.green());
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌", message.red());
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message.yellow());
}
