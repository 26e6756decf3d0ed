//! CLI output formatting

use crate::core::state::{ExecutionStatus, RunState};
use crate::execution::RunEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over pipeline steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a run event for display
pub fn format_run_event(event: &RunEvent) -> String {
    match event {
        RunEvent::RunStarted {
            run_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({}) with {} steps",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim(),
            style(total_steps).cyan()
        ),
        RunEvent::StepStarted {
            step_name,
            index,
            total,
        } => format!(
            "{} {} ({}/{})",
            SPINNER,
            style(step_name).cyan(),
            index + 1,
            total
        ),
        RunEvent::StepCompleted { step_name, .. } => {
            format!("{} {}", CHECK, style(step_name).green())
        }
        RunEvent::StepFailed { step_name, error } => {
            format!("{} {}: {}", CROSS, style(step_name).red(), style(error).dim())
        }
        RunEvent::RunCompleted { run_id, status } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
                _ => format!("{:?}", status),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Format the end-of-run summary line
pub fn format_run_summary(state: &RunState) -> String {
    let mut line = format!(
        "{}/{} steps completed ({:.0}%)",
        style(state.completed_steps).cyan(),
        state.total_steps,
        state.progress() * 100.0
    );
    if state.items_yielded > 0 {
        line.push_str(&format!(
            ", {} items yielded",
            style(state.items_yielded).cyan()
        ));
    }
    line
}

/// Format final output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{} ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
