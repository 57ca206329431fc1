//! Output formatting for CLI commands.
//!
//! Every formatter returns a string; the binary decides where it goes.

use std::collections::BTreeMap;
use std::fmt::Write;

use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::config::{ProjectFile, ValidationResult};
use crate::planner::{ExecutionPlan, ExecutionReport};
use crate::provider::DesiredStack;
use crate::stack::StackStatus;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Per-stack result row for table display.
#[derive(Tabled)]
struct StackRow {
    #[tabled(rename = "Stack")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Plan batch row for table display.
#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Stacks")]
    stacks: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an execution report.
    #[must_use]
    pub fn format_report(&self, report: &ExecutionReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &ExecutionReport) -> String {
        let mut output = String::new();
        if report.stacks.is_empty() {
            output.push_str("No stacks selected.\n");
            return output;
        }

        let rows: Vec<StackRow> = report
            .stacks
            .iter()
            .map(|(name, r)| StackRow {
                name: name.clone(),
                status: Self::format_status(r.status),
                detail: Self::truncate(&r.message, 60),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let complete = report.count(StackStatus::Complete);
        let failed = report.count(StackStatus::Failed);
        let summary = if report.success() {
            format!("{} {complete} stacks complete", "✓".green())
        } else {
            format!(
                "{} {complete} complete, {} failed",
                "✗".red(),
                failed.to_string().red()
            )
        };
        let _ = writeln!(output, "\n{summary}");
        output
    }

    /// Formats the batches of a plan.
    #[must_use]
    pub fn format_plan(&self, plan: &ExecutionPlan) -> String {
        match self.format {
            OutputFormat::Json => to_json(&PlanJson::from(plan)),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "\nPlan for {}: {} stacks",
                    plan.command.to_string().bold(),
                    plan.stack_count()
                );

                let rows: Vec<BatchRow> = plan
                    .phases
                    .iter()
                    .flat_map(|phase| {
                        phase
                            .batches
                            .iter()
                            .enumerate()
                            .map(move |(index, batch)| BatchRow {
                                phase: phase.action.to_string(),
                                index: index + 1,
                                stacks: batch.join(", "),
                            })
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats rendered stack configurations.
    #[must_use]
    pub fn format_render(&self, rendered: &BTreeMap<String, DesiredStack>) -> String {
        match self.format {
            OutputFormat::Json => to_json(rendered),
            OutputFormat::Text => serde_yaml::to_string(rendered)
                .unwrap_or_else(|e| format!("Failed to render: {e}\n")),
        }
    }

    /// Formats the result of `validate`.
    #[must_use]
    pub fn format_validation(
        &self,
        file: &ProjectFile,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "project": file.project.name,
                "stacks": file.stacks.len(),
                "valid": result.is_valid(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings,
            })),
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
                } else {
                    let _ = writeln!(output, "{} Configuration is invalid:", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = writeln!(output, "\nConfiguration summary:");
                let _ = writeln!(output, "   Project: {}", file.project.name);
                let _ = writeln!(output, "   Stacks: {}", file.stacks.len());
                if let Some(limit) = file.project.max_concurrency {
                    let _ = writeln!(output, "   Max concurrency: {limit}");
                }
                output
            }
        }
    }

    /// Formats a stack status with color.
    fn format_status(status: StackStatus) -> String {
        match status {
            StackStatus::Complete => "complete".green().to_string(),
            StackStatus::Failed => "failed".red().to_string(),
            StackStatus::InProgress => "in_progress".yellow().to_string(),
            StackStatus::Pending => "pending".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson {
    command: String,
    stack_count: usize,
    phases: Vec<PhaseJson>,
}

#[derive(Serialize)]
struct PhaseJson {
    action: String,
    batches: Vec<Vec<String>>,
}

impl From<&ExecutionPlan> for PlanJson {
    fn from(plan: &ExecutionPlan) -> Self {
        Self {
            command: plan.command.to_string(),
            stack_count: plan.stack_count(),
            phases: plan
                .phases
                .iter()
                .map(|phase| PhaseJson {
                    action: phase.action.to_string(),
                    batches: phase.batches.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{BatchReport, Command, StackReport};

    fn report() -> ExecutionReport {
        let mut report = ExecutionReport::default();
        report.stacks.insert(
            String::from("vpc"),
            StackReport {
                status: StackStatus::Complete,
                message: String::from("CREATE_COMPLETE"),
            },
        );
        report.stacks.insert(
            String::from("app"),
            StackReport {
                status: StackStatus::Failed,
                message: String::from("dependency failed"),
            },
        );
        report.batches.push(BatchReport {
            action: Command::Create,
            stacks: vec![String::from("vpc")],
            workers: 1,
        });
        report
    }

    #[test]
    fn test_report_json() {
        let json = OutputFormatter::new(OutputFormat::Json).format_report(&report());
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed["stacks"]["vpc"]["status"], "complete");
        assert_eq!(parsed["stacks"]["app"]["status"], "failed");
        assert_eq!(parsed["batches"][0]["workers"], 1);
    }

    #[test]
    fn test_report_text_lists_every_stack() {
        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).format_report(&report());
        assert!(text.contains("vpc"));
        assert!(text.contains("CREATE_COMPLETE"));
        assert!(text.contains("1 complete, 1 failed"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
    }
}
