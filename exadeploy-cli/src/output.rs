//! Terminal output formatting for the deploy, plan and preflight commands.
//! Uses comfy-table for tabular output and colored for
//! severity-aware terminal styling.

use chrono::Local;
use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use exadeploy_core::preflight::CheckStatus;
use exadeploy_core::report::{DeploymentSummary, FileStatus};
use exadeploy_core::{PlanReport, PreflightReport};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.into_iter().map(Cell::new).collect::<Vec<_>>());
    table
}

/// Return a colored string representation of a file status.
fn format_status(status: FileStatus) -> String {
    match status {
        FileStatus::Deployed => "Deployed".green().to_string(),
        FileStatus::Failed => "Failed".red().bold().to_string(),
        FileStatus::Skipped => "Skipped".dimmed().to_string(),
    }
}

/// Print the per-file table followed by the deployment report.
pub fn print_deploy_report(summary: &DeploymentSummary) {
    if !summary.files.is_empty() {
        let mut table = new_table(vec!["File", "Kind", "Units", "OK", "Failed", "Status"]);
        for file in &summary.files {
            let kind = file.kind.map(|k| k.to_string()).unwrap_or_default();
            table.add_row(vec![
                Cell::new(&file.file),
                Cell::new(kind),
                Cell::new(file.units),
                Cell::new(file.succeeded),
                Cell::new(file.failed),
                Cell::new(format_status(file.status)),
            ]);
        }
        println!("{table}");
    }

    println!(
        "{}",
        format!(
            "Started {}",
            summary
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        )
        .dimmed()
    );
    print!("{}", summary.render_text());

    if summary.cancelled {
        println!("{}", "Deployment cancelled.".yellow().bold());
    } else if summary.succeeded() {
        println!("{}", "Deployment completed successfully.".green().bold());
    } else {
        println!("{}", "Deployment FAILED.".red().bold());
    }
}

/// Print the offline deployment plan.
pub fn print_plan_report(report: &PlanReport) {
    for file in &report.files {
        let kind = file.kind.map(|k| k.to_string()).unwrap_or_else(|| "?".to_string());
        println!("{} ({})", file.file.bold(), kind);

        if let Some(ref note) = file.note {
            println!("  {}", note.yellow());
            continue;
        }

        let mut table = new_table(vec!["#", "Kind", "Name", "Preview"]);
        for unit in &file.units {
            table.add_row(vec![
                Cell::new(unit.index + 1),
                Cell::new(unit.kind),
                Cell::new(&unit.name),
                Cell::new(&unit.preview),
            ]);
        }
        println!("{table}");
    }

    println!();
    let counts: Vec<String> = report
        .kind_counts
        .iter()
        .map(|(kind, n)| format!("{}={}", kind, n))
        .collect();
    println!(
        "{}",
        format!(
            "{} unit(s) in {} file(s): {}",
            report.total_units,
            report.files.len(),
            counts.join(", ")
        )
        .bold()
    );

    for missing in &report.missing_files {
        println!("{} {}", "MISSING:".red().bold(), missing);
    }
}

/// Print preflight report.
pub fn print_preflight_report(report: &PreflightReport) {
    println!(
        "{}",
        if report.passed {
            "Pre-flight checks passed.".green().bold()
        } else {
            "Pre-flight checks FAILED.".red().bold()
        }
    );
    println!();

    for check in &report.checks {
        let icon = match check.status {
            CheckStatus::Pass => "✓".green(),
            CheckStatus::Warn => "!".yellow(),
            CheckStatus::Fail => "✗".red(),
        };
        println!("  {} {}: {}", icon, check.name, check.detail);
    }
}
