use colored::Colorize;
use declarative::{Action, ExecuteSummary, Report};
use serde_json::Value;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Symbol for a report: `+` create, `~` update, `-` remove, `○` unchanged
fn report_symbol(report: &Report) -> colored::ColoredString {
    if report.is_failure() {
        return "✗".red();
    }
    match report.action {
        Action::Create => "+".green(),
        Action::Update => "~".yellow(),
        Action::Remove => "-".red(),
        Action::NoOp => "○".dimmed(),
    }
}

/// Render a change value for display; the password is never shown
fn change_value(key: &str, value: &Value) -> String {
    match value {
        _ if key == "password" => "(changed)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print one report in human form
pub fn report(report: &Report) {
    let comment = if report.is_failure() {
        report.comment.red().to_string()
    } else if report.is_pending() {
        report.comment.yellow().to_string()
    } else {
        report.comment.clone()
    };
    println!("  {} {}", report_symbol(report), comment);

    // "Present" / "Absent" are already said by the comment
    for change in report.changes.values() {
        if let Value::Object(attrs) = change {
            for (key, value) in attrs {
                println!("      {}: {}", key.dimmed(), change_value(key, value));
            }
        }
    }
}

/// Print one report as a JSON line
pub fn report_json(report: &Report) {
    match serde_json::to_string(report) {
        Ok(line) => println!("{line}"),
        Err(e) => error(&format!("Could not serialize report for {}: {e}", report.name)),
    }
}

/// Print final summary
pub fn summary(summary: &ExecuteSummary) {
    println!();
    if !summary.is_success() {
        println!("  {} Converged with errors", "⚠".yellow().bold());
    } else if summary.pending > 0 {
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if summary.total_changes() == 0 {
        println!("  {} Everything up to date", "✓".green().bold());
    } else {
        println!("  {} Roles converged successfully!", "✓".green().bold());
    }

    if summary.created > 0 {
        println!("    • {} roles created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} roles updated", summary.updated);
    }
    if summary.removed > 0 {
        println!("    • {} roles removed", summary.removed);
    }
    if summary.pending > 0 {
        println!("    • {} changes pending", summary.pending);
    }
    if summary.unchanged > 0 {
        println!("    • {} roles unchanged", summary.unchanged);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "roles".red());
    }
}
