use crate::models::{RunConfiguration, RunReport, Verdict};
use crate::Result;
use colored::Colorize;

/// Longest checksum shown verbatim in the summary
const MAX_CHECKSUM_CHARS: usize = 48;

pub fn to_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Colored multi-line summary for the terminal
pub fn to_human(report: &RunReport, config: &RunConfiguration) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{}\n\n",
        format!("Idempotency check: {}", config.config_file().display())
            .cyan()
            .bold()
    ));
    out.push_str(&format!("   Apply:      {}\n", config.apply_command()));
    out.push_str(&format!("   Checksum:   {}\n", config.checksum_command()));
    out.push_str(&format!(
        "   Iterations: {}/{}\n",
        report.iterations.len(),
        report.requested_iterations
    ));

    if let Some(baseline) = &report.baseline {
        let note = match report.first_apply_changed_state() {
            Some(true) => " (changed by first apply)".yellow().to_string(),
            Some(false) => " (unchanged by first apply)".bright_black().to_string(),
            None => String::new(),
        };
        out.push_str(&format!("   Baseline:   {}{}\n", shorten(baseline), note));
    }
    out.push('\n');

    let reference = report.iterations.first().map(|it| it.checksum.as_str());
    for iteration in &report.iterations {
        let same = Some(iteration.checksum.as_str()) == reference;
        let marker = if same { "=".green() } else { "≠".red().bold() };
        out.push_str(&format!(
            "   {} #{:<3} {}  {}\n",
            marker,
            iteration.index,
            short_digest(&iteration.digest).bright_black(),
            shorten(&iteration.checksum)
        ));
    }
    if !report.iterations.is_empty() {
        out.push('\n');
    }

    let verdict_line = match report.verdict {
        Verdict::Idempotent => format!(
            "✅ Configuration is idempotent: state stayed consistent across {} application(s)",
            report.iterations.len()
        )
        .green()
        .bold(),
        Verdict::NonIdempotent => format!(
            "❌ Configuration is NOT idempotent: iteration {} differs from iteration 1 ({} distinct checksums)",
            report
                .first_divergence
                .map(|i| i.to_string())
                .unwrap_or_else(|| "?".to_string()),
            report.distinct_checksums()
        )
        .red()
        .bold(),
        Verdict::ExecutionError => match &report.failure {
            Some(failure) => format!("⛔ Execution error at {}", failure).red().bold(),
            None => "⛔ Execution error".red().bold(),
        },
    };
    out.push_str(&verdict_line.to_string());
    out.push('\n');

    if let Some(failure) = &report.failure {
        if !failure.stderr.is_empty() {
            out.push_str(&format!("\n   {}\n", "Stderr:".yellow()));
            for line in failure.stderr.lines() {
                out.push_str(&format!("   {}\n", line));
            }
        }
    }

    out
}

fn short_digest(digest: &str) -> String {
    let hex = digest.trim_start_matches("sha256:");
    hex.chars().take(12).collect()
}

fn shorten(checksum: &str) -> String {
    let single_line = checksum.lines().next().unwrap_or("");
    let multi_line = checksum.lines().nth(1).is_some();
    if single_line.chars().count() > MAX_CHECKSUM_CHARS || multi_line {
        let truncated: String = single_line.chars().take(MAX_CHECKSUM_CHARS).collect();
        format!("{}...", truncated)
    } else {
        single_line.to_string()
    }
}
