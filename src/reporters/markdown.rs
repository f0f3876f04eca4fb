//! Markdown reporter for GitHub-flavored Markdown output
//!
//! The performance trace becomes a table, one row per window, which pastes
//! straight into issues, wikis or experiment logs.

use super::format_value;
use crate::eval::{EvalReport, MetricValue, ReportOrigin};
use anyhow::Result;
use chrono::Local;

/// Render report as GitHub-flavored Markdown
pub fn render(report: &EvalReport) -> Result<String> {
    let mut md = String::new();

    md.push_str(&render_header(report));
    md.push('\n');

    md.push_str(&render_info(report));
    md.push('\n');

    if !report.stats.is_empty() {
        md.push_str(&render_results(report));
        md.push('\n');
    }

    if !report.trace.is_empty() {
        md.push_str(&render_trace(report));
        md.push('\n');
    }

    md.push_str(&render_footer());

    Ok(md)
}

fn render_header(report: &EvalReport) -> String {
    let kind = match report.origin {
        ReportOrigin::Streaming => "Prequential",
        ReportOrigin::Batch => "Held-out",
        ReportOrigin::Unevaluated => "Training-only",
    };
    let dataset = report
        .info
        .get(crate::eval::driver::INFO_DATASET)
        .map(String::as_str)
        .unwrap_or("stream");
    format!("# {kind} evaluation: {dataset}\n")
}

fn render_info(report: &EvalReport) -> String {
    let mut md = String::from("## Setup\n\n| Option | Value |\n|--------|-------|\n");
    for (k, v) in &report.info {
        md.push_str(&format!("| {} | `{}` |\n", k, escape(v)));
    }
    md.push_str("\n| Measurement | Value |\n|-------------|-------|\n");
    for (k, v) in &report.measurements {
        md.push_str(&format!("| {} | {} |\n", k, format_value(*v)));
    }
    md
}

fn render_results(report: &EvalReport) -> String {
    let mut md = String::from("## Results\n\n| Metric | Value |\n|--------|-------|\n");
    for (k, v) in &report.stats {
        let shown = match v {
            MetricValue::Number(x) => format_value(*x),
            other => other.to_string(),
        };
        md.push_str(&format!("| {} | {} |\n", k, shown));
    }
    md
}

fn render_trace(report: &EvalReport) -> String {
    // scalar metrics present in every snapshot
    let columns: Vec<&String> = report
        .trace
        .get(0)
        .map(|first| {
            first
                .stats
                .iter()
                .filter(|(_, v)| v.as_f64().is_some())
                .map(|(k, _)| k)
                .collect()
        })
        .unwrap_or_default();

    let mut md = String::from("## Performance trace\n\n| Window | Seen | Labelled | Thresholds |");
    for c in &columns {
        md.push_str(&format!(" {} |", c));
    }
    md.push_str("\n|---|---|---|---|");
    md.push_str(&"---|".repeat(columns.len()));
    md.push('\n');

    for s in &report.trace {
        let thresholds: Vec<String> = s.thresholds.iter().map(|t| format!("{t:.3}")).collect();
        md.push_str(&format!(
            "| {} | {} | {} | {} |",
            s.window,
            s.instances_seen,
            s.window_labeled,
            thresholds.join(" ")
        ));
        for c in &columns {
            let cell = s.metric(c).map(format_value).unwrap_or_else(|| "-".into());
            md.push_str(&format!(" {} |", cell));
        }
        md.push('\n');
    }
    md
}

fn render_footer() -> String {
    format!(
        "---\n\n*Generated by mlstream on {}*\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

fn escape(s: &str) -> String {
    s.replace('|', "\\|").replace('`', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::stats::ACCURACY;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_markdown_has_trace_table() {
        let report = test_report();
        let md = render(&report).expect("render markdown");
        assert!(md.starts_with("# Prequential evaluation: synthetic"));
        assert!(md.contains("## Performance trace"));
        assert!(md.contains(ACCURACY));
        let rows = md.lines().filter(|l| l.starts_with("| 1 |") || l.starts_with("| 2 |")).count();
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_escape_pipes() {
        assert_eq!(escape("a|b"), "a\\|b");
    }
}
