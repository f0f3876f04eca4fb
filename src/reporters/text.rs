//! Text (terminal) reporter with colors and formatting

use super::format_value;
use crate::eval::stats::HEADLINE;
use crate::eval::{EvalReport, MetricValue, ReportOrigin};
use anyhow::Result;
use console::style;

/// Width of a metric column in the trace table
const COLUMN: usize = 14;

/// Render report as formatted terminal output
pub fn render(report: &EvalReport) -> Result<String> {
    let mut out = String::new();

    let title = match report.origin {
        ReportOrigin::Streaming => "Prequential Evaluation",
        ReportOrigin::Batch => "Held-out Evaluation",
        ReportOrigin::Unevaluated => "Training Only (no evaluation)",
    };
    out.push_str(&format!("\n{}\n", style(title).bold()));
    out.push_str(&format!(
        "{}\n",
        style("──────────────────────────────────────").dim()
    ));

    for (k, v) in &report.info {
        out.push_str(&format!("{:<28} {}\n", k, v));
    }
    out.push('\n');

    if !report.trace.is_empty() {
        out.push_str(&render_trace(report));
        out.push('\n');
    }

    if !report.stats.is_empty() {
        out.push_str(&format!("{}\n", style("RESULTS").bold()));
        for (name, value) in &report.stats {
            let shown = match value {
                MetricValue::Number(v) => format_value(*v),
                other => other.to_string(),
            };
            if HEADLINE.contains(&name.as_str()) {
                out.push_str(&format!("  {:<28} {}\n", name, style(shown).green().bold()));
            } else {
                out.push_str(&format!("  {:<28} {}\n", name, shown));
            }
        }
        out.push('\n');
    }

    out.push_str(&format!("{}\n", style("MEASUREMENTS").bold()));
    for (name, value) in &report.measurements {
        out.push_str(&format!("  {:<32} {}\n", name, format_value(*value)));
    }

    Ok(out)
}

/// One row per snapshot: window, instances seen, headline metrics
fn render_trace(report: &EvalReport) -> String {
    let columns: Vec<&str> = HEADLINE
        .iter()
        .copied()
        .filter(|m| report.trace.iter().any(|s| s.metric(m).is_some()))
        .collect();

    let mut out = format!("{}\n", style("PERFORMANCE TRACE").bold());
    out.push_str(&format!("  {:>6} {:>8}", "w", "n"));
    for c in &columns {
        let header: String = c.chars().take(COLUMN - 1).collect();
        out.push_str(&format!(" {:>width$}", header, width = COLUMN));
    }
    out.push('\n');

    for s in &report.trace {
        out.push_str(&format!("  {:>6} {:>8}", s.window, s.instances_seen));
        for c in &columns {
            let cell = s.metric(c).map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".into());
            out.push_str(&format!(" {:>width$}", cell, width = COLUMN));
        }
        out.push('\n');
    }
    out
}
