//! Output reporters for evaluation results
//!
//! Supports multiple output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON, including the full performance trace
//! - `markdown` - GitHub-flavored Markdown with the trace as a table

mod json;
mod markdown;
mod text;

use crate::eval::EvalReport;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(anyhow!(
                "Unknown format '{}'. Valid formats: text, json, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Render an evaluation report in the specified format
pub fn report(report: &EvalReport, format: &str) -> Result<String> {
    let fmt = OutputFormat::from_str(format)?;
    report_with_format(report, fmt)
}

/// Render an evaluation report using an OutputFormat enum
pub fn report_with_format(report: &EvalReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(report),
        OutputFormat::Json => json::render(report),
        OutputFormat::Markdown => markdown::render(report),
    }
}

/// Get the recommended file extension for a format
pub fn file_extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Text => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Markdown => "md",
    }
}

/// Format a metric or measurement value the way reports print it
pub(crate) fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e12 {
        format!("{}", v as i64)
    } else {
        format!("{v:.4}")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A small streaming report with two snapshots
    pub(crate) fn test_report() -> EvalReport {
        use crate::config::EvalConfig;
        use crate::eval::EvaluationDriver;
        use crate::synthetic::StreamGenerator;

        let stream = StreamGenerator::new(3, 2, 5).generate(60);
        let config = EvalConfig {
            windows: Some(3),
            ..Default::default()
        };
        EvaluationDriver::new(config)
            .train(stream)
            .run(&mut crate::classifier::LabelFrequency::new())
            .expect("evaluation runs")
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str("md").unwrap(),
            OutputFormat::Markdown
        );
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(40.0), "40");
        assert_eq!(format_value(0.123456), "0.1235");
    }

    #[test]
    fn test_every_format_renders() {
        let r = test_report();
        for f in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Markdown] {
            assert!(!report_with_format(&r, f).unwrap().is_empty(), "{f}");
        }
        assert_eq!(file_extension(OutputFormat::Markdown), "md");
    }
}
