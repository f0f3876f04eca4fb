//! JSON reporter
//!
//! Outputs the full EvalReport, trace included, as pretty-printed JSON.

use crate::eval::EvalReport;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &EvalReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::stats::ACCURACY;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_json_render_valid() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["origin"], "streaming");
        assert_eq!(parsed["kind"], "MultiLabel");
        assert_eq!(parsed["trace"].as_array().expect("trace array").len(), 2);
        assert!(parsed["stats"][ACCURACY].is_number());
        assert_eq!(parsed["trace"][1]["window"], 2);
    }
}
