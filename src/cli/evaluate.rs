//! Evaluate command - run a model over a stream and report

use super::EvaluateArgs;
use crate::classifier;
use crate::config::{load_config, EvalConfig};
use crate::dataset::load_jsonl;
use crate::eval::{BatchHarness, EvaluationDriver, StandardStats};
use crate::reporters;
use anyhow::{anyhow, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;

fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

/// Apply explicit CLI flags on top of the loaded config
fn apply_args(config: &mut EvalConfig, args: &EvaluateArgs) {
    if let Some(w) = args.windows {
        config.windows = Some(w);
        config.window_size = None;
    }
    if let Some(size) = args.window_size {
        config.window_size = Some(size);
        config.windows = None;
    }
    if let Some(r) = args.supervision {
        config.supervision = r;
    }
    if let Some(t) = &args.threshold {
        config.threshold = t.clone();
    }
    if let Some(v) = args.verbosity {
        config.verbosity = v;
    }
    if args.no_eval {
        config.evaluate = false;
    }
    if args.no_calibrate {
        config.calibrate = false;
    }
}

/// Run the evaluate command
pub fn run(args: &EvaluateArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    let mut config = load_config(args.config.as_deref(), &cwd)?;
    apply_args(&mut config, args);
    tracing::debug!("Effective config: {:?}", config);

    let mut model = classifier::by_name(&args.model, args.learning_rate)
        .ok_or_else(|| anyhow!("Unknown model '{}'", args.model))?;

    let bar = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(create_bar_style());
        bar.set_message("test/update");
        bar
    };

    let mut driver = EvaluationDriver::new(config).on_progress(|done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    });
    if let Some(path) = &args.train {
        let stream = load_jsonl(path)
            .with_context(|| format!("Failed to load training stream {}", path.display()))?;
        driver = driver.train(stream);
    }
    if let Some(path) = &args.test {
        let stream = load_jsonl(path)
            .with_context(|| format!("Failed to load test set {}", path.display()))?;
        driver = driver.test(stream);
    }

    let outcome = driver.run(model.as_mut());
    bar.finish_and_clear();
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            if let Some(trace) = e.partial_trace().filter(|t| !t.is_empty()) {
                eprintln!(
                    "{} {} window(s) completed before the failure",
                    style("!").yellow().bold(),
                    trace.len()
                );
            }
            return Err(anyhow::Error::new(e).context("Evaluation failed"));
        }
    };

    if let (Some(path), Some(test)) = (&args.predictions, driver.test_stream()) {
        let predictions = BatchHarness::new(&StandardStats)
            .predict(model.as_ref(), test)
            .context("Failed to compute test-set predictions")?;
        write_predictions(path, &predictions)?;
        eprintln!(
            "{} Wrote {} predictions to {}",
            style("✓").green(),
            predictions.len(),
            style(path.display()).cyan()
        );
    }

    let rendered = reporters::report(&report, &args.format)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!(
                "{} Report written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn write_predictions(path: &Path, predictions: &[Vec<f64>]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = std::io::BufWriter::new(file);
    for p in predictions {
        serde_json::to_writer(&mut w, p)?;
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn args(extra: &[&str]) -> EvaluateArgs {
        let mut argv = vec!["mlstream", "evaluate"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Evaluate(a) => a,
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = EvalConfig {
            windows: Some(4),
            supervision: 0.5,
            ..Default::default()
        };
        apply_args(&mut config, &args(&["--window-size", "25", "--no-eval", "--threshold", "PCut1"]));
        assert_eq!(config.window_size, Some(25));
        assert_eq!(config.windows, None);
        assert_eq!(config.supervision, 0.5);
        assert_eq!(config.threshold, "PCut1");
        assert!(!config.evaluate);
        assert!(config.calibrate);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let before = EvalConfig {
            supervision: 0.3,
            ..Default::default()
        };
        let mut after = before.clone();
        apply_args(&mut after, &args(&[]));
        assert_eq!(before, after);
    }

    #[test]
    fn test_write_predictions_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.jsonl");
        write_predictions(&path, &[vec![0.25, 0.75], vec![1.0, 0.0]]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[0.25,0.75]\n[1.0,0.0]\n");
    }
}
