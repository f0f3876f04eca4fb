//! CLI command definitions and handlers

mod evaluate;
mod generate;
mod init;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate a supervision ratio in (0, 1]
fn parse_ratio(s: &str) -> Result<f64, String> {
    let r: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if r > 0.0 && r <= 1.0 {
        Ok(r)
    } else {
        Err("supervision must lie in (0, 1]".to_string())
    }
}

/// mlstream - prequential evaluation of multi-label stream models
#[derive(Parser, Debug)]
#[command(name = "mlstream")]
#[command(
    version,
    about = "Prequential (test-then-update) evaluation of multi-label models on partially labelled streams",
    after_help = "\
Examples:
  mlstream generate -o stream.jsonl -n 2000 --labels 5    Make a synthetic stream
  mlstream evaluate -t stream.jsonl                       10 windows, full supervision
  mlstream evaluate -t stream.jsonl -s 0.1 --threshold PCutL
  mlstream evaluate -t stream.jsonl --window-size 100 -f json -o report.json
  mlstream init                                           Write an example mlstream.toml"
)]
pub struct Cli {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example mlstream.toml
    Init {
        /// Where to write the config (default: ./mlstream.toml)
        path: Option<PathBuf>,

        /// Write the user-level config instead (~/.config/mlstream/config.toml)
        #[arg(long, conflicts_with = "path")]
        user: bool,
    },

    /// Evaluate a model over a stream
    #[command(after_help = "\
Examples:
  mlstream evaluate -t train.jsonl                        Windowed evaluation with defaults
  mlstream evaluate -t train.jsonl -x 20 -s 0.25          20 windows, a quarter of labels revealed
  mlstream evaluate -t train.jsonl --window-size 50       Sample every 50 instances
  mlstream evaluate -t train.jsonl -T test.jsonl          Held-out evaluation after streaming
  mlstream evaluate -t train.jsonl --no-eval              Only train on the stream")]
    Evaluate(EvaluateArgs),

    /// Generate a seeded synthetic multi-label stream (JSONL)
    Generate {
        /// Output file
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Number of instances
        #[arg(long, short = 'n', default_value = "1000")]
        instances: usize,

        /// Number of features
        #[arg(long, default_value = "10")]
        features: usize,

        /// Number of labels
        #[arg(long, default_value = "5")]
        labels: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Redraw every concept at this instance
        #[arg(long)]
        drift_at: Option<usize>,

        /// Label noise half-width
        #[arg(long, default_value = "0.1")]
        noise: f64,

        /// Dataset name stored in the header (default: file stem)
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct EvaluateArgs {
    /// Training stream (JSONL)
    #[arg(long, short = 't')]
    pub train: Option<PathBuf>,

    /// Held-out test set (JSONL), evaluated after streaming
    #[arg(long, short = 'T')]
    pub test: Option<PathBuf>,

    /// Config file (default: ./mlstream.toml, then the user config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of windows (the first trains the initial model)
    #[arg(long, short = 'x', conflicts_with = "window_size")]
    pub windows: Option<usize>,

    /// Fixed window size: sample statistics every N instances
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Fraction of labels revealed before each update, in (0, 1]
    #[arg(long, short = 's', value_parser = parse_ratio)]
    pub supervision: Option<f64>,

    /// Threshold: a number in [0, 1], PCut1 or PCutL
    #[arg(long)]
    pub threshold: Option<String>,

    /// Metric verbosity (1 = headline only, 5+ = per label)
    #[arg(long)]
    pub verbosity: Option<u8>,

    /// Only train on the stream, do not evaluate
    #[arg(long)]
    pub no_eval: bool,

    /// Keep the initial thresholds for the whole run
    #[arg(long)]
    pub no_calibrate: bool,

    /// Model: br (online binary relevance) or majority (label frequencies)
    #[arg(long, short = 'm', default_value = "br", value_parser = ["br", "binary-relevance", "majority", "frequency"])]
    pub model: String,

    /// Learning rate for the br model
    #[arg(long, default_value = "0.1")]
    pub learning_rate: f64,

    /// Output format: text, json, markdown (or md)
    #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json", "markdown", "md"])]
    pub format: String,

    /// Output file path (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Write test-set predictions as JSONL (requires --test)
    #[arg(long, requires = "test")]
    pub predictions: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { path, user } => init::run(path.as_deref(), user),
        Commands::Evaluate(args) => evaluate::run(&args),
        Commands::Generate {
            output,
            instances,
            features,
            labels,
            seed,
            drift_at,
            noise,
            name,
        } => generate::run(&generate::GenerateOptions {
            output,
            instances,
            features,
            labels,
            seed,
            drift_at,
            noise,
            name,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio("0.5"), Ok(0.5));
        assert_eq!(parse_ratio("1"), Ok(1.0));
        assert!(parse_ratio("0").is_err());
        assert!(parse_ratio("1.2").is_err());
        assert!(parse_ratio("half").is_err());
    }

    #[test]
    fn test_cli_parses_evaluate() {
        let cli = Cli::try_parse_from([
            "mlstream", "evaluate", "-t", "s.jsonl", "-x", "5", "-s", "0.2", "--threshold", "PCutL",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate(args) => {
                assert_eq!(args.windows, Some(5));
                assert_eq!(args.supervision, Some(0.2));
                assert_eq!(args.threshold.as_deref(), Some("PCutL"));
                assert_eq!(args.model, "br");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_windows_conflict_with_window_size() {
        let res = Cli::try_parse_from([
            "mlstream", "evaluate", "-t", "s.jsonl", "-x", "5", "--window-size", "10",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_predictions_require_test_set() {
        let res = Cli::try_parse_from(["mlstream", "evaluate", "-t", "s.jsonl", "--predictions", "p.jsonl"]);
        assert!(res.is_err());
    }
}
