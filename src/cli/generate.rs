//! Generate command - write a seeded synthetic stream

use crate::dataset::save_jsonl;
use crate::synthetic::StreamGenerator;
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;

pub struct GenerateOptions {
    pub output: PathBuf,
    pub instances: usize,
    pub features: usize,
    pub labels: usize,
    pub seed: u64,
    pub drift_at: Option<usize>,
    pub noise: f64,
    pub name: Option<String>,
}

/// Run the generate command
pub fn run(opts: &GenerateOptions) -> Result<()> {
    if opts.labels == 0 {
        anyhow::bail!("at least one label is required");
    }
    let name = opts.name.clone().unwrap_or_else(|| {
        opts.output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "synthetic".to_string())
    });

    let mut generator = StreamGenerator::new(opts.features, opts.labels, opts.seed)
        .with_name(name)
        .with_noise(opts.noise);
    if let Some(at) = opts.drift_at {
        generator = generator.with_drift_at(at);
    }

    let stream = generator.generate(opts.instances);
    save_jsonl(&stream, &opts.output)
        .with_context(|| format!("Failed to write {}", opts.output.display()))?;

    let cardinality = stream
        .instances()
        .iter()
        .map(|i| i.positive_count())
        .sum::<usize>() as f64
        / stream.len().max(1) as f64;
    eprintln!(
        "{} Wrote {} instances ({} features, {} labels, cardinality {:.2}) to {}",
        style("✓").green(),
        stream.len(),
        opts.features,
        opts.labels,
        cardinality,
        style(opts.output.display()).cyan()
    );
    Ok(())
}
