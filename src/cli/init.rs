//! Init command - write an example configuration

use crate::config::{init_config, user_config_path, CONFIG_FILE};
use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};

/// Run the init command
pub fn run(path: Option<&Path>, user: bool) -> Result<()> {
    let target: PathBuf = if user {
        user_config_path().context("Could not determine the user config directory")?
    } else {
        path.map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    };

    if init_config(&target)? {
        println!(
            "{} Created {}",
            style("✓").green(),
            style(target.display()).cyan()
        );
    } else {
        println!(
            "{} Config already exists at {}",
            style("✓").green(),
            style(target.display()).cyan()
        );
    }
    println!(
        "\nRun {} to evaluate a model with these settings.",
        style("mlstream evaluate -t <stream.jsonl>").bold()
    );
    Ok(())
}
