//! Config loading
//!
//! Sources, lowest priority first:
//! - built-in defaults
//! - `~/.config/mlstream/config.toml` (only when no project file exists)
//! - `mlstream.toml` in the working directory, or an explicit `--config` path
//! - `MLSTREAM_*` environment variables
//!
//! CLI flags are applied on top by the caller.

use super::EvalConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Project config file name looked up in the working directory
pub const CONFIG_FILE: &str = "mlstream.toml";

pub const ENV_WINDOWS: &str = "MLSTREAM_WINDOWS";
pub const ENV_SUPERVISION: &str = "MLSTREAM_SUPERVISION";
pub const ENV_THRESHOLD: &str = "MLSTREAM_THRESHOLD";
pub const ENV_VERBOSITY: &str = "MLSTREAM_VERBOSITY";

/// User-level config path
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mlstream").join("config.toml"))
}

/// Parse one TOML config file
pub fn load_file(path: &Path) -> Result<EvalConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: EvalConfig =
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Load config from every source except CLI flags.
///
/// An explicit path must exist; the implicit ones are optional.
pub fn load_config(explicit: Option<&Path>, workdir: &Path) -> Result<EvalConfig> {
    let mut config = match explicit {
        Some(path) => load_file(path)?,
        None => {
            let project = workdir.join(CONFIG_FILE);
            if project.exists() {
                load_file(&project)?
            } else if let Some(user) = user_config_path().filter(|p| p.exists()) {
                load_file(&user)?
            } else {
                EvalConfig::default()
            }
        }
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Override fields from environment variables read through `lookup`.
pub fn apply_env(config: &mut EvalConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(v) = lookup(ENV_WINDOWS) {
        let windows = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_WINDOWS}={v} is not a window count"))?;
        config.windows = Some(windows);
        config.window_size = None;
    }
    if let Some(v) = lookup(ENV_SUPERVISION) {
        config.supervision = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_SUPERVISION}={v} is not a number"))?;
    }
    if let Some(v) = lookup(ENV_THRESHOLD) {
        config.threshold = v.trim().to_string();
    }
    if let Some(v) = lookup(ENV_VERBOSITY) {
        config.verbosity = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_VERBOSITY}={v} is not a verbosity level"))?;
    }
    Ok(())
}

const EXAMPLE_CONFIG: &str = r#"# mlstream configuration

# Split the stream into this many windows; the first trains the initial model.
windows = 10

# Or sample every `window_size` instances instead (do not set both).
# window_size = 100

# Fraction of instances whose labels are revealed before the update, in (0, 1].
supervision = 1.0

# Decision threshold: a number in [0, 1], "PCut1" (one calibrated threshold)
# or "PCutL" (one calibrated threshold per label).
threshold = "0.5"

# Which metrics are computed: 1 = headline only, 3 = default, 5+ = per label.
verbosity = 3

# Set to false to only train on the stream.
evaluate = true

# Recalibrate thresholds after every window.
calibrate = true
"#;

/// Write an example config to `path` unless one is already there.
///
/// Returns true when a file was written.
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_example_config_parses() {
        let config: EvalConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.windows, Some(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_project_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "supervision = 0.5\nverbosity = 1\n").unwrap();
        let config = load_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.supervision, 0.5);
        assert_eq!(config.verbosity, 1);
        assert_eq!(config.threshold, "0.5");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_WINDOWS, "4"),
            (ENV_SUPERVISION, "0.2"),
            (ENV_THRESHOLD, "PCutL"),
        ]
        .into_iter()
        .collect();
        let mut config = EvalConfig {
            window_size: Some(30),
            ..Default::default()
        };
        apply_env(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.windows, Some(4));
        assert_eq!(config.window_size, None);
        assert_eq!(config.supervision, 0.2);
        assert_eq!(config.threshold, "PCutL");
        assert_eq!(config.verbosity, 3);
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = EvalConfig::default();
        let err = apply_env(&mut config, |k| (k == ENV_VERBOSITY).then(|| "loud".to_string()));
        assert!(err.is_err());
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert!(init_config(&path).unwrap());
        std::fs::write(&path, "windows = 3\n").unwrap();
        assert!(!init_config(&path).unwrap());
        assert_eq!(load_file(&path).unwrap().windows, Some(3));
    }
}
