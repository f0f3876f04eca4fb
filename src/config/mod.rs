//! Configuration for mlstream
//!
//! This module handles:
//! - Evaluation options (`EvalConfig`) and the windowing policy they select
//! - Layered loading from `mlstream.toml`, the user config and `MLSTREAM_*` variables
//! - Writing an example config (`mlstream init`)

mod eval_config;
mod loader;

pub use eval_config::{EvalConfig, WindowPolicy, DEFAULT_VERBOSITY, DEFAULT_WINDOWS};
pub use loader::{
    apply_env, init_config, load_config, load_file, user_config_path, CONFIG_FILE, ENV_SUPERVISION,
    ENV_THRESHOLD, ENV_VERBOSITY, ENV_WINDOWS,
};
