pub mod companies;
pub mod doctor;
pub mod init;
pub mod merge;
pub mod organize;
pub mod undo;

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;

/// The `--output` flag, or `files.output_dir` from the config file.
pub(crate) fn resolve_output_dir(output: Option<PathBuf>) -> Result<PathBuf> {
    match output {
        Some(dir) => Ok(dir),
        None => Ok(Config::load_or_default()?.files.output_dir),
    }
}
