//! Init command implementation

use anyhow::Result;
use std::path::{Path, PathBuf};

use talkback::Config;

/// Write the default configuration file.
///
/// Goes to `config_path` when given, `./.talkback/config.toml` with
/// `local`, and the global `~/.talkback/config.toml` otherwise.
pub fn init_command(work_dir: &Path, config_path: Option<PathBuf>, local: bool, force: bool) -> Result<()> {
    let config_path = config_path.unwrap_or_else(|| {
        if local {
            Config::local_config_path(work_dir)
        } else {
            Config::global_config_path()
        }
    });

    Config::write_default(&config_path, force)?;
    println!("Created: {}", config_path.display());
    Ok(())
}
