//! Configuration file lookup, environment overrides and the default file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use super::Config;

/// Overrides `listener.address`
pub const ENV_UDP_ADDR: &str = "TALKBACK_UDP_ADDR";
/// Overrides `listener.port`
pub const ENV_UDP_PORT: &str = "TALKBACK_UDP_PORT";
/// Overrides `delivery.program`
pub const ENV_SENDER_PATH: &str = "TALKBACK_SENDER_PATH";
/// Overrides `delivery.target`
pub const ENV_TARGET: &str = "TALKBACK_TARGET";

/// Default configuration content for `talkback init`
pub const DEFAULT_CONFIG: &str = r#"# talkback configuration
# ======================
#
# Messages are typed into the target process by an external delivery
# program; replies come back as UDP datagrams, one fragment each, ending
# with the sentinel.

# UDP endpoint the reply plugin sends fragments to
[listener]
address = "127.0.0.1"
port = 9999
# Largest datagram accepted, in bytes
buffer_size = 4096

[mailbox]
# Fragments buffered before the listener waits for the reader
capacity = 8

[reply]
# Ends a reply; never shown
sentinel = "<exit>"
# Shown as a paragraph break
paragraph_break = "</>"

[delivery]
# Path of the delivery program (required)
# program = "C:/tools/sender.exe"
target = "Claude"
# window_title = "Claude"
# Send all steps of one message in a single program invocation
batch = true
# Keystrokes that empty the target's input box (empty disables `clear`)
clear_sequence = "^a{BACKSPACE}"

# Steps wrapped around every message. `{paragraph_break}` and `{sentinel}`
# in the instruction are replaced with the markers above.
[delivery.exchange]
line_break = "+{ENTER}"
instruction_prefix = "+{ENTER}+{ENTER}"
submit = "{ENTER}"
separate_instruction = false
"#;

impl Config {
    /// Get the global config directory path (~/.talkback/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".talkback")
    }

    /// Get the global config file path (~/.talkback/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Project-local config path (.talkback/config.toml under `dir`)
    pub fn local_config_path(dir: &Path) -> PathBuf {
        dir.join(".talkback").join("config.toml")
    }

    /// Load configuration for a run.
    ///
    /// Lookup order: explicit path, `./.talkback/config.toml`, the global file,
    /// then built-in defaults. Environment overrides are applied last and the
    /// result is validated.
    pub fn load(explicit: Option<&Path>, work_dir: &Path) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let local = Self::local_config_path(work_dir);
                let global = Self::global_config_path();
                if local.exists() {
                    debug!("[talkback:config] Using {}", local.display());
                    Self::from_file(&local)?
                } else if global.exists() {
                    debug!("[talkback:config] Using {}", global.display());
                    Self::from_file(&global)?
                } else {
                    debug!("[talkback:config] No config file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TALKBACK_*` overrides, reading variables through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup(ENV_UDP_ADDR) {
            self.listener.address = address;
        }
        if let Some(port) = lookup(ENV_UDP_PORT) {
            self.listener.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {:?}", ENV_UDP_PORT, port))?;
        }
        if let Some(path) = lookup(ENV_SENDER_PATH) {
            self.delivery.program = Some(PathBuf::from(path));
        }
        if let Some(target) = lookup(ENV_TARGET) {
            self.delivery.target = target;
        }
        Ok(())
    }

    /// Write the commented default configuration to `path`.
    pub fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            );
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        info!("[talkback:config] Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses_to_defaults() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_UDP_ADDR, "0.0.0.0"),
            (ENV_UDP_PORT, " 50007 "),
            (ENV_SENDER_PATH, "/usr/local/bin/send"),
            (ENV_TARGET, "Notepad"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.listener.address, "0.0.0.0");
        assert_eq!(config.listener.port, 50007);
        assert_eq!(
            config.delivery.program,
            Some(PathBuf::from("/usr/local/bin/send"))
        );
        assert_eq!(config.delivery.target, "Notepad");
    }

    #[test]
    fn test_invalid_port_override_fails() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|key| {
            (key == ENV_UDP_PORT).then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_write_default_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = Config::local_config_path(dir.path());

        Config::write_default(&path, false).unwrap();
        assert!(Config::write_default(&path, false).is_err());
        Config::write_default(&path, true).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_prefers_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[mailbox]\ncapacity = 3\n").unwrap();

        let config = Config::load(Some(&path), dir.path()).unwrap();
        assert_eq!(config.mailbox.capacity, 3);
    }
}
