//! Configuration file management for tooltrace.
//!
//! Provides a TOML-based config file at `~/.config/tooltrace/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tooltrace_core::agent::gemini::DEFAULT_MODEL_ID;

pub const MODEL_ID_VAR: &str = "TOOLTRACE_MODEL_ID";
pub const OUTPUT_DIR_VAR: &str = "TOOLTRACE_OUTPUT_DIR";
pub const DEFAULT_OUTPUT_DIR: &str = ".";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub model: ModelSection,
    pub output: OutputSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelSection {
    /// Gemini model id used by the `gemini` backend.
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory captured logs are written to.
    pub dir: PathBuf,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the tooltrace config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/tooltrace` or
/// `~/.config/tooltrace`, never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tooltrace");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tooltrace")
}

/// Return the path to the tooltrace config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub model_id: String,
    pub output_dir: PathBuf,
}

impl HarnessConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Model id: `cli_model_id` > `TOOLTRACE_MODEL_ID` env > `config_file.model.id` > `gemini-2.5-flash`
    /// - Output dir: `cli_output_dir` > `TOOLTRACE_OUTPUT_DIR` env > `config_file.output.dir` > `.`
    ///
    /// A missing config file is fine; an unreadable or malformed one is an error.
    pub fn resolve(cli_model_id: Option<&str>, cli_output_dir: Option<&Path>) -> Result<Self> {
        let file_config = if config_path().exists() {
            Some(load_config()?)
        } else {
            None
        };

        let model_id = if let Some(id) = cli_model_id {
            id.to_string()
        } else if let Ok(id) = std::env::var(MODEL_ID_VAR) {
            id
        } else if let Some(ref cfg) = file_config {
            cfg.model.id.clone()
        } else {
            DEFAULT_MODEL_ID.to_string()
        };

        let output_dir = if let Some(dir) = cli_output_dir {
            dir.to_path_buf()
        } else if let Ok(dir) = std::env::var(OUTPUT_DIR_VAR) {
            PathBuf::from(dir)
        } else if let Some(ref cfg) = file_config {
            cfg.output.dir.clone()
        } else {
            PathBuf::from(DEFAULT_OUTPUT_DIR)
        };

        Ok(Self {
            model_id,
            output_dir,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    /// Point the config home at `dir` and clear the override vars.
    /// Returns the previous `XDG_CONFIG_HOME` for restoring.
    fn isolate(dir: &Path) -> Option<String> {
        let orig = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", dir) };
        unsafe { std::env::remove_var(MODEL_ID_VAR) };
        unsafe { std::env::remove_var(OUTPUT_DIR_VAR) };
        orig
    }

    fn restore(orig: Option<String>) {
        match orig {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }
        unsafe { std::env::remove_var(MODEL_ID_VAR) };
        unsafe { std::env::remove_var(OUTPUT_DIR_VAR) };
    }

    fn sample_config() -> ConfigFile {
        ConfigFile {
            model: ModelSection {
                id: "gemini-from-file".to_string(),
            },
            output: OutputSection {
                dir: PathBuf::from("/tmp/from-file"),
            },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig = isolate(tmp.path());

        let saved = save_config(&sample_config());
        let loaded = load_config();
        restore(orig);

        saved.unwrap();
        let loaded = loaded.unwrap();
        assert_eq!(loaded.model.id, "gemini-from-file");
        assert_eq!(loaded.output.dir, PathBuf::from("/tmp/from-file"));
        assert!(tmp.path().join("tooltrace/config.toml").exists());
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig = isolate(tmp.path());

        let config = HarnessConfig::resolve(None, None);
        restore(orig);

        let config = config.unwrap();
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn resolve_prefers_file_over_defaults() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig = isolate(tmp.path());

        let saved = save_config(&sample_config());
        let config = HarnessConfig::resolve(None, None);
        restore(orig);

        saved.unwrap();
        let config = config.unwrap();
        assert_eq!(config.model_id, "gemini-from-file");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/from-file"));
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig = isolate(tmp.path());

        let saved = save_config(&sample_config());
        unsafe { std::env::set_var(MODEL_ID_VAR, "gemini-from-env") };
        unsafe { std::env::set_var(OUTPUT_DIR_VAR, "/tmp/from-env") };
        let config = HarnessConfig::resolve(None, None);
        restore(orig);

        saved.unwrap();
        let config = config.unwrap();
        assert_eq!(config.model_id, "gemini-from-env");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/from-env"));
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig = isolate(tmp.path());

        unsafe { std::env::set_var(MODEL_ID_VAR, "gemini-from-env") };
        unsafe { std::env::set_var(OUTPUT_DIR_VAR, "/tmp/from-env") };
        let config = HarnessConfig::resolve(Some("gemini-from-cli"), Some(Path::new("logs")));
        restore(orig);

        let config = config.unwrap();
        assert_eq!(config.model_id, "gemini-from-cli");
        assert_eq!(config.output_dir, PathBuf::from("logs"));
    }

    #[test]
    fn resolve_errors_on_malformed_config_file() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig = isolate(tmp.path());

        let dir = tmp.path().join("tooltrace");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "model = 3\n").unwrap();
        let result = HarnessConfig::resolve(None, None);
        restore(orig);

        let msg = format!("{:#}", result.unwrap_err());
        assert!(msg.contains("failed to parse config file"), "unexpected error: {msg}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("tooltrace/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
