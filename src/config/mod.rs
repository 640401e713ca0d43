//! Settings for the client itself: where the daemon keeps its files and which
//! command channel backend to use.
//!
//! These are not the daemon's configuration (see
//! [`Configuration`](crate::models::Configuration)); they only tell the session
//! where to look.

pub mod preferences;

pub use preferences::{MemoryPreferences, PreferenceStore, YamlPreferences};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

/// Prefix for environment overrides, e.g. `HYMO_LOG_LINES=200`
pub const ENV_PREFIX: &str = "HYMO";

/// Which command channel implementation to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Real device: commands go to a shell
    #[default]
    Shell,
    /// Simulated device for development
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub binary_path: Utf8PathBuf,
    pub config_path: Utf8PathBuf,
    pub mode_config_path: Utf8PathBuf,
    pub rules_config_path: Utf8PathBuf,
    pub daemon_state_path: Utf8PathBuf,

    /// Lines fetched per log read
    pub log_lines: usize,

    /// Tag used to filter the kernel ring buffer
    pub kernel_log_tag: String,

    /// Program invoked as `<shell> -c <command>`
    pub shell: String,

    pub backend: Backend,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            binary_path: Utf8PathBuf::from("/data/adb/modules/hymo/hymo"),
            config_path: Utf8PathBuf::from("/data/adb/hymo/config.toml"),
            mode_config_path: Utf8PathBuf::from("/data/adb/hymo/module_mode.conf"),
            rules_config_path: Utf8PathBuf::from("/data/adb/hymo/module_rules.conf"),
            daemon_state_path: Utf8PathBuf::from("/data/adb/hymo/run/daemon_state.json"),
            log_lines: 1000,
            kernel_log_tag: "hymofs".to_string(),
            shell: "sh".to_string(),
            backend: Backend::Shell,
        }
    }
}

/// Loads and saves [`AppSettings`].
///
/// Layering, lowest to highest: built-in defaults, the YAML settings file (if
/// present), then `HYMO_*` environment variables.
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: Utf8PathBuf,
}

impl SettingsManager {
    pub fn new<P: AsRef<Utf8Path>>(settings_path: P) -> Self {
        Self {
            settings_path: settings_path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::debug!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let settings: AppSettings = config::Config::builder()
            .add_source(
                config::File::new(self.settings_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!(
            "Loaded settings: backend={:?}, binary={}",
            settings.backend,
            settings.binary_path
        );
        Ok(settings)
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create settings directory: {}", parent))?;
            }
        }

        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
