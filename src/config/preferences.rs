// Key-value store for UI-only preferences (log source, theme, language, ...).
//
// The session only needs persist/restore; where the values live is up to the
// implementation.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;
use std::sync::{Mutex, PoisonError};

/// Persist and restore string preferences by key
pub trait PreferenceStore: Send + Sync {
    fn persist(&self, key: &str, value: &str) -> Result<()>;

    fn restore(&self, key: &str) -> Option<String>;
}

/// Process-local store, used when nothing should touch disk
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<IndexMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn persist(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn restore(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// Preferences kept in a flat YAML mapping, rewritten on every change
#[derive(Debug)]
pub struct YamlPreferences {
    path: Utf8PathBuf,
    values: Mutex<IndexMap<String, String>>,
}

impl YamlPreferences {
    /// Open the file at `path`; a missing file starts out empty.
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read preferences: {}", path))?;
            if contents.trim().is_empty() {
                IndexMap::new()
            } else {
                serde_yaml_ng::from_str(&contents)
                    .with_context(|| format!("Failed to parse preferences: {}", path))?
            }
        } else {
            IndexMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn write(&self, values: &IndexMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create preferences directory: {}", parent)
                })?;
            }
        }

        let yaml = serde_yaml_ng::to_string(values).context("Failed to serialize preferences")?;
        fs::write(&self.path, yaml)
            .with_context(|| format!("Failed to write preferences: {}", self.path))
    }
}

impl PreferenceStore for YamlPreferences {
    fn persist(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        self.write(&values)?;
        tracing::debug!("Persisted preference {}={}", key, value);
        Ok(())
    }

    fn restore(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
