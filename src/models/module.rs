use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Mount strategy chosen for a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleMode {
    /// Let the daemon decide
    #[default]
    Auto,
    Overlay,
    Magic,
}

impl ModuleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleMode::Auto => "auto",
            ModuleMode::Overlay => "overlay",
            ModuleMode::Magic => "magic",
        }
    }
}

impl fmt::Display for ModuleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown module mode: {0}")]
pub struct UnknownModeError(pub String);

impl FromStr for ModuleMode {
    type Err = UnknownModeError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ModuleMode::Auto),
            "overlay" => Ok(ModuleMode::Overlay),
            "magic" => Ok(ModuleMode::Magic),
            other => Err(UnknownModeError(other.to_string())),
        }
    }
}

/// Path-scoped override inside a single module.
///
/// The mode is kept as text because the daemon accepts more rule modes
/// (`skip`, `hide`, ...) than it accepts module modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub path: String,
    pub mode: String,
}

impl Rule {
    pub fn new(path: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
        }
    }

    /// Rules with an empty path or mode, or a line break in either, are
    /// never written out
    pub fn is_persistable(&self) -> bool {
        let usable = |value: &str| !value.trim().is_empty() && !value.contains(['\n', '\r']);
        usable(&self.path) && usable(&self.mode)
    }
}

/// Default strategy hint when the daemon does not report one
pub const DEFAULT_STRATEGY: &str = "overlay";

/// A module as shown to the user: daemon metadata merged with local overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub mode: ModuleMode,
    pub strategy: String,
    pub path: String,
    pub rules: Vec<Rule>,
}

impl ModuleRecord {
    /// Record with only an id; display name falls back to the id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: String::new(),
            author: String::new(),
            description: String::new(),
            mode: ModuleMode::Auto,
            strategy: DEFAULT_STRATEGY.to_string(),
            path: String::new(),
            rules: Vec::new(),
        }
    }
}

/// Per-mode module counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeStats {
    pub auto: usize,
    pub overlay: usize,
    pub magic: usize,
}

impl ModeStats {
    pub fn from_modules(modules: &[ModuleRecord]) -> Self {
        modules.iter().fold(Self::default(), |mut stats, module| {
            match module.mode {
                ModuleMode::Auto => stats.auto += 1,
                ModuleMode::Overlay => stats.overlay += 1,
                ModuleMode::Magic => stats.magic += 1,
            }
            stats
        })
    }

    pub fn total(&self) -> usize {
        self.auto + self.overlay + self.magic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("auto".parse::<ModuleMode>(), Ok(ModuleMode::Auto));
        assert_eq!(" MAGIC ".parse::<ModuleMode>(), Ok(ModuleMode::Magic));
        assert_eq!("Overlay".parse::<ModuleMode>(), Ok(ModuleMode::Overlay));
        assert!("hymofs".parse::<ModuleMode>().is_err());
    }

    #[test]
    fn test_unknown_mode_error_message() {
        let err = "hybrid".parse::<ModuleMode>().unwrap_err();
        assert_eq!(err, UnknownModeError("hybrid".to_string()));
        assert_eq!(err.to_string(), "unknown module mode: hybrid");

        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_mode_display_matches_parse() {
        for mode in [ModuleMode::Auto, ModuleMode::Overlay, ModuleMode::Magic] {
            assert_eq!(mode.to_string().parse::<ModuleMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_new_record_defaults() {
        let record = ModuleRecord::new("zygisk_next");
        assert_eq!(record.name, "zygisk_next");
        assert_eq!(record.mode, ModuleMode::Auto);
        assert_eq!(record.strategy, "overlay");
        assert!(record.rules.is_empty());
    }

    #[test]
    fn test_rule_persistable() {
        assert!(Rule::new("system/bin", "magic").is_persistable());
        assert!(!Rule::new("", "magic").is_persistable());
        assert!(!Rule::new("system/bin", " ").is_persistable());
        assert!(!Rule::new("system/bin=magic\nother:x", "skip").is_persistable());
        assert!(!Rule::new("system/bin", "magic\r\nother:x=skip").is_persistable());
    }

    #[test]
    fn test_mode_stats() {
        let mut a = ModuleRecord::new("a");
        a.mode = ModuleMode::Magic;
        let mut b = ModuleRecord::new("b");
        b.mode = ModuleMode::Overlay;
        let c = ModuleRecord::new("c");

        let stats = ModeStats::from_modules(&[a, b, c]);
        assert_eq!(
            stats,
            ModeStats {
                auto: 1,
                overlay: 1,
                magic: 1
            }
        );
        assert_eq!(stats.total(), 3);
    }
}
